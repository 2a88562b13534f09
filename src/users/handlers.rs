use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::CurrentSession,
    roles::{can_edit_user, can_manage_role, Permission, Role},
    state::AppState,
    users::{
        dto::{CreatedUserResponse, PublicUser},
        repo::is_system_account,
        repo_types::{UserDraft, UserPatch, UserRecord},
        UserDbError,
    },
};

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:name",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/users/:name/submit", post(submit_user))
}

fn user_error(e: UserDbError) -> (StatusCode, String) {
    if let UserDbError::Storage(ref inner) = e {
        error!(error = %inner, "user repository failed");
    }
    (e.status(), e.to_string())
}

fn forbidden(msg: &str) -> (StatusCode, String) {
    (StatusCode::FORBIDDEN, msg.to_string())
}

/// The logged-in user behind the session, or 401.
async fn actor(current: &CurrentSession) -> Result<UserRecord, (StatusCode, String)> {
    current
        .session
        .lock()
        .await
        .user()
        .cloned()
        .ok_or((StatusCode::UNAUTHORIZED, "Not logged in".into()))
}

async fn load_target(state: &AppState, name: &str) -> Result<UserRecord, (StatusCode, String)> {
    state
        .users
        .get_user(name)
        .await
        .map_err(user_error)?
        .ok_or_else(|| user_error(UserDbError::NotFound))
}

/// Fields only an administrator may change.
fn touches_privileged(patch: &UserPatch) -> bool {
    patch.role.is_some()
        || patch.xp.is_some()
        || patch.level.is_some()
        || patch.achievements.is_some()
        || patch.kyc.is_some()
        || patch.email_verified.is_some()
        || patch.sim_verified.is_some()
}

/// Anything beyond what `/session/profile` accepts. Onboarding state only
/// moves through its own gated routes.
fn outside_profile_fields(patch: &UserPatch) -> bool {
    touches_privileged(patch)
        || patch.phone.is_some()
        || patch.space.is_some()
        || patch.csmcl_id.is_some()
        || patch.wallet.is_some()
        || patch.onboarding_step.is_some()
        || patch.step_progress.is_some()
}

/// Explorers never write, and shared system accounts are admin-only.
fn check_writable(me: &UserRecord, target: &UserRecord) -> Result<(), (StatusCode, String)> {
    if me.role == Role::Explorer {
        warn!(target = %target.cosmical_name, "explorer write denied");
        return Err(forbidden("Explorer sessions are read-only"));
    }
    if is_system_account(&target.cosmical_name) && me.role != Role::Admin {
        warn!(
            by = %me.cosmical_name,
            target = %target.cosmical_name,
            "system account write denied"
        );
        return Err(forbidden("System accounts can only be changed by administrators"));
    }
    Ok(())
}

#[instrument(skip(state, current))]
pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentSession,
) -> ApiResult<Vec<PublicUser>> {
    let me = actor(&current).await?;
    if !me.role.has_permission(Permission::ManageUsers) {
        warn!(cosmical_name = %me.cosmical_name, "list users denied");
        return Err(forbidden("Insufficient permissions"));
    }
    let users = state.users.list_users().await.map_err(user_error)?;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, current, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<UserDraft>,
) -> Result<(StatusCode, Json<CreatedUserResponse>), (StatusCode, String)> {
    let me = actor(&current).await?;
    if !me.role.has_permission(Permission::CreateUser) {
        return Err(forbidden("Insufficient permissions"));
    }
    let role = payload.role.unwrap_or(Role::User);
    if !can_manage_role(Some(me.role), Some(role)) {
        return Err(forbidden("Cannot assign that role"));
    }

    let created = state
        .users
        .create_local_user(payload)
        .await
        .map_err(user_error)?;
    info!(
        by = %me.cosmical_name,
        cosmical_name = %created.user.cosmical_name,
        role = %created.user.role,
        "user created by admin"
    );
    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            user: PublicUser::from(&created.user),
            recovery_phrase: created.generated_phrase,
        }),
    ))
}

#[instrument(skip(state, current))]
pub async fn get_user(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(name): Path<String>,
) -> ApiResult<PublicUser> {
    let me = actor(&current).await?;
    let target = load_target(&state, &name).await?;
    if target.id != me.id && !me.role.has_permission(Permission::ViewProfiles) {
        return Err(forbidden("Insufficient permissions"));
    }
    Ok(Json(PublicUser::from(&target)))
}

#[instrument(skip(state, current, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(name): Path<String>,
    Json(payload): Json<UserPatch>,
) -> ApiResult<PublicUser> {
    let me = actor(&current).await?;
    let target = load_target(&state, &name).await?;
    let is_self = target.id == me.id;
    let outranks = me.role.has_permission(Permission::EditProfile)
        && can_edit_user(Some(me.role), Some(target.role));

    check_writable(&me, &target)?;
    if !is_self && !outranks {
        warn!(by = %me.cosmical_name, target = %target.cosmical_name, "edit denied");
        return Err(forbidden("Insufficient permissions"));
    }
    if touches_privileged(&payload) && me.role != Role::Admin {
        return Err(forbidden(
            "Only administrators can change roles, progress or verification",
        ));
    }
    if me.role != Role::Admin && outside_profile_fields(&payload) {
        warn!(by = %me.cosmical_name, target = %target.cosmical_name, "non-profile edit denied");
        return Err(forbidden("Only profile fields can be changed here"));
    }
    if let Some(role) = payload.role {
        if !can_manage_role(Some(me.role), Some(role)) {
            return Err(forbidden("Cannot assign that role"));
        }
    }

    let updated = state
        .users
        .update_user(&target.cosmical_name, payload)
        .await
        .map_err(user_error)?;
    current.session.lock().await.sync_user(&updated);

    info!(by = %me.cosmical_name, cosmical_name = %updated.cosmical_name, "user updated");
    Ok(Json(PublicUser::from(&updated)))
}

#[instrument(skip(state, current))]
pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(name): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let me = actor(&current).await?;
    if !me.role.has_permission(Permission::DeleteUser) {
        return Err(forbidden("Insufficient permissions"));
    }
    state.users.delete_user(&name).await.map_err(user_error)?;
    info!(by = %me.cosmical_name, cosmical_name = %name, "user deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, current))]
pub async fn submit_user(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(name): Path<String>,
) -> ApiResult<PublicUser> {
    let me = actor(&current).await?;
    let target = load_target(&state, &name).await?;
    check_writable(&me, &target)?;
    if target.id != me.id && !me.role.has_permission(Permission::ManageUsers) {
        return Err(forbidden("Insufficient permissions"));
    }
    let submitted = state
        .users
        .submit_user(&target.cosmical_name)
        .await
        .map_err(user_error)?;
    current.session.lock().await.sync_user(&submitted);
    Ok(Json(PublicUser::from(&submitted)))
}
