use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::CurrentSession,
    game::metrics::MetricEntry,
    session::{
        dto::{
            AchievementResponse, CompleteOnboardingResponse, ConnectWalletRequest, LoginRequest,
            NavigateRequest, SessionResponse, TrackMetricRequest, VerifyEmailRequest,
            VerifyPhoneRequest,
        },
        guard::{check_navigation, Navigation},
        store::{MetricOutcome, ProfileUpdate, SessionError, SessionStore, SessionView, SpacePatch},
    },
    state::AppState,
    users::repo_types::{OnboardingStep, SpaceBinding, UserDraft},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(current_session))
        .route("/session/login", post(login))
        .route("/session/explorer", post(explorer))
        .route("/session/register", post(register))
        .route("/session/logout", post(logout))
        .route("/session/profile", patch(update_profile))
        .route("/session/metrics", get(metric_summary).post(track_metric))
        .route("/session/achievements/:id", post(unlock_achievement))
        .route("/session/navigate", post(navigate))
}

pub fn onboarding_routes() -> Router<AppState> {
    Router::new()
        .route("/onboarding/verify-email", post(verify_email))
        .route("/onboarding/verify-phone", post(verify_phone))
        .route("/onboarding/space", put(configure_space))
        .route("/onboarding/csmcl-id", post(setup_csmcl_id))
        .route("/onboarding/csmcl-id/confirm", post(confirm_csmcl_id))
        .route("/onboarding/wallet", post(connect_wallet))
        .route("/onboarding/steps/:step/start", post(start_step))
        .route("/onboarding/steps/:step/complete", post(complete_step))
        .route("/onboarding/complete", post(complete_onboarding))
}

pub(crate) fn session_error(e: SessionError) -> (StatusCode, String) {
    let status = e.status();
    if status.is_server_error() {
        error!(error = %e, "session operation failed");
    }
    (status, e.to_string())
}

/// Registers a freshly authenticated session and signs its access token.
async fn open_session(
    state: &AppState,
    session: SessionStore,
    recovery_phrase: Option<String>,
) -> ApiResult<SessionResponse> {
    let view = session.view(OffsetDateTime::now_utc());
    let (id, _) = state
        .sessions
        .insert(session, state.keys.access_ttl)
        .await;
    let access_token = state.keys.sign_access(id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(SessionResponse {
        access_token,
        session: view,
        recovery_phrase,
    }))
}

#[instrument(skip(state, payload), fields(cosmical_name = %payload.cosmical_name))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<SessionResponse> {
    let mut session = state.new_session();
    session
        .login(payload.cosmical_name.trim(), &payload.recovery_phrase)
        .await
        .map_err(session_error)?;
    open_session(&state, session, None).await
}

#[instrument(skip(state))]
pub async fn explorer(State(state): State<AppState>) -> ApiResult<SessionResponse> {
    let mut session = state.new_session();
    session
        .login_as_explorer(OffsetDateTime::now_utc())
        .await
        .map_err(session_error)?;
    open_session(&state, session, None).await
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<UserDraft>,
) -> ApiResult<SessionResponse> {
    let mut session = state.new_session();
    let generated = session.register(payload).await.map_err(session_error)?;
    open_session(&state, session, generated).await
}

#[instrument(skip(state, current), fields(session_id = %current.id))]
pub async fn logout(State(state): State<AppState>, current: CurrentSession) -> StatusCode {
    current.session.lock().await.logout();
    state.sessions.remove(current.id).await;
    StatusCode::NO_CONTENT
}

#[instrument(skip(current), fields(session_id = %current.id))]
pub async fn current_session(current: CurrentSession) -> Json<SessionView> {
    let session = current.session.lock().await;
    Json(session.view(OffsetDateTime::now_utc()))
}

#[instrument(skip(current, payload), fields(session_id = %current.id))]
pub async fn update_profile(
    current: CurrentSession,
    Json(payload): Json<ProfileUpdate>,
) -> ApiResult<SessionView> {
    let mut session = current.session.lock().await;
    session.update_profile(payload).await.map_err(session_error)?;
    Ok(Json(session.view(OffsetDateTime::now_utc())))
}

#[instrument(skip(current, payload), fields(session_id = %current.id, metric = %payload.metric_id))]
pub async fn track_metric(
    current: CurrentSession,
    Json(payload): Json<TrackMetricRequest>,
) -> ApiResult<MetricOutcome> {
    let mut session = current.session.lock().await;
    let outcome = session
        .track_metric(&payload.metric_id, payload.category, payload.data)
        .await
        .map_err(session_error)?;
    Ok(Json(outcome))
}

#[instrument(skip(state, current), fields(session_id = %current.id))]
pub async fn metric_summary(
    State(state): State<AppState>,
    current: CurrentSession,
) -> ApiResult<Vec<MetricEntry>> {
    if !current.session.lock().await.capabilities().can_view_metrics {
        return Err((StatusCode::FORBIDDEN, "Insufficient permissions".into()));
    }
    Ok(Json(state.metrics.summary().await))
}

#[instrument(skip(current), fields(session_id = %current.id))]
pub async fn unlock_achievement(
    current: CurrentSession,
    Path(id): Path<String>,
) -> ApiResult<AchievementResponse> {
    let mut session = current.session.lock().await;
    let unlocked = session.unlock_achievement(&id).await.map_err(session_error)?;
    Ok(Json(AchievementResponse {
        unlocked,
        session: session.view(OffsetDateTime::now_utc()),
    }))
}

/// Anonymous callers are judged against an empty session.
#[instrument(skip(state, current, payload), fields(path = %payload.path))]
pub async fn navigate(
    State(state): State<AppState>,
    current: Option<CurrentSession>,
    Json(payload): Json<NavigateRequest>,
) -> Json<Navigation> {
    let now = OffsetDateTime::now_utc();
    let nav = match current {
        Some(current) => {
            let mut session = current.session.lock().await;
            let nav = check_navigation(&mut session, &payload.meta, &payload.path, now);
            if !session.is_logged_in() {
                drop(session);
                state.sessions.remove(current.id).await;
            }
            nav
        }
        None => check_navigation(&mut state.new_session(), &payload.meta, &payload.path, now),
    };
    Json(nav)
}

// Onboarding

#[instrument(skip(current, payload), fields(session_id = %current.id))]
pub async fn verify_email(
    current: CurrentSession,
    Json(payload): Json<VerifyEmailRequest>,
) -> ApiResult<SessionView> {
    let mut session = current.session.lock().await;
    session.verify_email(&payload.email).await.map_err(session_error)?;
    Ok(Json(session.view(OffsetDateTime::now_utc())))
}

#[instrument(skip(current, payload), fields(session_id = %current.id))]
pub async fn verify_phone(
    current: CurrentSession,
    Json(payload): Json<VerifyPhoneRequest>,
) -> ApiResult<SessionView> {
    let mut session = current.session.lock().await;
    session.verify_phone(&payload.phone).await.map_err(session_error)?;
    Ok(Json(session.view(OffsetDateTime::now_utc())))
}

#[instrument(skip(current, payload), fields(session_id = %current.id))]
pub async fn configure_space(
    current: CurrentSession,
    Json(payload): Json<SpacePatch>,
) -> ApiResult<SessionView> {
    let mut session = current.session.lock().await;
    session.configure_space(payload).await.map_err(session_error)?;
    Ok(Json(session.view(OffsetDateTime::now_utc())))
}

#[instrument(skip(current), fields(session_id = %current.id))]
pub async fn setup_csmcl_id(current: CurrentSession) -> ApiResult<SpaceBinding> {
    let mut session = current.session.lock().await;
    let binding = session
        .setup_csmcl_id(OffsetDateTime::now_utc())
        .await
        .map_err(session_error)?;
    Ok(Json(binding))
}

#[instrument(skip(current), fields(session_id = %current.id))]
pub async fn confirm_csmcl_id(current: CurrentSession) -> ApiResult<SessionView> {
    let mut session = current.session.lock().await;
    session.confirm_csmcl_id().await.map_err(session_error)?;
    Ok(Json(session.view(OffsetDateTime::now_utc())))
}

#[instrument(skip(current, payload), fields(session_id = %current.id))]
pub async fn connect_wallet(
    current: CurrentSession,
    Json(payload): Json<ConnectWalletRequest>,
) -> ApiResult<SessionView> {
    let mut session = current.session.lock().await;
    session.connect_wallet(&payload.address).await.map_err(session_error)?;
    Ok(Json(session.view(OffsetDateTime::now_utc())))
}

fn parse_step(raw: &str) -> Result<OnboardingStep, (StatusCode, String)> {
    raw.parse::<OnboardingStep>().map_err(|_| {
        warn!(step = raw, "unknown onboarding step");
        (StatusCode::BAD_REQUEST, format!("Unknown onboarding step: {}", raw))
    })
}

#[instrument(skip(current), fields(session_id = %current.id))]
pub async fn start_step(
    current: CurrentSession,
    Path(step): Path<String>,
) -> ApiResult<SessionView> {
    let step = parse_step(&step)?;
    let mut session = current.session.lock().await;
    session.start_step(step).await.map_err(session_error)?;
    Ok(Json(session.view(OffsetDateTime::now_utc())))
}

#[instrument(skip(current), fields(session_id = %current.id))]
pub async fn complete_step(
    current: CurrentSession,
    Path(step): Path<String>,
) -> ApiResult<SessionView> {
    let step = parse_step(&step)?;
    let mut session = current.session.lock().await;
    session.complete_step(step).await.map_err(session_error)?;
    Ok(Json(session.view(OffsetDateTime::now_utc())))
}

/// Appends the transition token to the main-platform URL, keeping any
/// query string it already carries.
fn handoff_url(base: &str, token: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}transition_token={}", base, sep, token)
}

/// Hands the user over to the main platform with a single-use transition token.
#[instrument(skip(state, current), fields(session_id = %current.id))]
pub async fn complete_onboarding(
    State(state): State<AppState>,
    current: CurrentSession,
) -> ApiResult<CompleteOnboardingResponse> {
    let session = current.session.lock().await;
    let user = session
        .user()
        .ok_or_else(|| session_error(SessionError::NotLoggedIn))?;
    if session.is_explorer() {
        return Err((
            StatusCode::FORBIDDEN,
            "Explorer sessions cannot leave onboarding".into(),
        ));
    }
    if !session.is_onboarding_complete() {
        return Err((StatusCode::CONFLICT, "Onboarding is not complete".into()));
    }
    let user_id = user.id;
    drop(session);

    let transition_token = state
        .transitions
        .issue(user_id, Some(OnboardingStep::Complete.as_str().to_string()))
        .await
        .map_err(|e| {
            error!(error = %e, "transition issue failed");
            (e.status(), e.to_string())
        })?;
    let redirect_url = handoff_url(&state.config.main_app_url, &transition_token);

    info!(user_id = %user_id, "onboarding complete, handing over");
    Ok(Json(CompleteOnboardingResponse {
        transition_token,
        redirect_url,
    }))
}
