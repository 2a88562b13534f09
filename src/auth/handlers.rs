use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            TransitionErrorBody, TransitionTokenRequest, TransitionTokenResponse,
            ValidateTransitionRequest, ValidateTransitionResponse,
        },
        transition::TransitionError,
    },
    state::AppState,
};

type TransitionResult<T> = Result<Json<T>, (StatusCode, Json<TransitionErrorBody>)>;

pub fn transition_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/transition-token", post(issue_transition_token))
        .route("/auth/validate-transition", post(validate_transition))
}

fn reject(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<TransitionErrorBody>) {
    (
        status,
        Json(TransitionErrorBody {
            error: message.into(),
        }),
    )
}

fn transition_failure(e: TransitionError) -> (StatusCode, Json<TransitionErrorBody>) {
    if let TransitionError::Internal(ref inner) = e {
        error!(error = %inner, "transition failed");
    }
    reject(e.status(), e.to_string())
}

#[instrument(skip(state, payload))]
pub async fn issue_transition_token(
    State(state): State<AppState>,
    Json(payload): Json<TransitionTokenRequest>,
) -> TransitionResult<TransitionTokenResponse> {
    let user = match state.users.get_user_by_id(payload.user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(user_id = %payload.user_id, "transition for unknown user");
            return Err(reject(StatusCode::NOT_FOUND, "User not found"));
        }
        Err(e) => {
            error!(error = %e, "get_user_by_id failed");
            return Err(reject(e.status(), e.to_string()));
        }
    };

    let transition_token = state
        .transitions
        .issue(user.id, payload.onboarding_status)
        .await
        .map_err(transition_failure)?;

    info!(user_id = %user.id, cosmical_name = %user.cosmical_name, "transition token handed out");
    Ok(Json(TransitionTokenResponse { transition_token }))
}

#[instrument(skip(state, payload))]
pub async fn validate_transition(
    State(state): State<AppState>,
    Json(payload): Json<ValidateTransitionRequest>,
) -> TransitionResult<ValidateTransitionResponse> {
    let validated = state
        .transitions
        .validate(&payload.transition_token)
        .await
        .map_err(transition_failure)?;

    Ok(Json(ValidateTransitionResponse {
        session_token: validated.session_token,
    }))
}
