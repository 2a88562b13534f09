use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for issuing a transition token.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionTokenRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub onboarding_status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionTokenResponse {
    pub transition_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTransitionRequest {
    pub transition_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTransitionResponse {
    pub session_token: String,
}

/// Error body of the transition endpoints.
#[derive(Debug, Serialize)]
pub struct TransitionErrorBody {
    pub error: String,
}
