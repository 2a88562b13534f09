use serde::{Deserialize, Serialize};

use super::guard::RouteMeta;
use super::store::SessionView;
use crate::game::metrics::MetricCategory;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub cosmical_name: String,
    /// Recovery phrase or password.
    pub recovery_phrase: String,
}

/// Returned by every route that opens a session.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub session: SessionView,
    /// Only after registering without a phrase of one's own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_phrase: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackMetricRequest {
    pub metric_id: String,
    pub category: MetricCategory,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct AchievementResponse {
    pub unlocked: bool,
    pub session: SessionView,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub path: String,
    #[serde(default)]
    pub meta: RouteMeta,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPhoneRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct ConnectWalletRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteOnboardingResponse {
    pub transition_token: String,
    pub redirect_url: String,
}
