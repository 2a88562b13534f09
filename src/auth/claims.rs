use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of JWT.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Onboarding session, `sub` is the session id.
    Access,
    /// One-time hand-off to the main platform, `sub` is the user id.
    Transition,
    /// Main-platform session minted from a transition.
    Session,
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,      // session or user ID, depending on kind
    pub iat: usize,     // issued at (unix timestamp)
    pub exp: usize,     // expires at (unix timestamp)
    pub iss: String,    // issuer
    pub aud: String,    // audience
    pub jti: Uuid,      // token ID
    pub kind: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_status: Option<String>,
}
