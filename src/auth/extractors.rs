use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::claims::TokenKind;
use crate::session::{SessionError, SharedSession};
use crate::state::AppState;

/// Onboarding session behind the bearer access token.
pub struct CurrentSession {
    pub id: Uuid,
    pub session: SharedSession,
}

pub(crate) fn bearer_token(parts: &Parts) -> Result<&str, (StatusCode, String)> {
    // Read Authorization header
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or((StatusCode::UNAUTHORIZED, "missing Authorization header".into()))?;

    // Expect "Bearer <token>"
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .ok_or((StatusCode::UNAUTHORIZED, "invalid auth scheme".into()))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = state
            .keys
            .verify_kind(token, TokenKind::Access)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid or expired token".into()))?;

        let session = state
            .sessions
            .get(claims.sub)
            .await
            .ok_or((StatusCode::UNAUTHORIZED, "session not found".into()))?;

        // Explorer expiry is only noticed when the session is used again.
        {
            let mut guard = session.lock().await;
            if guard.is_explorer_expired(OffsetDateTime::now_utc()) {
                guard.logout();
                drop(guard);
                state.sessions.remove(claims.sub).await;
                info!(session_id = %claims.sub, "explorer session expired");
                return Err((StatusCode::UNAUTHORIZED, "Explorer session expired".into()));
            }
            match guard.reload().await {
                Ok(()) => {}
                Err(SessionError::NotLoggedIn) => {
                    drop(guard);
                    state.sessions.remove(claims.sub).await;
                    return Err((StatusCode::UNAUTHORIZED, "Account no longer exists".into()));
                }
                Err(e) => return Err((e.status(), e.to_string())),
            }
        }

        Ok(CurrentSession {
            id: claims.sub,
            session,
        })
    }
}
