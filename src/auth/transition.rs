use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{info, warn};
use uuid::Uuid;

use super::cache::TokenCache;
use super::claims::TokenKind;
use super::jwt::JwtKeys;

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid transition")]
    Invalid,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TransitionError {
    pub fn status(&self) -> StatusCode {
        match self {
            TransitionError::Invalid => StatusCode::UNAUTHORIZED,
            TransitionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedTransition {
    pub user_id: Uuid,
    pub onboarding_status: Option<String>,
    pub session_token: String,
}

fn cache_key(user_id: Uuid) -> String {
    format!("transition:{}", user_id)
}

/// Issues and redeems single-use transition tokens.
pub struct TransitionService {
    keys: JwtKeys,
    cache: Arc<dyn TokenCache>,
}

impl TransitionService {
    pub fn new(keys: JwtKeys, cache: Arc<dyn TokenCache>) -> Self {
        Self { keys, cache }
    }

    /// Signs a transition token and makes it the only redeemable one for the user.
    pub async fn issue(
        &self,
        user_id: Uuid,
        onboarding_status: Option<String>,
    ) -> Result<String, TransitionError> {
        let token = self.keys.sign_transition(user_id, onboarding_status)?;
        self.cache
            .put(&cache_key(user_id), token.clone(), self.keys.transition_ttl)
            .await?;
        info!(user_id = %user_id, "transition token issued");
        Ok(token)
    }

    /// Redeems a token exactly once and mints a main-platform session token.
    pub async fn validate(&self, token: &str) -> Result<ValidatedTransition, TransitionError> {
        let claims = self
            .keys
            .verify_kind(token, TokenKind::Transition)
            .map_err(|e| {
                warn!(error = %e, "transition token rejected");
                TransitionError::Invalid
            })?;

        if !self.cache.take_if_eq(&cache_key(claims.sub), token).await? {
            warn!(user_id = %claims.sub, "transition token not redeemable");
            return Err(TransitionError::Invalid);
        }

        let session_token = self.keys.sign_session(claims.sub)?;
        info!(user_id = %claims.sub, "transition redeemed");
        Ok(ValidatedTransition {
            user_id: claims.sub,
            onboarding_status: claims.onboarding_status,
            session_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::cache::MemoryTokenCache;
    use crate::config::AppConfig;

    fn service() -> TransitionService {
        let keys = JwtKeys::from(&AppConfig::for_tests().jwt);
        TransitionService::new(keys, Arc::new(MemoryTokenCache::new()))
    }

    #[tokio::test]
    async fn token_is_single_use() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let token = svc.issue(user_id, Some("complete".into())).await.unwrap();

        let first = svc.validate(&token).await.unwrap();
        assert_eq!(first.user_id, user_id);
        assert_eq!(first.onboarding_status.as_deref(), Some("complete"));
        let claims = svc
            .keys
            .verify_kind(&first.session_token, TokenKind::Session)
            .unwrap();
        assert_eq!(claims.sub, user_id);

        assert!(matches!(
            svc.validate(&token).await.unwrap_err(),
            TransitionError::Invalid
        ));
    }

    #[tokio::test]
    async fn reissue_invalidates_earlier_token() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let old = svc.issue(user_id, None).await.unwrap();
        let new = svc.issue(user_id, None).await.unwrap();
        assert!(svc.validate(&old).await.is_err());
        assert!(svc.validate(&new).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_garbage_and_wrong_kind() {
        let svc = service();
        assert!(matches!(
            svc.validate("not-a-jwt").await.unwrap_err(),
            TransitionError::Invalid
        ));
        let access = svc.keys.sign_access(Uuid::new_v4()).unwrap();
        assert!(matches!(
            svc.validate(&access).await.unwrap_err(),
            TransitionError::Invalid
        ));
    }

    #[tokio::test]
    async fn signed_but_never_issued_is_rejected() {
        let svc = service();
        let forged = svc.keys.sign_transition(Uuid::new_v4(), None).unwrap();
        assert!(svc.validate(&forged).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_redemption_succeeds_once() {
        let svc = Arc::new(service());
        let token = svc.issue(Uuid::new_v4(), None).await.unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                let token = token.clone();
                tokio::spawn(async move { svc.validate(&token).await.is_ok() })
            })
            .collect();
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
    }
}
