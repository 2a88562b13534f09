use crate::state::AppState;
use axum::Router;

pub mod cache;
pub mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod transition;

pub use cache::{MemoryTokenCache, TokenCache};
pub use extractors::CurrentSession;
pub use jwt::JwtKeys;
pub use transition::{TransitionError, TransitionService};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::transition_routes())
}
