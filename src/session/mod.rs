//! Per-client session state, the route guard and the session routes.

use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod guard;
pub mod handlers;
pub mod registry;
pub mod store;

pub use registry::{SessionRegistry, SharedSession};
pub use store::{SessionError, SessionStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::session_routes())
        .merge(handlers::onboarding_routes())
}
