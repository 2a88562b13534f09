use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod error;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod secrets;
pub mod validation;

pub use dto::PublicUser;
pub use error::UserDbError;
pub use repo::UserDb;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}
