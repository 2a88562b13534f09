use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod store;

pub use store::DocsStore;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::docs_routes())
}
