use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::{auth::CurrentSession, docs::store::DocsState, state::AppState};

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

#[derive(Debug, Serialize)]
pub struct SectionContent {
    pub section: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct PutSectionRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CurrentSectionRequest {
    pub section: Option<String>,
}

pub fn docs_routes() -> Router<AppState> {
    Router::new()
        .route("/docs", get(docs_state))
        .route("/docs/current", get(current_content).put(set_current_section))
        .route("/docs/editing", post(toggle_editing))
        .route("/docs/:section", get(get_section).put(put_section))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "docs storage failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

async fn require_editor(current: &CurrentSession) -> Result<(), (StatusCode, String)> {
    if current.session.lock().await.capabilities().can_edit {
        Ok(())
    } else {
        Err((StatusCode::FORBIDDEN, "Editing docs requires edit rights".into()))
    }
}

#[instrument(skip(state))]
pub async fn docs_state(State(state): State<AppState>) -> ApiResult<DocsState> {
    Ok(Json(state.docs.state().await.map_err(internal)?))
}

#[instrument(skip(state))]
pub async fn get_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> ApiResult<SectionContent> {
    let content = state.docs.content(&section).await.map_err(internal)?;
    Ok(Json(SectionContent { section, content }))
}

#[instrument(skip(state, current, payload))]
pub async fn put_section(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(section): Path<String>,
    Json(payload): Json<PutSectionRequest>,
) -> ApiResult<SectionContent> {
    require_editor(&current).await?;
    state
        .docs
        .set_content(&section, payload.content.clone())
        .await
        .map_err(internal)?;
    info!(section = %section, "docs section updated");
    Ok(Json(SectionContent {
        section,
        content: payload.content,
    }))
}

#[instrument(skip(state))]
pub async fn current_content(State(state): State<AppState>) -> ApiResult<String> {
    Ok(Json(state.docs.current_content().await.map_err(internal)?))
}

#[instrument(skip(state, payload))]
pub async fn set_current_section(
    State(state): State<AppState>,
    Json(payload): Json<CurrentSectionRequest>,
) -> ApiResult<DocsState> {
    state
        .docs
        .set_current_section(payload.section)
        .await
        .map_err(internal)?;
    Ok(Json(state.docs.state().await.map_err(internal)?))
}

#[instrument(skip(state, current))]
pub async fn toggle_editing(
    State(state): State<AppState>,
    current: CurrentSession,
) -> ApiResult<DocsState> {
    require_editor(&current).await?;
    state.docs.toggle_editing().await.map_err(internal)?;
    Ok(Json(state.docs.state().await.map_err(internal)?))
}
