use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parley::Session;
use serde::Deserialize;
use tracing::info;

use super::{envelope, Envelope};
use crate::error::ApiError;
use crate::state::AppState;

type SessionResponse = Result<Json<Envelope<Session>>, ApiError>;

#[derive(Debug, Deserialize)]
struct ModelRequest {
    model: String,
}

#[derive(Debug, Deserialize)]
struct SystemPromptRequest {
    prompt: String,
}

async fn get_messages(State(state): State<AppState>, headers: HeaderMap) -> SessionResponse {
    let session = state.session(&headers).await;
    Ok(envelope(session.snapshot().await))
}

async fn clear(State(state): State<AppState>, headers: HeaderMap) -> SessionResponse {
    let session = state.session(&headers).await;
    let snapshot = session.try_update(Session::clear).await?;
    info!(session_id = %snapshot.session_id, "cleared session");
    Ok(envelope(snapshot))
}

async fn set_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ModelRequest>, JsonRejection>,
) -> SessionResponse {
    let Json(request) = payload?;
    let model = request.model.trim().to_string();
    if model.is_empty() {
        return Err(ApiError::InvalidRequest);
    }

    let session = state.session(&headers).await;
    session.update(|s| s.with_model(model)).await;
    let snapshot = session.snapshot().await;
    info!(session_id = %snapshot.session_id, model = %snapshot.model, "changed model");
    Ok(envelope(snapshot))
}

async fn set_system_prompt(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SystemPromptRequest>, JsonRejection>,
) -> SessionResponse {
    let Json(request) = payload?;

    let session = state.session(&headers).await;
    session
        .update(|s| s.with_system_prompt(request.prompt))
        .await;
    let snapshot = session.snapshot().await;
    info!(session_id = %snapshot.session_id, "changed system prompt");
    Ok(envelope(snapshot))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/messages", get(get_messages))
        .route("/clear", delete(clear))
        .route("/model", post(set_model))
        .route("/system-prompt", post(set_system_prompt))
        .with_state(state)
}
