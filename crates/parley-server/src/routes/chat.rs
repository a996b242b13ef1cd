use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use parley::{ChatRequest, Reply};
use serde_json::Value;

use super::envelope;
use crate::error::ApiError;
use crate::state::AppState;

fn parse_chat_request(body: Value) -> Result<ChatRequest, ApiError> {
    match body.get("message") {
        Some(Value::String(_)) => {}
        Some(_) => return Err(ApiError::InvalidRequest),
        None => return Err(ApiError::MissingMessage),
    }
    serde_json::from_value(body).map_err(|_| ApiError::InvalidRequest)
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let request = parse_chat_request(body)?;
    let session = state.session(&headers).await;

    match state.agent.handle_message(&session, request).await? {
        Reply::Complete(snapshot) => Ok(envelope(snapshot).into_response()),
        Reply::Stream(stream) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            Body::from_stream(stream),
        )
            .into_response()),
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}
