use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parley::AgentError;
use serde_json::json;
use thiserror::Error;

/// Failures reported to HTTP clients, each mapped to one status code
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("missing message")]
    MissingMessage,
    #[error("invalid request")]
    InvalidRequest,
    #[error("session busy")]
    Busy,
    #[error("processing error")]
    Processing,
    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MissingMessage | Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Busy => StatusCode::CONFLICT,
            Self::Processing | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::InvalidInput(_) => Self::MissingMessage,
            AgentError::Busy => Self::Busy,
            AgentError::Backend(e) => {
                tracing::error!(error = %e, "chat turn failed");
                Self::Processing
            }
            AgentError::Interrupted(reason) => {
                tracing::error!(reason = %reason, "chat turn interrupted");
                Self::Processing
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected request body");
        Self::InvalidRequest
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Invalid listen address {host}:{port}")]
    InvalidAddress { host: String, port: u16 },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

// Only the provider section has fields without defaults, so bare names belong to it
pub(crate) fn to_env_var(field_path: &str) -> String {
    let normalized_path = if field_path.contains('.') {
        field_path.to_string()
    } else {
        format!("provider.{}", field_path)
    };

    format!(
        "PARLEY_{}",
        normalized_path.replace('.', "__").to_uppercase()
    )
}
