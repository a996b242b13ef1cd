use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::base::Usage;
use super::errors::ProviderError;

static FUNCTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid function name pattern"));

// Maps a non-ok response status to a ProviderError
pub async fn non_ok_response_to_provider_error(
    payload: &Value,
    response: Response,
) -> ProviderError {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Authentication(format!("Authentication failed. Please ensure your API keys are valid and have the required permissions. \
                Status: {}. Response: {:?}", response.status(), response.text().await.unwrap_or_default()))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::RateLimitExceeded(format!("Rate limit exceeded. Please retry after some time. Status: {}", response.status()))
        }
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
            ProviderError::ServerError(format!("Server error occurred. Status: {}", response.status()))
        }
        _ => {
            let status = response.status();
            debug!(
                "Provider request failed with status: {}. Body: {:?}. Payload: {}",
                status,
                response.text().await.unwrap_or_default(),
                payload
            );
            ProviderError::RequestFailed(format!("Request failed with status: {}.", status))
        }
    }
}

/// Returns the response untouched on 200, otherwise the mapped error
pub async fn check_status(payload: &Value, response: Response) -> Result<Response, ProviderError> {
    match response.status() {
        StatusCode::OK => Ok(response),
        _ => Err(non_ok_response_to_provider_error(payload, response).await),
    }
}

pub async fn handle_response(payload: &Value, response: Response) -> Result<Value, ProviderError> {
    let response = check_status(payload, response).await?;
    Ok(response.json().await?)
}

/// An `error` object embedded in an otherwise successful body
pub fn check_error_body(data: &Value) -> Result<(), ProviderError> {
    match data.get("error") {
        Some(error) if !error.is_null() => {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            if message.to_lowercase().contains("context length") {
                Err(ProviderError::ContextLengthExceeded(message))
            } else {
                Err(ProviderError::ServerError(message))
            }
        }
        _ => Ok(()),
    }
}

pub fn is_valid_function_name(name: &str) -> bool {
    FUNCTION_NAME.is_match(name)
}

/// Extract the model name from a JSON object. Common with most providers to have this top level attribute.
pub fn get_model(data: &Value) -> String {
    data.get("model")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string()
}

pub fn get_usage(data: &Value) -> Usage {
    let usage = match data.get("usage") {
        Some(usage) => usage,
        None => return Usage::default(),
    };
    let read = |key: &str| {
        usage
            .get(key)
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok())
    };

    let input_tokens = read("prompt_tokens");
    let output_tokens = read("completion_tokens");
    let total_tokens = read("total_tokens").or_else(|| match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => input.checked_add(output),
        _ => None,
    });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

pub fn emit_debug_trace(model: &str, payload: &Value, response: &Value, usage: &Usage) {
    debug!(
        model = %model,
        input = %serde_json::to_string_pretty(payload).unwrap_or_default(),
        output = %serde_json::to_string_pretty(response).unwrap_or_default(),
        input_tokens = ?usage.input_tokens.unwrap_or_default(),
        output_tokens = ?usage.output_tokens.unwrap_or_default(),
        total_tokens = ?usage.total_tokens.unwrap_or_default(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_valid_function_name() {
        assert!(is_valid_function_name("hello-world"));
        assert!(is_valid_function_name("calculate_ctr"));
        assert!(!is_valid_function_name("hello world"));
        assert!(!is_valid_function_name("hello@world"));
        assert!(!is_valid_function_name(""));
    }

    #[test]
    fn test_get_model() {
        assert_eq!(get_model(&json!({"model": "gpt-4o"})), "gpt-4o");
        assert_eq!(get_model(&json!({"model": 4})), "Unknown");
        assert_eq!(get_model(&json!({})), "Unknown");
    }

    #[test]
    fn test_get_usage() {
        let usage = get_usage(&json!({
            "usage": {"prompt_tokens": 12, "completion_tokens": 15, "total_tokens": 27}
        }));
        assert_eq!(usage, Usage::new(Some(12), Some(15), Some(27)));

        let usage = get_usage(&json!({"usage": {"prompt_tokens": 2, "completion_tokens": 3}}));
        assert_eq!(usage.total_tokens, Some(5));

        assert_eq!(get_usage(&json!({})), Usage::default());

        let usage = get_usage(&json!({
            "usage": {"prompt_tokens": i32::MAX, "completion_tokens": 1}
        }));
        assert_eq!(usage.input_tokens, Some(i32::MAX));
        assert_eq!(usage.total_tokens, None);
    }

    #[test]
    fn test_check_error_body() {
        assert!(check_error_body(&json!({"choices": []})).is_ok());
        assert!(check_error_body(&json!({"error": null})).is_ok());

        let err = check_error_body(&json!({"error": {"message": "boom"}})).unwrap_err();
        assert_eq!(err.to_string(), "Server error: boom");

        let err = check_error_body(&json!({
            "error": {"message": "This model's maximum context length is 8192 tokens"}
        }))
        .unwrap_err();
        assert!(matches!(err, ProviderError::ContextLengthExceeded(_)));
    }
}
