use axum::{Json, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum ChronikosError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request body rejected: {0}")]
    JsonBody(#[from] JsonRejection),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("LLM returned an empty completion")]
    EmptyCompletion,

    #[error("Push service rejected the subscription endpoint")]
    PushSubscriptionGone,

    #[error("Push delivery error: {0}")]
    PushDelivery(String),

    #[error("Push notifications are not configured")]
    PushNotConfigured,

    #[error("Ractor error: {0}")]
    RactorError(String),
}

impl From<web_push::WebPushError> for ChronikosError {
    fn from(e: web_push::WebPushError) -> Self {
        use web_push::WebPushError;
        match e {
            WebPushError::EndpointNotValid { .. } | WebPushError::EndpointNotFound { .. } => {
                ChronikosError::PushSubscriptionGone
            }
            other => ChronikosError::PushDelivery(other.to_string()),
        }
    }
}

impl IntoResponse for ChronikosError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ChronikosError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ChronikosError::Json(_) => (
                StatusCode::BAD_REQUEST,
                "Malformed JSON payload.".to_string(),
            ),
            ChronikosError::JsonBody(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            ChronikosError::Unauthorized(_) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            ChronikosError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            ChronikosError::Reqwest(_)
            | ChronikosError::UrlParse(_)
            | ChronikosError::UpstreamStatus(_)
            | ChronikosError::EmptyCompletion => (
                StatusCode::BAD_GATEWAY,
                "Text generation service is unavailable.".to_string(),
            ),
            ChronikosError::PushSubscriptionGone | ChronikosError::PushDelivery(_) => (
                StatusCode::BAD_GATEWAY,
                "Push service is unavailable.".to_string(),
            ),
            ChronikosError::PushNotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Push notifications are not configured.".to_string(),
            ),
            ChronikosError::DatabaseError(_) | ChronikosError::RactorError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody::new(message))).into_response()
    }
}

/// `{ "success": false, "error": "..." }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let resp = ChronikosError::RactorError("mailbox closed".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.contains(r#""success":false"#));
        assert!(!body.contains("mailbox"));
    }

    #[tokio::test]
    async fn validation_errors_carry_message() {
        let resp = ChronikosError::InvalidInput("timezone is not a valid IANA name".into())
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.contains("timezone is not a valid IANA name"));
    }
}
