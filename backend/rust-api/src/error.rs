use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm::LlmError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error taxonomy shared by every service. Handlers convert these into the
/// JSON envelope; nothing escapes to the framework's default error page.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("API kullanım limiti aşıldı. Lütfen daha sonra tekrar deneyin.")]
    RateLimited {
        #[source]
        source: LlmError,
    },
    #[error("upstream model call failed")]
    Upstream {
        #[source]
        source: LlmError,
    },
    #[error("{0}")]
    Storage(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// The provider does not expose a typed quota error, so rate limiting is
/// detected from the error text.
pub fn is_rate_limit(error: &LlmError) -> bool {
    let text = match error {
        LlmError::Status { body, status } => {
            if *status == 429 {
                return true;
            }
            body.to_lowercase()
        }
        other => other.to_string().to_lowercase(),
    };
    text.contains("rate limit") || text.contains("quota")
}

impl From<LlmError> for ServiceError {
    fn from(error: LlmError) -> Self {
        if is_rate_limit(&error) {
            ServiceError::RateLimited { source: error }
        } else {
            ServiceError::Upstream { source: error }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServiceError::Validation(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ServiceError::NotFound(message) => {
                (StatusCode::NOT_FOUND, json!({ "error": message }))
            }
            ServiceError::Conflict(message) => (StatusCode::CONFLICT, json!({ "error": message })),
            ServiceError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": self.to_string() }),
            ),
            ServiceError::Upstream { source } => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "Yanıt oluşturulurken bir hata oluştu. Lütfen tekrar deneyin.",
                    "details": source.to_string(),
                }),
            ),
            ServiceError::Storage(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "storage failure", "details": message }),
            ),
            ServiceError::Internal(source) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "internal error", "details": source.to_string() }),
            ),
        };

        if status.is_server_error() {
            tracing::error!("request failed: {} ({})", self, status);
        } else {
            tracing::warn!("request rejected: {} ({})", self, status);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limit() {
        let error = LlmError::Status {
            status: 429,
            body: "slow down".to_string(),
        };
        assert!(is_rate_limit(&error));
    }

    #[test]
    fn quota_text_is_rate_limit() {
        let error = LlmError::Status {
            status: 400,
            body: "You exceeded your current quota".to_string(),
        };
        assert!(is_rate_limit(&error));
    }

    #[test]
    fn timeout_is_not_rate_limit() {
        let error = LlmError::Timeout(std::time::Duration::from_secs(1));
        assert!(!is_rate_limit(&error));
    }
}
