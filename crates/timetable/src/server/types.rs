use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Error body returned by every endpoint.
///
/// Serialized as `{"error": ..., "context": ..., "details": ...}`; `context`
/// carries the underlying error text and `details` any structured data the
/// caller needs (violation lists, partial-commit counts).
#[derive(Debug)]
pub struct ApiErrorType {
    status: StatusCode,
    error: String,
    context: Option<String>,
    details: Option<Value>,
}

impl ApiErrorType {
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<(StatusCode, &str, Option<String>)> for ApiErrorType {
    fn from((status, error, context): (StatusCode, &str, Option<String>)) -> Self {
        Self {
            status,
            error: error.to_string(),
            context,
            details: None,
        }
    }
}

impl IntoResponse for ApiErrorType {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.error,
            "context": self.context,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}
