//! Transport-neutral action results

use crate::core::error::{ErrorPolicy, ResourceError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

/// Status code plus optional JSON body
///
/// Every handler action produces one, errors included.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl ActionResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn created(body: Value) -> Self {
        Self::new(StatusCode::CREATED, body)
    }

    /// Status without body
    pub fn empty(status: StatusCode) -> Self {
        Self { status, body: None }
    }

    /// Render an error under `policy`
    pub fn error(error: &ResourceError, policy: ErrorPolicy) -> Self {
        // a string or string map always serializes
        let body = serde_json::to_value(error.envelope()).unwrap_or_default();
        Self::new(policy.status(error), body)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body, or `null` when there is none
    pub fn json(&self) -> Value {
        self.body.clone().unwrap_or(Value::Null)
    }
}

impl IntoResponse for ActionResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_rendering() {
        let err = ResourceError::not_found("app::models::Project", 3);

        let strict = ActionResponse::error(&err, ErrorPolicy::Strict);
        assert_eq!(strict.status, StatusCode::NOT_FOUND);
        assert_eq!(strict.json()["error"], json!(true));

        let flat = ActionResponse::error(&err, ErrorPolicy::Flattened);
        assert_eq!(flat.status, StatusCode::BAD_REQUEST);
        assert!(!flat.is_success());
    }

    #[test]
    fn test_empty_body() {
        let response = ActionResponse::empty(StatusCode::OK);
        assert!(response.is_success());
        assert_eq!(response.json(), Value::Null);
    }
}
