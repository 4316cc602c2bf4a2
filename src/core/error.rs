//! Typed errors of the resource handler
//!
//! Every failure of an action is one of the [`ResourceError`] kinds. The
//! handler never lets one escape: at its boundary the error is turned into a
//! status code (chosen by the configured [`ErrorPolicy`]) and an
//! [`ErrorEnvelope`]:
//!
//! ```json
//! {"error": true, "message": "This action is unauthorized."}
//! {"error": true, "message": {"title": ["The title field is required."]}}
//! ```
//!
//! # Example
//!
//! ```rust
//! use resource::core::error::{ErrorPolicy, ResourceError};
//! use axum::http::StatusCode;
//!
//! let err = ResourceError::not_found("app::models::Project", 7);
//! assert_eq!(ErrorPolicy::Strict.status(&err), StatusCode::NOT_FOUND);
//! assert_eq!(ErrorPolicy::Flattened.status(&err), StatusCode::BAD_REQUEST);
//! ```

use crate::core::ability::Ability;
use crate::core::entity::EntityId;
use crate::core::query::QueryError;
use crate::core::validation::FieldErrors;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Result alias used by handler internals
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Failure of a resource action
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// The payload broke one or more validation rules
    #[error("The given data was invalid. {0}")]
    ValidationFailed(FieldErrors),

    /// No entity with this id
    #[error("No query results for model [{entity_type}] {id}")]
    NotFound { entity_type: String, id: EntityId },

    /// The authorizer denied the ability
    #[error("This action is unauthorized.")]
    Forbidden { ability: Ability, subject: String },

    /// The query string asked for something outside the allow-lists
    #[error(transparent)]
    InvalidQuery(#[from] QueryError),

    /// A collaborator (store, authorizer, hook) failed
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ResourceError {
    pub fn not_found(entity_type: impl Into<String>, id: EntityId) -> Self {
        ResourceError::NotFound {
            entity_type: entity_type.into(),
            id,
        }
    }

    pub fn forbidden(ability: Ability, subject: impl Into<String>) -> Self {
        ResourceError::Forbidden {
            ability,
            subject: subject.into(),
        }
    }

    /// Short machine readable kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceError::ValidationFailed(_) => "validation_failed",
            ResourceError::NotFound { .. } => "not_found",
            ResourceError::Forbidden { .. } => "forbidden",
            ResourceError::InvalidQuery(_) => "invalid_query",
            ResourceError::Store(_) => "store",
        }
    }

    /// Body of the error response
    pub fn envelope(&self) -> ErrorEnvelope {
        let message = match self {
            ResourceError::ValidationFailed(errors) => ErrorMessage::Fields(errors.clone()),
            other => ErrorMessage::Text(other.to_string()),
        };
        ErrorEnvelope::new(message)
    }

    /// Status and body under `policy`
    pub fn into_response_with(self, policy: ErrorPolicy) -> Response {
        let status = policy.status(&self);
        (status, Json(self.envelope())).into_response()
    }
}

impl IntoResponse for ResourceError {
    fn into_response(self) -> Response {
        self.into_response_with(ErrorPolicy::default())
    }
}

/// How error kinds map to status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// 404 / 403 / 422 / 400 / 400
    #[default]
    Strict,

    /// Every error is a 400
    Flattened,
}

impl ErrorPolicy {
    pub fn status(&self, error: &ResourceError) -> StatusCode {
        if *self == ErrorPolicy::Flattened {
            return StatusCode::BAD_REQUEST;
        }
        match error {
            ResourceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ResourceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ResourceError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ResourceError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ResourceError::Store(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Either a plain message or per-field validation messages
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Fields(FieldErrors),
}

/// `{"error": true, "message": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub error: bool,
    pub message: ErrorMessage,
}

impl ErrorEnvelope {
    pub fn new(message: ErrorMessage) -> Self {
        Self {
            error: true,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn all_kinds() -> Vec<ResourceError> {
        let mut errors = FieldErrors::new();
        errors.add("title", "The title field is required.");
        vec![
            ResourceError::ValidationFailed(errors),
            ResourceError::not_found("app::models::Project", 1),
            ResourceError::forbidden(Ability::Update, "app::models::Project #1"),
            ResourceError::InvalidQuery(QueryError::InvalidParameter {
                parameter: "page".into(),
                value: "x".into(),
            }),
            ResourceError::Store(anyhow::anyhow!("connection refused")),
        ]
    }

    #[test]
    fn test_strict_policy_statuses() {
        let statuses: Vec<u16> = all_kinds()
            .iter()
            .map(|e| ErrorPolicy::Strict.status(e).as_u16())
            .collect();
        assert_eq!(statuses, vec![422, 404, 403, 400, 400]);
    }

    #[test]
    fn test_flattened_policy_is_always_bad_request() {
        assert!(
            all_kinds()
                .iter()
                .all(|e| ErrorPolicy::Flattened.status(e) == StatusCode::BAD_REQUEST)
        );
    }

    #[test]
    fn test_envelope_shapes() {
        let kinds = all_kinds();

        assert_eq!(
            serde_json::to_value(kinds[0].envelope()).unwrap(),
            json!({"error": true, "message": {"title": ["The title field is required."]}})
        );
        assert_eq!(
            serde_json::to_value(kinds[1].envelope()).unwrap(),
            json!({"error": true, "message": "No query results for model [app::models::Project] 1"})
        );
        assert_eq!(
            serde_json::to_value(kinds[2].envelope()).unwrap(),
            json!({"error": true, "message": "This action is unauthorized."})
        );
        assert_eq!(kinds[4].envelope().message, ErrorMessage::Text("connection refused".into()));
    }

    #[test]
    fn test_kinds() {
        let kinds: Vec<&str> = all_kinds().iter().map(ResourceError::kind).collect();
        assert_eq!(
            kinds,
            vec!["validation_failed", "not_found", "forbidden", "invalid_query", "store"]
        );
    }

    #[test]
    fn test_policy_deserializes_snake_case() {
        let policy: ErrorPolicy = serde_yaml::from_str("flattened").unwrap();
        assert_eq!(policy, ErrorPolicy::Flattened);
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Strict);
    }
}
