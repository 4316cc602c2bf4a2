//! Lifecycle hooks around persistence
//!
//! Hooks let a resource adjust validated data before it is written and the
//! entity after it was saved. Every hook defaults to the identity.

use crate::core::auth::AuthContext;
use crate::core::entity::{Entity, Fields};
use anyhow::Result;
use async_trait::async_trait;

/// Strategy object injected into a resource handler
///
/// Returning `Ok(None)` or an empty map from `before_create` / `before_update`
/// skips the write.
#[async_trait]
pub trait ResourceHooks: Send + Sync {
    /// Runs on validated data before an entity is created
    async fn before_create(&self, principal: &AuthContext, validated: Fields) -> Result<Option<Fields>> {
        let _ = principal;
        Ok(Some(validated))
    }

    /// Runs on validated data before `existing` is updated
    async fn before_update(
        &self,
        principal: &AuthContext,
        existing: &Entity,
        validated: Fields,
    ) -> Result<Option<Fields>> {
        let _ = (principal, existing);
        Ok(Some(validated))
    }

    /// Runs after a create or update was persisted
    async fn after_save(
        &self,
        principal: &AuthContext,
        entity: Entity,
        validated: &Fields,
    ) -> Result<Entity> {
        let _ = (principal, validated);
        Ok(entity)
    }
}

/// Identity hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl ResourceHooks for NoHooks {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Stamp;

    #[async_trait]
    impl ResourceHooks for Stamp {
        async fn before_create(&self, _: &AuthContext, mut validated: Fields) -> Result<Option<Fields>> {
            validated.insert("status".into(), json!("draft"));
            Ok(Some(validated))
        }
    }

    #[tokio::test]
    async fn test_defaults_are_identity() {
        let fields = json!({"title": "A"}).as_object().cloned().unwrap();
        let entity = Entity::new(1, fields.clone());
        let ctx = AuthContext::Anonymous;

        assert_eq!(NoHooks.before_create(&ctx, fields.clone()).await.unwrap(), Some(fields.clone()));
        assert_eq!(
            NoHooks.before_update(&ctx, &entity, fields.clone()).await.unwrap(),
            Some(fields.clone())
        );
        assert_eq!(NoHooks.after_save(&ctx, entity.clone(), &fields).await.unwrap(), entity);
    }

    #[tokio::test]
    async fn test_override_single_hook() {
        let fields = json!({"title": "A"}).as_object().cloned().unwrap();
        let ctx = AuthContext::Anonymous;
        let out = Stamp.before_create(&ctx, fields).await.unwrap().unwrap();
        assert_eq!(out["status"], "draft");
    }
}
