//! Authorization for resource actions
//!
//! Provides context-based authorization:
//! - [`AuthContext`]: the principal extracted from a request
//! - [`Subject`]: what the principal acts on (an entity type or an instance)
//! - [`Authorizer`]: the yes/no decision seam used by the handler
//! - [`PolicyAuthorizer`]: a table of [`AuthPolicy`] per ability

use crate::core::ability::Ability;
use crate::core::entity::{Entity, EntityType};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Field checked by the `owner` policy when none is given
pub const DEFAULT_OWNER_FIELD: &str = "user_id";

/// Authorization context extracted from a request
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// Authenticated user
    User {
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        roles: Vec<String>,
    },

    /// Service-to-service communication
    Service {
        service_name: String,
        tenant_id: Option<Uuid>,
    },

    /// System administrator
    Admin { admin_id: Uuid },

    /// No authentication (public access)
    Anonymous,
}

impl AuthContext {
    /// Get tenant_id from context if available
    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            AuthContext::User { tenant_id, .. } => *tenant_id,
            AuthContext::Service { tenant_id, .. } => *tenant_id,
            AuthContext::Admin { .. } | AuthContext::Anonymous => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AuthContext::Admin { .. })
    }

    pub fn is_service(&self) -> bool {
        matches!(self, AuthContext::Service { .. })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, AuthContext::Anonymous)
    }

    /// Get user_id if available
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AuthContext::User { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        match self {
            AuthContext::User { roles, .. } => roles.iter().any(|r| r == role),
            _ => false,
        }
    }
}

/// What an ability is checked against
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    /// The entity type, for `viewAny` and `store`
    Type(&'a EntityType),

    /// A loaded entity, for `view`, `update` and `destroy`
    Instance(&'a EntityType, &'a Entity),
}

impl<'a> Subject<'a> {
    pub fn entity_type(&self) -> &'a EntityType {
        match self {
            Subject::Type(ty) | Subject::Instance(ty, _) => ty,
        }
    }

    pub fn entity(&self) -> Option<&'a Entity> {
        match self {
            Subject::Type(_) => None,
            Subject::Instance(_, entity) => Some(entity),
        }
    }

    /// Human readable description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Subject::Type(ty) => ty.to_string(),
            Subject::Instance(ty, entity) => format!("{} #{}", ty, entity.id),
        }
    }
}

/// The authorization seam
///
/// Implementations answer whether `principal` may perform `ability` on `subject`.
/// An `Err` is treated by the handler like any other collaborator fault.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn can(
        &self,
        ability: Ability,
        subject: Subject<'_>,
        principal: &AuthContext,
    ) -> Result<bool>;
}

/// Authorizer granting everything (for development)
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn can(&self, _: Ability, _: Subject<'_>, _: &AuthContext) -> Result<bool> {
        Ok(true)
    }
}

/// Authorization policy for an ability
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    /// Public access (no auth required)
    Public,

    /// Any authenticated principal
    Authenticated,

    /// The user whose id is stored in the given field of the entity
    Owner(String),

    /// User must have one of these roles
    HasRole(Vec<String>),

    /// Service-to-service only
    ServiceOnly,

    /// Admin only
    AdminOnly,

    /// Nobody
    Deny,

    /// Combination of policies (AND)
    And(Vec<AuthPolicy>),

    /// Combination of policies (OR)
    Or(Vec<AuthPolicy>),

    /// Custom policy function
    Custom(fn(&AuthContext, &Subject<'_>) -> bool),
}

impl AuthPolicy {
    /// Check if the principal satisfies this policy for `subject`
    pub fn check(&self, context: &AuthContext, subject: &Subject<'_>) -> bool {
        match self {
            AuthPolicy::Public => true,

            AuthPolicy::Authenticated => !context.is_anonymous(),

            AuthPolicy::Owner(field) => {
                let (Some(user_id), Some(entity)) = (context.user_id(), subject.entity()) else {
                    return false;
                };
                match entity.fields.get(field) {
                    Some(Value::String(owner)) => owner == &user_id.to_string(),
                    _ => false,
                }
            }

            AuthPolicy::HasRole(required_roles) => {
                required_roles.iter().any(|r| context.has_role(r))
            }

            AuthPolicy::ServiceOnly => context.is_service(),

            AuthPolicy::AdminOnly => context.is_admin(),

            AuthPolicy::Deny => false,

            AuthPolicy::And(policies) => policies.iter().all(|p| p.check(context, subject)),

            AuthPolicy::Or(policies) => policies.iter().any(|p| p.check(context, subject)),

            AuthPolicy::Custom(f) => f(context, subject),
        }
    }

    /// Parse policy from string (for YAML config)
    ///
    /// Admins pass every parsed policy except `deny`: `role:editor` reads as
    /// "editors or admins".
    pub fn parse_policy(s: &str) -> Self {
        let policy = match s {
            "public" => return AuthPolicy::Public,
            "deny" => return AuthPolicy::Deny,
            "authenticated" => AuthPolicy::Authenticated,
            "owner" => AuthPolicy::Owner(DEFAULT_OWNER_FIELD.to_string()),
            "service_only" => AuthPolicy::ServiceOnly,
            "admin_only" => return AuthPolicy::AdminOnly,
            s if s.starts_with("owner:") => {
                AuthPolicy::Owner(s.trim_start_matches("owner:").to_string())
            }
            s if s.starts_with("role:") => {
                let roles = s.trim_start_matches("role:");
                AuthPolicy::HasRole(roles.split(',').map(|r| r.trim().to_string()).collect())
            }
            s if s.starts_with("owner_or_role:") => {
                let role = s.trim_start_matches("owner_or_role:").to_string();
                AuthPolicy::Or(vec![
                    AuthPolicy::Owner(DEFAULT_OWNER_FIELD.to_string()),
                    AuthPolicy::HasRole(vec![role]),
                ])
            }
            _ => AuthPolicy::Authenticated, // Default
        };
        AuthPolicy::Or(vec![policy, AuthPolicy::AdminOnly])
    }
}

/// Authorizer backed by a table of policies
///
/// Lookup order: policy for (entity type, ability), then the default policy for
/// the ability, then the fallback (`authenticated` unless changed).
pub struct PolicyAuthorizer {
    defaults: HashMap<Ability, AuthPolicy>,
    per_type: HashMap<(String, Ability), AuthPolicy>,
    fallback: AuthPolicy,
}

impl PolicyAuthorizer {
    pub fn new() -> Self {
        Self {
            defaults: HashMap::new(),
            per_type: HashMap::new(),
            fallback: AuthPolicy::Authenticated,
        }
    }

    /// Policy applied to `ability` for every entity type without an override
    pub fn policy(mut self, ability: Ability, policy: AuthPolicy) -> Self {
        self.defaults.insert(ability, policy);
        self
    }

    /// Policy applied to `ability` for one entity type (qualified name)
    pub fn type_policy(
        mut self,
        entity_type: impl Into<String>,
        ability: Ability,
        policy: AuthPolicy,
    ) -> Self {
        self.per_type.insert((entity_type.into(), ability), policy);
        self
    }

    /// Register every policy of a `{ability: policy string}` table for one type
    pub fn type_policies<'a>(
        mut self,
        entity_type: &str,
        policies: impl IntoIterator<Item = (&'a Ability, &'a String)>,
    ) -> Self {
        for (ability, policy) in policies {
            self.per_type.insert(
                (entity_type.to_string(), *ability),
                AuthPolicy::parse_policy(policy),
            );
        }
        self
    }

    pub fn fallback(mut self, policy: AuthPolicy) -> Self {
        self.fallback = policy;
        self
    }

    fn resolve(&self, entity_type: &EntityType, ability: Ability) -> &AuthPolicy {
        self.per_type
            .get(&(entity_type.qualified().to_string(), ability))
            .or_else(|| self.defaults.get(&ability))
            .unwrap_or(&self.fallback)
    }
}

impl Default for PolicyAuthorizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authorizer for PolicyAuthorizer {
    async fn can(
        &self,
        ability: Ability,
        subject: Subject<'_>,
        principal: &AuthContext,
    ) -> Result<bool> {
        let policy = self.resolve(subject.entity_type(), ability);
        Ok(policy.check(principal, &subject))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(roles: &[&str]) -> AuthContext {
        AuthContext::User {
            user_id: Uuid::new_v4(),
            tenant_id: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn project() -> EntityType {
        EntityType::new("app::models::Project")
    }

    fn owned_by(user_id: Uuid) -> Entity {
        Entity::new(
            1,
            json!({"title": "A", "user_id": user_id.to_string()})
                .as_object()
                .cloned()
                .unwrap(),
        )
    }

    #[test]
    fn test_policy_check() {
        let ty = project();
        let subject = Subject::Type(&ty);
        let ctx = user(&["admin"]);

        assert!(AuthPolicy::Authenticated.check(&ctx, &subject));
        assert!(AuthPolicy::HasRole(vec!["admin".into()]).check(&ctx, &subject));
        assert!(!AuthPolicy::Owner("user_id".into()).check(&ctx, &subject));

        let anon = AuthContext::Anonymous;
        assert!(AuthPolicy::Public.check(&anon, &subject));
        assert!(!AuthPolicy::Authenticated.check(&anon, &subject));
        assert!(!AuthPolicy::Deny.check(&ctx, &subject));
    }

    #[test]
    fn test_owner_policy_compares_field() {
        let ty = project();
        let owner_id = Uuid::new_v4();
        let entity = owned_by(owner_id);
        let subject = Subject::Instance(&ty, &entity);

        let owner = AuthContext::User {
            user_id: owner_id,
            tenant_id: None,
            roles: vec![],
        };
        assert!(AuthPolicy::Owner("user_id".into()).check(&owner, &subject));
        assert!(!AuthPolicy::Owner("user_id".into()).check(&user(&[]), &subject));
        assert!(!AuthPolicy::Owner("author_id".into()).check(&owner, &subject));
    }

    #[test]
    fn test_parse_policy() {
        let ty = project();
        let subject = Subject::Type(&ty);
        let admin = AuthContext::Admin {
            admin_id: Uuid::new_v4(),
        };

        assert!(matches!(AuthPolicy::parse_policy("public"), AuthPolicy::Public));
        assert!(matches!(AuthPolicy::parse_policy("deny"), AuthPolicy::Deny));

        let editor = AuthPolicy::parse_policy("role:editor, writer");
        assert!(editor.check(&user(&["writer"]), &subject));
        assert!(editor.check(&admin, &subject));
        assert!(!editor.check(&user(&["reader"]), &subject));

        let unknown = AuthPolicy::parse_policy("something_unknown");
        assert!(unknown.check(&user(&[]), &subject));
        assert!(!unknown.check(&AuthContext::Anonymous, &subject));
    }

    #[test]
    fn test_parse_owner_or_role() {
        let ty = project();
        let owner_id = Uuid::new_v4();
        let entity = owned_by(owner_id);
        let subject = Subject::Instance(&ty, &entity);
        let policy = AuthPolicy::parse_policy("owner_or_role:manager");

        let owner = AuthContext::User {
            user_id: owner_id,
            tenant_id: None,
            roles: vec![],
        };
        assert!(policy.check(&owner, &subject));
        assert!(policy.check(&user(&["manager"]), &subject));
        assert!(!policy.check(&user(&["viewer"]), &subject));
    }

    #[test]
    fn test_auth_context_accessors() {
        let tid = Uuid::new_v4();
        let ctx = AuthContext::Service {
            service_name: "billing".to_string(),
            tenant_id: Some(tid),
        };
        assert_eq!(ctx.tenant_id(), Some(tid));
        assert!(ctx.is_service());
        assert_eq!(ctx.user_id(), None);
        assert!(AuthContext::Anonymous.is_anonymous());
        assert!(
            AuthContext::Admin {
                admin_id: Uuid::new_v4()
            }
            .is_admin()
        );
    }

    #[tokio::test]
    async fn test_policy_authorizer_resolution_order() {
        let ty = project();
        let authorizer = PolicyAuthorizer::new()
            .policy(Ability::ViewAny, AuthPolicy::Public)
            .type_policy(ty.qualified(), Ability::Destroy, AuthPolicy::AdminOnly);

        let anon = AuthContext::Anonymous;
        let member = user(&[]);

        assert!(authorizer.can(Ability::ViewAny, Subject::Type(&ty), &anon).await.unwrap());
        // fallback: authenticated
        assert!(!authorizer.can(Ability::Store, Subject::Type(&ty), &anon).await.unwrap());
        assert!(authorizer.can(Ability::Store, Subject::Type(&ty), &member).await.unwrap());

        let entity = owned_by(Uuid::new_v4());
        let instance = Subject::Instance(&ty, &entity);
        assert!(!authorizer.can(Ability::Destroy, instance, &member).await.unwrap());
    }

    #[tokio::test]
    async fn test_allow_all() {
        let ty = project();
        let allowed = AllowAll
            .can(Ability::Destroy, Subject::Type(&ty), &AuthContext::Anonymous)
            .await
            .unwrap();
        assert!(allowed);
    }
}
