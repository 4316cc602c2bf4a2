//! Core types and collaborator seams of the resource handler

pub mod ability;
pub mod auth;
pub mod entity;
pub mod error;
pub mod hooks;
pub mod naming;
pub mod pluralize;
pub mod query;
pub mod serializer;
pub mod store;
pub mod validation;

pub use ability::{Ability, AbilitySet};
pub use auth::{AllowAll, AuthContext, AuthPolicy, Authorizer, PolicyAuthorizer, Subject};
pub use entity::{Entity, EntityId, EntityType, Fields};
pub use error::{ErrorEnvelope, ErrorPolicy, ResourceError, ResourceResult};
pub use hooks::{NoHooks, ResourceHooks};
pub use naming::{HandlerConventions, ResourceName};
pub use pluralize::Pluralizer;
pub use query::{
    AllowedFilter, FilterKind, Page, PageRequest, PaginatedResponse, QueryError,
    QueryParameterNames, QueryParams, QuerySpec, Selection, SortClause, SortDirection, StoreQuery,
};
pub use serializer::{Envelope, FieldSerializer, FnSerializer, Serializer, SerializerRegistry};
pub use store::EntityStore;
pub use validation::{FieldErrors, RuleAction, RuleSet, RuleValidator, ValidationRules, Validator};
