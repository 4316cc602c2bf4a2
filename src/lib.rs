//! # resource-rs
//!
//! Generic CRUD handlers for REST APIs in Rust.
//!
//! A [`ResourceHandler`](handler::ResourceHandler) serves list, create, get,
//! update and delete for any entity type. Persistence, authorization,
//! validation and serialization are injected collaborators:
//!
//! - [`EntityStore`](core::store::EntityStore): loads and persists entities
//! - [`QuerySpec`](core::query::QuerySpec): allow-lists for filters, sorts, includes, fields
//! - [`Validator`](core::validation::Validator): checks payloads against rule sets
//! - [`Authorizer`](core::auth::Authorizer): decides abilities per principal
//! - [`Serializer`](core::serializer::Serializer): entity → JSON, wrapped with `_model`
//!
//! ## Features
//!
//! - **Convention-Based Naming**: `ProjectApiController` → `Project` → `/projects`
//! - **Query Strings**: `filter[title]=x`, `sort=-created_at`, `include`, `fields`, `append`
//! - **Pagination**: `{data, links, meta}` with links preserving the query
//! - **Rule Strings**: `required|string|max:255`, per action overrides
//! - **Configuration-Based**: Declare resources in YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resource::prelude::*;
//!
//! let store = Arc::new(InMemoryEntityStore::new());
//! let projects = ResourceHandler::builder("ProjectApiController")
//!     .store(store)
//!     .rules(ValidationRules::shared(
//!         RuleSet::new().rule("title", "required|string|max:255")?,
//!     ))
//!     .build()?;
//!
//! ServerBuilder::new()
//!     .register(projects)
//!     .serve("127.0.0.1:3000")
//!     .await?;
//! ```

pub mod config;
pub mod core;
pub mod handler;
pub mod server;
pub mod storage;
pub mod testing;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        ability::{Ability, AbilitySet},
        auth::{AllowAll, AuthContext, AuthPolicy, Authorizer, PolicyAuthorizer, Subject},
        entity::{Entity, EntityId, EntityType, Fields},
        error::{ErrorPolicy, ResourceError},
        hooks::{NoHooks, ResourceHooks},
        naming::{HandlerConventions, ResourceName},
        query::{AllowedFilter, FilterKind, QueryParameterNames, QuerySpec},
        serializer::{Envelope, FieldSerializer, FnSerializer, Serializer, SerializerRegistry},
        store::EntityStore,
        validation::{FieldErrors, RuleSet, RuleValidator, ValidationRules, Validator},
    };

    // === Handler ===
    pub use crate::handler::{ActionResponse, RequestContext, ResourceHandler};

    // === Storage ===
    pub use crate::storage::InMemoryEntityStore;

    // === Config ===
    pub use crate::config::{ApiConfig, ResourceConfig};

    // === Server ===
    pub use crate::server::{AnonymousResolver, HeaderPrincipalResolver, PrincipalResolver, ServerBuilder};

    // === Testing ===
    pub use crate::testing::ResourceTestSuite;

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
    pub use uuid::Uuid;

    // === Axum ===
    pub use axum::Router;
}
