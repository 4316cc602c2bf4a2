//! HTTP exposure of resource handlers
//!
//! The `ServerBuilder` registers handlers, routes them under their endpoint
//! and adds health check routes.

pub mod builder;
pub mod principal;
pub mod resource_registry;
pub mod router;

pub use builder::{RESERVED_ENDPOINTS, ServerBuilder};
pub use principal::{AnonymousResolver, HeaderPrincipalResolver, PrincipalResolver};
pub use resource_registry::ResourceRegistry;
pub use router::{ResourceState, resource_routes};
