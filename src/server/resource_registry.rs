//! Registry of resource handlers, keyed by endpoint

use super::principal::PrincipalResolver;
use super::router::resource_routes;
use crate::handler::ResourceHandler;
use axum::Router;
use indexmap::IndexMap;
use std::sync::Arc;

/// All handlers exposed by a server
///
/// Registering a second handler on the same endpoint replaces the first.
#[derive(Default)]
pub struct ResourceRegistry {
    handlers: IndexMap<String, Arc<ResourceHandler>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<ResourceHandler>) {
        let endpoint = handler.endpoint().to_string();
        if self.handlers.insert(endpoint.clone(), handler).is_some() {
            tracing::warn!(endpoint = %endpoint, "Resource handler replaced");
        }
    }

    pub fn get(&self, endpoint: &str) -> Option<&Arc<ResourceHandler>> {
        self.handlers.get(endpoint)
    }

    /// Registered endpoints, in registration order
    pub fn endpoints(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Merge the routes of every registered handler
    pub fn build_routes(&self, principals: Arc<dyn PrincipalResolver>) -> Router {
        self.handlers
            .values()
            .fold(Router::new(), |router, handler| {
                router.merge(resource_routes(handler.clone(), principals.clone()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::principal::AnonymousResolver;
    use crate::storage::InMemoryEntityStore;

    fn handler(name: &str) -> Arc<ResourceHandler> {
        Arc::new(
            ResourceHandler::builder(name)
                .store(Arc::new(InMemoryEntityStore::new()))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_new_registry_is_empty() {
        assert!(ResourceRegistry::new().is_empty());
    }

    #[test]
    fn test_register_keeps_order() {
        let mut registry = ResourceRegistry::new();
        registry.register(handler("ProjectApiController"));
        registry.register(handler("CategoryController"));
        assert_eq!(registry.endpoints(), vec!["projects", "categories"]);
        assert!(registry.get("categories").is_some());
    }

    #[test]
    fn test_register_duplicate_replaces() {
        let mut registry = ResourceRegistry::new();
        registry.register(handler("ProjectApiController"));
        registry.register(handler("ProjectController"));
        assert_eq!(registry.endpoints().len(), 1);
    }

    #[test]
    fn test_build_routes() {
        let mut registry = ResourceRegistry::new();
        registry.register(handler("ProjectApiController"));
        let _router = registry.build_routes(Arc::new(AnonymousResolver));
    }
}
