//! ServerBuilder for fluent API to build HTTP servers

use super::principal::{AnonymousResolver, PrincipalResolver};
use super::resource_registry::ResourceRegistry;
use crate::config::ApiConfig;
use crate::core::auth::Authorizer;
use crate::core::serializer::SerializerRegistry;
use crate::core::store::EntityStore;
use crate::handler::ResourceHandler;
use anyhow::{Result, bail};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Paths served by the health routes, unavailable as resource endpoints
pub const RESERVED_ENDPOINTS: [&str; 2] = ["health", "healthz"];

/// Builder for creating HTTP servers exposing resource handlers
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_principal_resolver(HeaderPrincipalResolver)
///     .register(project_handler)
///     .build()?;
/// ```
pub struct ServerBuilder {
    registry: ResourceRegistry,
    principals: Arc<dyn PrincipalResolver>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            registry: ResourceRegistry::new(),
            principals: Arc::new(AnonymousResolver),
            custom_routes: Vec::new(),
        }
    }

    /// Set how principals are read from requests (anonymous by default)
    pub fn with_principal_resolver(mut self, resolver: impl PrincipalResolver + 'static) -> Self {
        self.principals = Arc::new(resolver);
        self
    }

    /// Add routes that don't fit the resource pattern (login, webhooks, ...)
    ///
    /// They must not overlap `/health`, `/healthz` or a resource endpoint.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Expose a handler
    pub fn register(self, handler: ResourceHandler) -> Self {
        self.register_shared(Arc::new(handler))
    }

    /// Expose a handler that is also used elsewhere
    pub fn register_shared(mut self, handler: Arc<ResourceHandler>) -> Self {
        tracing::debug!(endpoint = %handler.endpoint(), "Registering resource");
        self.registry.register(handler);
        self
    }

    /// Build and register a handler for every resource of `config`
    ///
    /// All of them share `store`, `authorizer` and `serializers`.
    pub fn register_config(
        mut self,
        config: &ApiConfig,
        store: Arc<dyn EntityStore>,
        authorizer: Arc<dyn Authorizer>,
        serializers: &SerializerRegistry,
    ) -> Result<Self> {
        for resource in &config.resources {
            let handler = config
                .handler_builder(resource)
                .store(store.clone())
                .authorizer(authorizer.clone())
                .serializers(serializers.clone())
                .build()?;
            self = self.register(handler);
        }
        Ok(self)
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Build the final router
    ///
    /// Health routes, every resource's routes and custom routes, traced.
    pub fn build(self) -> Result<Router> {
        if self.registry.is_empty() {
            bail!("No resource registered. Call .register()");
        }
        if let Some(endpoint) = self
            .registry
            .endpoints()
            .into_iter()
            .find(|endpoint| RESERVED_ENDPOINTS.contains(endpoint))
        {
            bail!("Endpoint '{}' is reserved for health checks", endpoint);
        }

        let mut app = health_routes().merge(self.registry.build_routes(self.principals));
        for custom in self.custom_routes {
            app = app.merge(custom);
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    /// Serve the application with graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "resource-rs"
    }))
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::AllowAll;
    use crate::storage::InMemoryEntityStore;

    fn store() -> Arc<dyn EntityStore> {
        Arc::new(InMemoryEntityStore::new())
    }

    #[test]
    fn test_build_without_resources_fails() {
        assert!(ServerBuilder::new().build().is_err());
    }

    #[test]
    fn test_register_config() {
        let config = ApiConfig::from_yaml_str(
            r#"
resources:
  - handler: ProjectApiController
  - handler: TaskApiController
"#,
        )
        .unwrap();

        let builder = ServerBuilder::new()
            .register_config(&config, store(), Arc::new(AllowAll), &SerializerRegistry::new())
            .unwrap();
        assert_eq!(builder.registry().endpoints(), vec!["projects", "tasks"]);
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_custom_routes_are_merged() {
        let handler = ResourceHandler::builder("ProjectApiController")
            .store(store())
            .build()
            .unwrap();
        let custom = Router::new().route("/ping", get(|| async { "pong" }));
        assert!(
            ServerBuilder::new()
                .register(handler)
                .with_custom_routes(custom)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_reserved_endpoint_is_rejected() {
        for endpoint in RESERVED_ENDPOINTS {
            let handler = ResourceHandler::builder("ProjectApiController")
                .store(store())
                .endpoint(endpoint)
                .build()
                .unwrap();
            let error = ServerBuilder::new().register(handler).build().unwrap_err();
            assert!(error.to_string().contains("reserved"), "{}", error);
        }
    }
}
