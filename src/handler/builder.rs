//! Fluent construction of a [`ResourceHandler`]

use super::ResourceHandler;
use crate::core::ability::AbilitySet;
use crate::core::auth::{AllowAll, Authorizer};
use crate::core::entity::EntityType;
use crate::core::error::ErrorPolicy;
use crate::core::hooks::{NoHooks, ResourceHooks};
use crate::core::naming::{HandlerConventions, ResourceName};
use crate::core::query::{DEFAULT_PER_PAGE, QueryParameterNames, QuerySpec};
use crate::core::serializer::{Envelope, SerializerRegistry};
use crate::core::store::EntityStore;
use crate::core::validation::{RuleValidator, ValidationRules, Validator};
use anyhow::{Result, bail};
use std::sync::Arc;

/// Largest page a client may ask for
pub const DEFAULT_MAX_PER_PAGE: usize = 100;

/// Builder for [`ResourceHandler`]
///
/// Only the entity store is mandatory. Everything else defaults to the
/// permissive reference collaborators and the packaged conventions.
///
/// # Example
///
/// ```ignore
/// let handler = ResourceHandler::builder("ProjectApiController")
///     .store(store.clone())
///     .rules(ValidationRules::shared(rules))
///     .build()?;
///
/// assert_eq!(handler.endpoint(), "projects");
/// ```
pub struct ResourceHandlerBuilder {
    handler_name: String,
    model: Option<String>,
    serializer_name: Option<String>,
    model_name: Option<String>,
    endpoint: Option<String>,
    conventions: HandlerConventions,
    store: Option<Arc<dyn EntityStore>>,
    authorizer: Arc<dyn Authorizer>,
    validator: Arc<dyn Validator>,
    hooks: Arc<dyn ResourceHooks>,
    serializers: SerializerRegistry,
    query: QuerySpec,
    rules: ValidationRules,
    abilities: AbilitySet,
    per_page: Option<usize>,
    default_per_page: usize,
    max_per_page: usize,
    parameter_names: QueryParameterNames,
    error_policy: ErrorPolicy,
}

impl ResourceHandlerBuilder {
    pub fn new(handler_name: impl Into<String>) -> Self {
        Self {
            handler_name: handler_name.into(),
            model: None,
            serializer_name: None,
            model_name: None,
            endpoint: None,
            conventions: HandlerConventions::default(),
            store: None,
            authorizer: Arc::new(AllowAll),
            validator: Arc::new(RuleValidator),
            hooks: Arc::new(NoHooks),
            serializers: SerializerRegistry::default(),
            query: QuerySpec::default(),
            rules: ValidationRules::default(),
            abilities: AbilitySet::all(),
            per_page: None,
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: DEFAULT_MAX_PER_PAGE,
            parameter_names: QueryParameterNames::default(),
            error_policy: ErrorPolicy::default(),
        }
    }

    /// Set the entity store (required)
    pub fn store(mut self, store: Arc<dyn EntityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn hooks(mut self, hooks: impl ResourceHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = serializers;
        self
    }

    /// Explicit entity type, instead of the one guessed from the handler name
    pub fn model(mut self, qualified: impl Into<String>) -> Self {
        self.model = Some(qualified.into());
        self
    }

    /// Explicit serializer name, instead of the guessed one
    pub fn serializer_name(mut self, name: impl Into<String>) -> Self {
        self.serializer_name = Some(name.into());
        self
    }

    /// Force the name used in the `_model` envelope
    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    /// Explicit collection endpoint, instead of the pluralized name
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn conventions(mut self, conventions: HandlerConventions) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn query(mut self, query: QuerySpec) -> Self {
        self.query = query;
        self
    }

    pub fn rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    /// Abilities checked with the authorizer; the others are never checked
    pub fn abilities(mut self, abilities: AbilitySet) -> Self {
        self.abilities = abilities;
        self
    }

    /// Page size of this handler, used when the request does not set one
    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Page size used when neither the request nor the handler set one
    pub fn default_per_page(mut self, per_page: usize) -> Self {
        self.default_per_page = per_page;
        self
    }

    pub fn max_per_page(mut self, max: usize) -> Self {
        self.max_per_page = max;
        self
    }

    pub fn parameter_names(mut self, names: QueryParameterNames) -> Self {
        self.parameter_names = names;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Resolve names and serializer, then build the handler
    pub fn build(self) -> Result<ResourceHandler> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("EntityStore is required. Call .store()"))?;

        let entity_type = match self.model {
            Some(model) => EntityType::new(model),
            None => self.conventions.guess_entity_type(&self.handler_name),
        };
        if entity_type.name().is_empty() {
            bail!(
                "Cannot derive an entity type from handler name '{}'",
                self.handler_name
            );
        }

        let serializer_name = self.serializer_name.unwrap_or_else(|| {
            self.conventions
                .guess_serializer(Some(&entity_type), &self.handler_name)
        });
        let serializer = self.serializers.resolve(&serializer_name);

        let mut resource = match &self.model_name {
            Some(name) => ResourceName::derive(name),
            None => ResourceName::derive(entity_type.name()),
        };
        if let Some(endpoint) = self.endpoint {
            resource = resource.with_endpoint(endpoint);
        }

        tracing::debug!(
            entity_type = %entity_type,
            serializer = %serializer_name,
            endpoint = %resource.endpoint,
            "Resource handler resolved"
        );

        Ok(ResourceHandler {
            entity_type,
            envelope: Envelope::new(resource),
            serializer,
            store,
            authorizer: self.authorizer,
            validator: self.validator,
            hooks: self.hooks,
            query: self.query,
            rules: self.rules,
            abilities: self.abilities,
            per_page: self.per_page,
            default_per_page: self.default_per_page.max(1),
            max_per_page: self.max_per_page.max(1),
            parameter_names: self.parameter_names,
            error_policy: self.error_policy,
        })
    }
}
