//! Configuration loading and management
//!
//! ```yaml
//! pagination:
//!   items: 20
//! error_policy: strict
//! resources:
//!   - handler: ProjectApiController
//!     allowed_filters:
//!       - name: title
//!     allowed_sorts: [title, created_at]
//!     authorize_abilities: [viewAny, store, update, destroy]
//!     policies:
//!       destroy: owner
//!     validation_rules:
//!       title: required|string|max:255
//!       update:
//!         title: sometimes|required|string|max:255
//! ```

use crate::core::ability::{Ability, AbilitySet};
use crate::core::auth::{AuthPolicy, PolicyAuthorizer};
use crate::core::entity::EntityType;
use crate::core::error::ErrorPolicy;
use crate::core::naming::HandlerConventions;
use crate::core::query::{DEFAULT_PER_PAGE, QueryParameterNames, QuerySpec};
use crate::core::validation::ValidationRules;
use crate::handler::{DEFAULT_MAX_PER_PAGE, ResourceHandler, ResourceHandlerBuilder};
use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Page size settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when neither the request nor the resource set one
    pub items: usize,

    /// Largest page size a request may ask for
    pub max_items: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            items: DEFAULT_PER_PAGE,
            max_items: DEFAULT_MAX_PER_PAGE,
        }
    }
}

/// Configuration of one exposed resource
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    /// Handler name, drives the entity type and serializer guesses
    pub handler: String,

    /// Explicit entity type (qualified name)
    #[serde(default)]
    pub model: Option<String>,

    /// Explicit serializer name
    #[serde(default)]
    pub resource: Option<String>,

    /// Name forced into the `_model` envelope
    #[serde(default)]
    pub model_name: Option<String>,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub per_page: Option<usize>,

    #[serde(flatten)]
    pub query: QuerySpec,

    /// Abilities checked with the authorizer
    #[serde(default)]
    pub authorize_abilities: AbilitySet,

    /// ability → policy string, see [`AuthPolicy::parse_policy`]
    #[serde(default)]
    pub policies: BTreeMap<Ability, String>,

    #[serde(default)]
    pub validation_rules: ValidationRules,
}

impl ResourceConfig {
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            model: None,
            resource: None,
            model_name: None,
            endpoint: None,
            per_page: None,
            query: QuerySpec::default(),
            authorize_abilities: AbilitySet::all(),
            policies: BTreeMap::new(),
            validation_rules: ValidationRules::default(),
        }
    }

    /// Entity type this resource manages under `conventions`
    pub fn entity_type(&self, conventions: &HandlerConventions) -> EntityType {
        match &self.model {
            Some(model) => EntityType::new(model.clone()),
            None => conventions.guess_entity_type(&self.handler),
        }
    }
}

fn default_policy() -> String {
    "authenticated".to_string()
}

/// Complete configuration of an API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub query_parameters: QueryParameterNames,

    #[serde(default)]
    pub error_policy: ErrorPolicy,

    #[serde(default)]
    pub conventions: HandlerConventions,

    /// Policy of abilities without an explicit one
    #[serde(default = "default_policy")]
    pub default_policy: String,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            pagination: PaginationConfig::default(),
            query_parameters: QueryParameterNames::default(),
            error_policy: ErrorPolicy::default(),
            conventions: HandlerConventions::default(),
            default_policy: default_policy(),
            resources: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Find a resource by handler name
    pub fn resource(&self, handler: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.handler == handler)
    }

    /// Handler builder preconfigured for `resource`
    ///
    /// Collaborators (store, authorizer, serializers, hooks) are left to the caller.
    pub fn handler_builder(&self, resource: &ResourceConfig) -> ResourceHandlerBuilder {
        let mut builder = ResourceHandler::builder(resource.handler.clone())
            .conventions(self.conventions.clone())
            .parameter_names(self.query_parameters.clone())
            .error_policy(self.error_policy)
            .default_per_page(self.pagination.items)
            .max_per_page(self.pagination.max_items)
            .query(resource.query.clone())
            .rules(resource.validation_rules.clone())
            .abilities(resource.authorize_abilities.clone());

        if let Some(model) = &resource.model {
            builder = builder.model(model.clone());
        }
        if let Some(name) = &resource.resource {
            builder = builder.serializer_name(name.clone());
        }
        if let Some(name) = &resource.model_name {
            builder = builder.model_name(name.clone());
        }
        if let Some(endpoint) = &resource.endpoint {
            builder = builder.endpoint(endpoint.clone());
        }
        if let Some(per_page) = resource.per_page {
            builder = builder.per_page(per_page);
        }
        builder
    }

    /// Policy table authorizer built from every resource's `policies`
    pub fn policy_authorizer(&self) -> PolicyAuthorizer {
        self.resources.iter().fold(
            PolicyAuthorizer::new().fallback(AuthPolicy::parse_policy(&self.default_policy)),
            |authorizer, resource| {
                let entity_type = resource.entity_type(&self.conventions);
                authorizer.type_policies(entity_type.qualified(), &resource.policies)
            },
        )
    }
}
