//! Entity serialization and the `_model` envelope
//!
//! A [`Serializer`] turns an entity into a transport mapping. The [`Envelope`]
//! then injects a `_model` block so a generic client can discover which
//! collection endpoint the entity belongs to:
//!
//! ```json
//! {"id": 1, "title": "A", "_model": {"endpoint": "projects", "name": "project"}}
//! ```

use crate::core::entity::{Entity, Fields};
use crate::core::naming::ResourceName;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// Key of the envelope block
pub const MODEL_KEY: &str = "_model";

/// Converts an entity into its transport representation
pub trait Serializer: Send + Sync {
    fn serialize(&self, entity: &Entity) -> Fields;
}

/// Serializes `id` and fields, optionally restricted or with hidden fields
#[derive(Debug, Clone, Default)]
pub struct FieldSerializer {
    visible: Option<Vec<String>>,
    hidden: Vec<String>,
}

impl FieldSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only ever output these fields (`id` always included)
    pub fn visible<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visible = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Never output these fields
    pub fn hidden<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl Serializer for FieldSerializer {
    fn serialize(&self, entity: &Entity) -> Fields {
        let mut out = Fields::new();
        out.insert("id".to_string(), Value::from(entity.id));

        for (key, value) in &entity.fields {
            let shown = self
                .visible
                .as_ref()
                .is_none_or(|visible| visible.iter().any(|v| v == key));
            if shown && !self.hidden.iter().any(|h| h == key) {
                out.insert(key.clone(), value.clone());
            }
        }

        out
    }
}

/// Serializer built from a closure
pub struct FnSerializer<F>(pub F);

impl<F> Serializer for FnSerializer<F>
where
    F: Fn(&Entity) -> Fields + Send + Sync,
{
    fn serialize(&self, entity: &Entity) -> Fields {
        (self.0)(entity)
    }
}

/// Injects the `_model` block after serialization
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    resource: ResourceName,
}

impl Envelope {
    pub fn new(resource: ResourceName) -> Self {
        Self { resource }
    }

    /// Envelope named after a forced model name instead of the entity type
    pub fn forced(model_name: &str) -> Self {
        Self::new(ResourceName::derive(model_name))
    }

    pub fn resource(&self) -> &ResourceName {
        &self.resource
    }

    /// Add the `_model` block to serialized attributes
    ///
    /// An attribute already named `_model` is replaced.
    pub fn wrap(&self, mut attributes: Fields) -> Value {
        attributes.insert(
            MODEL_KEY.to_string(),
            json!({
                "endpoint": self.resource.endpoint,
                "name": self.resource.name,
            }),
        );
        Value::Object(attributes)
    }

    /// Serialize and wrap one entity
    pub fn render(&self, serializer: &dyn Serializer, entity: &Entity) -> Value {
        self.wrap(serializer.serialize(entity))
    }

    /// Serialize and wrap every entity of a collection
    pub fn render_all(&self, serializer: &dyn Serializer, entities: &[Entity]) -> Vec<Value> {
        entities.iter().map(|e| self.render(serializer, e)).collect()
    }
}

/// Serializer factory: serializer name → serializer
///
/// Names not registered resolve to the fallback, a plain [`FieldSerializer`]
/// unless replaced.
#[derive(Clone)]
pub struct SerializerRegistry {
    serializers: HashMap<String, Arc<dyn Serializer>>,
    fallback: Arc<dyn Serializer>,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self {
            serializers: HashMap::new(),
            fallback: Arc::new(FieldSerializer::new()),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, serializer: impl Serializer + 'static) {
        self.serializers.insert(name.into(), Arc::new(serializer));
    }

    pub fn with_fallback(mut self, serializer: impl Serializer + 'static) -> Self {
        self.fallback = Arc::new(serializer);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.serializers.contains_key(name)
    }

    pub fn resolve(&self, name: &str) -> Arc<dyn Serializer> {
        self.serializers
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
