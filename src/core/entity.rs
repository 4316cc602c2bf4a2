//! Entity records and entity type descriptors
//!
//! The handler never knows the concrete shape of a record: every entity is an
//! identifier plus a bag of JSON fields, owned by the [`EntityStore`].
//!
//! [`EntityStore`]: crate::core::store::EntityStore

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a persisted entity
pub type EntityId = u64;

/// Field name → value mapping of an entity
pub type Fields = Map<String, Value>;

/// A persisted record: unique identifier plus its fields
///
/// Serializes flat, with `id` first followed by every field:
///
/// ```
/// use resource::core::entity::Entity;
/// use serde_json::json;
///
/// let entity = Entity::new(1, json!({"title": "A"}).as_object().cloned().unwrap());
/// assert_eq!(serde_json::to_value(&entity).unwrap(), json!({"id": 1, "title": "A"}));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,

    #[serde(flatten)]
    pub fields: Fields,
}

impl Entity {
    pub fn new(id: EntityId, fields: Fields) -> Self {
        // `id` is not a regular field, a stray one would shadow the real identifier
        let mut fields = fields;
        fields.remove("id");
        Self { id, fields }
    }

    /// Get the value of a field by name (`id` included)
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == "id" {
            return Some(Value::from(self.id));
        }
        self.fields.get(name).cloned()
    }

    /// Merge `changes` into the entity, leaving unspecified fields untouched
    pub fn apply(&mut self, changes: &Fields) {
        for (key, value) in changes {
            if key != "id" {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }

    /// Project the entity on a subset of fields
    ///
    /// `id` is always kept. An empty selection keeps everything.
    pub fn select(&self, fields: &[String]) -> Entity {
        if fields.is_empty() {
            return self.clone();
        }
        let fields = self
            .fields
            .iter()
            .filter(|(key, _)| fields.iter().any(|f| f == *key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Entity {
            id: self.id,
            fields,
        }
    }
}

/// Descriptor of an entity type
///
/// `qualified` is the namespaced name the store is addressed with
/// (e.g. `app::models::Project`), `name` its last path segment (`Project`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityType {
    qualified: String,
}

impl EntityType {
    pub fn new(qualified: impl Into<String>) -> Self {
        Self {
            qualified: qualified.into(),
        }
    }

    /// Build a type from a namespace prefix and a basename
    ///
    /// The namespace may end with `::` or not.
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        let namespace = namespace.trim_end_matches("::");
        if namespace.is_empty() {
            Self::new(name)
        } else {
            Self::new(format!("{}::{}", namespace, name))
        }
    }

    pub fn qualified(&self) -> &str {
        &self.qualified
    }

    /// The basename, without namespace
    pub fn name(&self) -> &str {
        self.qualified
            .rsplit("::")
            .next()
            .unwrap_or(&self.qualified)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified)
    }
}
