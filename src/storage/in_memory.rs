//! In-memory implementation of EntityStore for testing and development

use crate::core::entity::{Entity, EntityId, EntityType, Fields};
use crate::core::query::{
    FilterClause, FilterKind, Page, PageRequest, Selection, SortClause, SortDirection, StoreQuery,
};
use crate::core::store::EntityStore;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Computed attribute: entity → value, exposed through `append`
pub type Appender = Arc<dyn Fn(&Entity) -> Value + Send + Sync>;

/// How an include is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// `entity.foreign_key` holds the id of one related entity
    BelongsTo,
    /// Related entities hold `entity.id` in their `foreign_key`
    HasMany,
}

/// A named relation, loaded through `include`
#[derive(Debug, Clone)]
pub struct Relation {
    pub kind: RelationKind,
    pub target: EntityType,
    pub foreign_key: String,
}

#[derive(Default)]
struct Table {
    last_id: EntityId,
    rows: BTreeMap<EntityId, Entity>,
}

/// In-memory entity store
///
/// Ids are auto-incremented per entity type, starting at 1. `created_at` and
/// `updated_at` are maintained as RFC 3339 strings once enabled with
/// [`with_timestamps`](Self::with_timestamps).
/// Uses RwLock for thread-safe access; clones share the same tables.
#[derive(Clone)]
pub struct InMemoryEntityStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    relations: HashMap<(String, String), Relation>,
    appenders: HashMap<(String, String), Appender>,
    timestamps: bool,
}

impl fmt::Debug for InMemoryEntityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEntityStore")
            .field("relations", &self.relations)
            .field("appenders", &self.appenders.keys().collect::<Vec<_>>())
            .field("timestamps", &self.timestamps)
            .finish()
    }
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            relations: HashMap::new(),
            appenders: HashMap::new(),
            timestamps: false,
        }
    }

    /// Maintain `created_at` / `updated_at` on create and update
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// `include=name` on `entity_type` loads the `target` whose id is in `foreign_key`
    pub fn belongs_to(
        mut self,
        entity_type: &EntityType,
        name: &str,
        target: EntityType,
        foreign_key: &str,
    ) -> Self {
        self.relations.insert(
            (entity_type.qualified().to_string(), name.to_string()),
            Relation {
                kind: RelationKind::BelongsTo,
                target,
                foreign_key: foreign_key.to_string(),
            },
        );
        self
    }

    /// `include=name` on `entity_type` loads every `target` pointing back through `foreign_key`
    pub fn has_many(
        mut self,
        entity_type: &EntityType,
        name: &str,
        target: EntityType,
        foreign_key: &str,
    ) -> Self {
        self.relations.insert(
            (entity_type.qualified().to_string(), name.to_string()),
            Relation {
                kind: RelationKind::HasMany,
                target,
                foreign_key: foreign_key.to_string(),
            },
        );
        self
    }

    /// Register a computed attribute available through `append=name`
    pub fn appender<F>(mut self, entity_type: &EntityType, name: &str, f: F) -> Self
    where
        F: Fn(&Entity) -> Value + Send + Sync + 'static,
    {
        self.appenders.insert(
            (entity_type.qualified().to_string(), name.to_string()),
            Arc::new(f),
        );
        self
    }

    /// Number of stored entities of a type
    pub fn count(&self, entity_type: &EntityType) -> Result<usize> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(tables
            .get(entity_type.qualified())
            .map_or(0, |t| t.rows.len()))
    }

    fn rows_of(tables: &HashMap<String, Table>, entity_type: &EntityType) -> Vec<Entity> {
        tables
            .get(entity_type.qualified())
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Apply includes, field selection and appends to one entity
    fn project(
        &self,
        tables: &HashMap<String, Table>,
        entity_type: &EntityType,
        entity: &Entity,
        selection: &Selection,
    ) -> Result<Entity> {
        let mut loaded = Vec::with_capacity(selection.includes.len());
        for name in &selection.includes {
            let relation = self
                .relations
                .get(&(entity_type.qualified().to_string(), name.clone()))
                .ok_or_else(|| anyhow!("Call to undefined relationship [{}] on {}", name, entity_type))?;
            let fields = selection
                .include_fields
                .get(name)
                .map(Vec::as_slice)
                .unwrap_or_default();
            loaded.push((name.clone(), Self::load(tables, relation, entity, fields)));
        }

        let mut projected = entity.select(&selection.fields);
        for (name, value) in loaded {
            projected.fields.insert(name, value);
        }

        for name in &selection.appends {
            let appender = self
                .appenders
                .get(&(entity_type.qualified().to_string(), name.clone()))
                .ok_or_else(|| anyhow!("Unknown appended attribute [{}] on {}", name, entity_type))?;
            projected.fields.insert(name.clone(), appender(entity));
        }

        Ok(projected)
    }

    fn load(
        tables: &HashMap<String, Table>,
        relation: &Relation,
        entity: &Entity,
        fields: &[String],
    ) -> Value {
        let related = Self::rows_of(tables, &relation.target);
        let to_value = |e: &Entity| serde_json::to_value(e.select(fields)).unwrap_or(Value::Null);

        match relation.kind {
            RelationKind::BelongsTo => {
                let key = entity.field(&relation.foreign_key).unwrap_or(Value::Null);
                related
                    .iter()
                    .find(|r| loosely_equal(&Value::from(r.id), &key))
                    .map(to_value)
                    .unwrap_or(Value::Null)
            }
            RelationKind::HasMany => {
                let id = Value::from(entity.id);
                Value::Array(
                    related
                        .iter()
                        .filter(|r| {
                            r.fields
                                .get(&relation.foreign_key)
                                .is_some_and(|v| loosely_equal(v, &id))
                        })
                        .map(to_value)
                        .collect(),
                )
            }
        }
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

fn textual(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Equality the way query string values compare to stored values: `"1" == 1`
fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (textual(a), textual(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn matches_filter(entity: &Entity, filter: &FilterClause) -> bool {
    let Some(value) = entity.field(&filter.field) else {
        return false;
    };
    let Some(text) = textual(&value) else {
        return false;
    };

    filter.values.iter().any(|wanted| match filter.kind {
        FilterKind::Partial => text.to_lowercase().contains(&wanted.to_lowercase()),
        FilterKind::Exact => text == *wanted,
    })
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn compare_entities(a: &Entity, b: &Entity, sorts: &[SortClause]) -> Ordering {
    for sort in sorts {
        let left = a.field(&sort.field).unwrap_or(Value::Null);
        let right = b.field(&sort.field).unwrap_or(Value::Null);
        let ordering = match sort.direction {
            SortDirection::Asc => compare_values(&left, &right),
            SortDirection::Desc => compare_values(&right, &left),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn find_by_id(
        &self,
        entity_type: &EntityType,
        id: EntityId,
        selection: &Selection,
    ) -> Result<Option<Entity>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let Some(entity) = tables
            .get(entity_type.qualified())
            .and_then(|t| t.rows.get(&id))
        else {
            return Ok(None);
        };

        self.project(&tables, entity_type, entity, selection).map(Some)
    }

    async fn query(
        &self,
        entity_type: &EntityType,
        query: &StoreQuery,
        page: PageRequest,
    ) -> Result<Page<Entity>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let mut matching: Vec<Entity> = Self::rows_of(&tables, entity_type)
            .into_iter()
            .filter(|e| {
                query.where_clauses.iter().all(|(field, expected)| {
                    e.field(field).is_some_and(|v| loosely_equal(&v, expected))
                })
            })
            .filter(|e| query.filters.iter().all(|f| matches_filter(e, f)))
            .collect();

        // stable, so equal keys keep id order
        matching.sort_by(|a, b| compare_entities(a, b, &query.sorts));

        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }

        let total = matching.len();
        let items = matching
            .iter()
            .skip(page.offset())
            .take(page.per_page)
            .map(|e| self.project(&tables, entity_type, e, &query.selection))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            request: page,
        })
    }

    async fn create(&self, entity_type: &EntityType, mut fields: Fields) -> Result<Entity> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        if self.timestamps {
            let now = Value::String(Utc::now().to_rfc3339());
            fields.insert("created_at".to_string(), now.clone());
            fields.insert("updated_at".to_string(), now);
        }

        let table = tables.entry(entity_type.qualified().to_string()).or_default();
        table.last_id += 1;
        let entity = Entity::new(table.last_id, fields);
        table.rows.insert(entity.id, entity.clone());

        Ok(entity)
    }

    async fn update(&self, entity_type: &EntityType, entity: &Entity, mut changes: Fields) -> Result<Entity> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let stored = tables
            .get_mut(entity_type.qualified())
            .and_then(|t| t.rows.get_mut(&entity.id))
            .ok_or_else(|| anyhow!("No query results for model [{}] {}", entity_type, entity.id))?;

        if self.timestamps {
            changes.insert(
                "updated_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
        stored.apply(&changes);

        Ok(stored.clone())
    }

    async fn delete(&self, entity_type: &EntityType, entity: &Entity) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        tables
            .get_mut(entity_type.qualified())
            .and_then(|t| t.rows.remove(&entity.id))
            .map(|_| ())
            .ok_or_else(|| anyhow!("No query results for model [{}] {}", entity_type, entity.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::AllowedFilter;
    use serde_json::json;

    fn project() -> EntityType {
        EntityType::new("app::models::Project")
    }

    fn task() -> EntityType {
        EntityType::new("app::models::Task")
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> InMemoryEntityStore {
        let store = InMemoryEntityStore::new()
            .has_many(&project(), "tasks", task(), "project_id")
            .belongs_to(&task(), "project", project(), "project_id")
            .appender(&project(), "title_length", |e| {
                json!(e.field("title").and_then(|t| t.as_str().map(str::len)).unwrap_or(0))
            });

        for (title, status) in [("Alpha", "open"), ("Beta", "closed"), ("Gamma", "open")] {
            store
                .create(&project(), fields(json!({"title": title, "status": status})))
                .await
                .unwrap();
        }
        store
            .create(&task(), fields(json!({"name": "Write", "project_id": 1})))
            .await
            .unwrap();
        store
    }

    fn page(n: usize, per_page: usize) -> PageRequest {
        PageRequest::new(n, per_page)
    }

    #[tokio::test]
    async fn test_ids_auto_increment_per_type() {
        let store = seeded().await;
        assert_eq!(store.count(&project()).unwrap(), 3);
        let e = store.find_by_id(&task(), 1, &Selection::default()).await.unwrap();
        assert_eq!(e.unwrap().field("name"), Some(json!("Write")));
    }

    #[tokio::test]
    async fn test_timestamps_maintained() {
        let plain = InMemoryEntityStore::new()
            .create(&project(), fields(json!({"title": "A"})))
            .await
            .unwrap();
        assert_eq!(plain, Entity::new(1, fields(json!({"title": "A"}))));

        let store = InMemoryEntityStore::new().with_timestamps();
        let created = store
            .create(&project(), fields(json!({"title": "A"})))
            .await
            .unwrap();
        assert!(created.fields.contains_key("created_at"));

        let updated = store
            .update(&project(), &created, fields(json!({"title": "B"})))
            .await
            .unwrap();
        assert_eq!(updated.fields["created_at"], created.fields["created_at"]);
        assert_eq!(updated.field("title"), Some(json!("B")));
    }

    #[tokio::test]
    async fn test_filters_and_where_clauses() {
        let store = seeded().await;

        let query = StoreQuery {
            filters: vec![FilterClause {
                field: AllowedFilter::partial("title").field().to_string(),
                kind: FilterKind::Partial,
                values: vec!["a".into()],
            }],
            where_clauses: vec![("status".into(), json!("open"))],
            ..Default::default()
        };
        let result = store.query(&project(), &query, page(1, 10)).await.unwrap();
        let titles: Vec<Value> = result.items.iter().filter_map(|e| e.field("title")).collect();
        assert_eq!(titles, vec![json!("Alpha"), json!("Gamma")]);
        assert_eq!(result.total, 2);

        let exact = StoreQuery {
            filters: vec![FilterClause {
                field: "title".into(),
                kind: FilterKind::Exact,
                values: vec!["alpha".into(), "Beta".into()],
            }],
            ..Default::default()
        };
        let result = store.query(&project(), &exact, page(1, 10)).await.unwrap();
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn test_sort_limit_and_pagination() {
        let store = seeded().await;
        let query = StoreQuery {
            sorts: vec![SortClause::parse("-title")],
            limit: Some(2),
            ..Default::default()
        };

        let first = store.query(&project(), &query, page(1, 1)).await.unwrap();
        assert_eq!(first.total, 2);
        assert_eq!(first.items[0].field("title"), Some(json!("Gamma")));

        let second = store.query(&project(), &query, page(2, 1)).await.unwrap();
        assert_eq!(second.items[0].field("title"), Some(json!("Beta")));

        let third = store.query(&project(), &query, page(3, 1)).await.unwrap();
        assert!(third.items.is_empty());
    }

    #[tokio::test]
    async fn test_selection_includes_and_appends() {
        let store = seeded().await;
        let mut include_fields = indexmap::IndexMap::new();
        include_fields.insert("tasks".to_string(), vec!["name".to_string()]);
        let selection = Selection {
            fields: vec!["title".into()],
            includes: vec!["tasks".into()],
            include_fields,
            appends: vec!["title_length".into()],
        };

        let entity = store
            .find_by_id(&project(), 1, &selection)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            serde_json::to_value(&entity).unwrap(),
            json!({
                "id": 1,
                "title": "Alpha",
                "tasks": [{"id": 1, "name": "Write"}],
                "title_length": 5
            })
        );

        let task_with_project = store
            .find_by_id(
                &task(),
                1,
                &Selection {
                    includes: vec!["project".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task_with_project.fields["project"]["title"], "Alpha");
    }

    #[tokio::test]
    async fn test_unknown_relation_is_an_error() {
        let store = seeded().await;
        let selection = Selection {
            includes: vec!["owner".into()],
            ..Default::default()
        };
        assert!(store.find_by_id(&project(), 1, &selection).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let store = seeded().await;
        let ghost = Entity::new(99, Fields::new());
        assert!(store.update(&project(), &ghost, Fields::new()).await.is_err());
        assert!(store.delete(&project(), &ghost).await.is_err());

        let first = store
            .find_by_id(&project(), 1, &Selection::default())
            .await
            .unwrap()
            .unwrap();
        store.delete(&project(), &first).await.unwrap();
        assert_eq!(store.count(&project()).unwrap(), 2);
    }
}
