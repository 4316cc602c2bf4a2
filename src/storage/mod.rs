//! Entity store implementations

pub mod in_memory;

pub use in_memory::{Appender, InMemoryEntityStore, Relation, RelationKind};
