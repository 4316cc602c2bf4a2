//! Naming conventions: handler name → entity type → resource name
//!
//! A handler called `ProjectApiController` manages the `Project` entity type,
//! serializes it with the `Project` serializer and exposes it on `/projects`.
//! The derivation runs once, when the handler is built.

use crate::core::entity::EntityType;
use crate::core::pluralize::Pluralizer;
use serde::{Deserialize, Serialize};

/// Convert a type name to snake_case
///
/// ```
/// use resource::core::naming::snake_case;
///
/// assert_eq!(snake_case("Project"), "project");
/// assert_eq!(snake_case("ProjectCategory"), "project_category");
/// assert_eq!(snake_case("HTTPRequest"), "http_request");
/// ```
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, c) in chars.iter().enumerate() {
        if c.is_whitespace() || *c == '-' {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(*c);
        }
    }

    out
}

/// Externally visible naming of a resource
///
/// `name` is the snake_case singular (`project`), `endpoint` its plural
/// (`projects`), used as the collection path segment and in the `_model`
/// envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceName {
    pub name: String,
    pub endpoint: String,
}

impl ResourceName {
    /// Derive the resource name of an entity type basename
    pub fn derive(type_name: &str) -> Self {
        let name = snake_case(type_name);
        let endpoint = Pluralizer::pluralize(&name);
        Self { name, endpoint }
    }

    /// Use an explicit endpoint instead of the pluralized name
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Conventions used to guess a handler's entity type and serializer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConventions {
    /// Namespace prefixed to guessed entity types
    pub model_path: String,

    /// Namespace prefixed to guessed serializer names
    pub resource_path: String,

    /// Suffixes stripped from the handler name, tried in order
    pub append_names: Vec<String>,
}

impl Default for HandlerConventions {
    fn default() -> Self {
        Self {
            model_path: "app::models".to_string(),
            resource_path: "app::resources".to_string(),
            append_names: vec!["ApiController".to_string(), "Controller".to_string()],
        }
    }
}

impl HandlerConventions {
    /// Strip namespace and configured suffixes from a handler name
    ///
    /// Every suffix is removed wherever it occurs, in order, so
    /// `ProjectApiController` with `[ApiController, Controller]` yields `Project`.
    pub fn base_name(&self, handler_name: &str) -> String {
        let basename = handler_name.rsplit("::").next().unwrap_or(handler_name);
        // generic parameters never belong to the guessed name
        let basename = basename.split('<').next().unwrap_or(basename);

        self.append_names
            .iter()
            .filter(|suffix| !suffix.is_empty())
            .fold(basename.to_string(), |name, suffix| name.replace(suffix.as_str(), ""))
    }

    /// Guess the entity type managed by `handler_name`
    pub fn guess_entity_type(&self, handler_name: &str) -> EntityType {
        EntityType::namespaced(&self.model_path, &self.base_name(handler_name))
    }

    /// Guess the serializer name for `handler_name`
    ///
    /// The entity type basename wins over the handler name, so an overridden
    /// entity type drags its serializer along.
    pub fn guess_serializer(&self, entity_type: Option<&EntityType>, handler_name: &str) -> String {
        let base = match entity_type {
            Some(ty) if !ty.name().is_empty() => ty.name().to_string(),
            _ => self.base_name(handler_name),
        };
        let path = self.resource_path.trim_end_matches("::");
        if path.is_empty() {
            base
        } else {
            format!("{}::{}", path, base)
        }
    }

    /// Same as [`guess_entity_type`](Self::guess_entity_type) using a Rust type's name
    pub fn guess_entity_type_of<H: ?Sized>(&self) -> EntityType {
        self.guess_entity_type(std::any::type_name::<H>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("Project"), "project");
        assert_eq!(snake_case("BlogPost"), "blog_post");
        assert_eq!(snake_case("HTTPRequest"), "http_request");
        assert_eq!(snake_case("Invoice2Line"), "invoice2_line");
        assert_eq!(snake_case("already_snake"), "already_snake");
        assert_eq!(snake_case("Two Words"), "two_words");
    }

    #[test]
    fn test_resource_name_derive() {
        let name = ResourceName::derive("Project");
        assert_eq!(name.name, "project");
        assert_eq!(name.endpoint, "projects");

        let name = ResourceName::derive("ProjectCategory");
        assert_eq!(name.name, "project_category");
        assert_eq!(name.endpoint, "project_categories");

        let name = ResourceName::derive("Person").with_endpoint("members");
        assert_eq!(name.endpoint, "members");
    }

    #[test]
    fn test_base_name_strips_suffixes() {
        let conventions = HandlerConventions::default();
        assert_eq!(conventions.base_name("ProjectApiController"), "Project");
        assert_eq!(conventions.base_name("TaskController"), "Task");
        assert_eq!(conventions.base_name("my_app::handlers::UserApiController"), "User");
        assert_eq!(conventions.base_name("Plain"), "Plain");
    }

    #[test]
    fn test_guess_entity_type() {
        let conventions = HandlerConventions::default();
        let ty = conventions.guess_entity_type("ProjectApiController");
        assert_eq!(ty.qualified(), "app::models::Project");
        assert_eq!(ty.name(), "Project");
    }

    #[test]
    fn test_guess_serializer() {
        let conventions = HandlerConventions::default();
        assert_eq!(
            conventions.guess_serializer(None, "ProjectApiController"),
            "app::resources::Project"
        );

        let overridden = EntityType::new("domain::Task");
        assert_eq!(
            conventions.guess_serializer(Some(&overridden), "ProjectApiController"),
            "app::resources::Task"
        );
    }

    #[test]
    fn test_guess_from_rust_type() {
        struct InvoiceApiController;

        let conventions = HandlerConventions {
            model_path: String::new(),
            ..HandlerConventions::default()
        };
        let ty = conventions.guess_entity_type_of::<InvoiceApiController>();
        assert_eq!(ty.qualified(), "Invoice");
    }
}
