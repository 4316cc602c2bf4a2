//! Authorization abilities and the per-handler enabled set

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One of the five actions a principal may be authorized for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ability {
    /// List the collection
    ViewAny,
    /// Read a single entity
    View,
    /// Create an entity
    Store,
    /// Modify an entity
    Update,
    /// Remove an entity
    Destroy,
}

impl Ability {
    pub const ALL: [Ability; 5] = [
        Ability::ViewAny,
        Ability::View,
        Ability::Store,
        Ability::Update,
        Ability::Destroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ability::ViewAny => "viewAny",
            Ability::View => "view",
            Ability::Store => "store",
            Ability::Update => "update",
            Ability::Destroy => "destroy",
        }
    }

    /// Whether the ability is checked against an entity instance rather than its type
    pub fn targets_instance(&self) -> bool {
        matches!(self, Ability::View | Ability::Update | Ability::Destroy)
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown ability name
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown ability '{0}'")]
pub struct UnknownAbility(pub String);

impl FromStr for Ability {
    type Err = UnknownAbility;

    /// Parse an ability, accepting the action aliases (`index`, `show`, `create`,
    /// `edit`, `delete`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewAny" | "view_any" | "index" => Ok(Ability::ViewAny),
            "view" | "show" => Ok(Ability::View),
            "store" | "create" => Ok(Ability::Store),
            "update" | "edit" => Ok(Ability::Update),
            "destroy" | "delete" => Ok(Ability::Destroy),
            other => Err(UnknownAbility(other.to_string())),
        }
    }
}

impl Serialize for Ability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Ability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The set of abilities a handler enforces
///
/// Abilities outside the set are never checked: the action proceeds without
/// consulting the authorizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilitySet(BTreeSet<Ability>);

impl AbilitySet {
    /// Every ability enforced
    pub fn all() -> Self {
        Self(Ability::ALL.into_iter().collect())
    }

    /// No authorization at all
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn with(mut self, ability: Ability) -> Self {
        self.0.insert(ability);
        self
    }

    pub fn without(mut self, ability: Ability) -> Self {
        self.0.remove(&ability);
        self
    }

    pub fn enforces(&self, ability: Ability) -> bool {
        self.0.contains(&ability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ability> + '_ {
        self.0.iter().copied()
    }
}

impl Default for AbilitySet {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<Ability> for AbilitySet {
    fn from_iter<I: IntoIterator<Item = Ability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("index".parse::<Ability>().unwrap(), Ability::ViewAny);
        assert_eq!("viewAny".parse::<Ability>().unwrap(), Ability::ViewAny);
        assert_eq!("show".parse::<Ability>().unwrap(), Ability::View);
        assert_eq!("create".parse::<Ability>().unwrap(), Ability::Store);
        assert_eq!("edit".parse::<Ability>().unwrap(), Ability::Update);
        assert_eq!("delete".parse::<Ability>().unwrap(), Ability::Destroy);
        assert!("publish".parse::<Ability>().is_err());
    }

    #[test]
    fn test_targets_instance() {
        assert!(!Ability::ViewAny.targets_instance());
        assert!(!Ability::Store.targets_instance());
        assert!(Ability::View.targets_instance());
        assert!(Ability::Update.targets_instance());
        assert!(Ability::Destroy.targets_instance());
    }

    #[test]
    fn test_default_set_enforces_everything() {
        let set = AbilitySet::default();
        for ability in Ability::ALL {
            assert!(set.enforces(ability));
        }
        assert!(!set.without(Ability::View).enforces(Ability::View));
    }

    #[test]
    fn test_set_deserializes_aliases() {
        let set: AbilitySet = serde_yaml::from_str("[create, edit]").unwrap();
        assert!(set.enforces(Ability::Store));
        assert!(set.enforces(Ability::Update));
        assert!(!set.enforces(Ability::Destroy));
    }

    #[test]
    fn test_empty_set() {
        let set = AbilitySet::none();
        assert!(set.is_empty());
        assert!(!set.enforces(Ability::ViewAny));
    }
}
