//! Declarative validation rules
//!
//! Rules are written as pipe-separated constraint expressions, one per field:
//!
//! ```yaml
//! validation_rules:
//!   title: required|string|max:255
//!   description: nullable|string
//!   store:
//!     owner_id: required|integer
//!   update:
//!     title: sometimes|string|max:255
//! ```
//!
//! Top level entries form the base rule set; `store` and `update` entries
//! override it field by field for that action.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// A single constraint on a field
#[derive(Debug, Clone)]
pub enum Rule {
    /// Present and not empty
    Required,
    /// Only validate when present
    Sometimes,
    /// `null` is accepted and skips the remaining rules
    Nullable,
    String,
    Integer,
    Numeric,
    Boolean,
    Array,
    Email,
    /// Minimum length, value or element count depending on the value type
    Min(f64),
    /// Maximum length, value or element count depending on the value type
    Max(f64),
    Between(f64, f64),
    In(Vec<String>),
    NotIn(Vec<String>),
    Regex(Regex),
    /// A date string in the given chrono format
    DateFormat(String),
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Rule::Regex(a), Rule::Regex(b)) => a.as_str() == b.as_str(),
            _ => self.to_string() == other.to_string(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => f.write_str("required"),
            Rule::Sometimes => f.write_str("sometimes"),
            Rule::Nullable => f.write_str("nullable"),
            Rule::String => f.write_str("string"),
            Rule::Integer => f.write_str("integer"),
            Rule::Numeric => f.write_str("numeric"),
            Rule::Boolean => f.write_str("boolean"),
            Rule::Array => f.write_str("array"),
            Rule::Email => f.write_str("email"),
            Rule::Min(n) => write!(f, "min:{}", n),
            Rule::Max(n) => write!(f, "max:{}", n),
            Rule::Between(a, b) => write!(f, "between:{},{}", a, b),
            Rule::In(values) => write!(f, "in:{}", values.join(",")),
            Rule::NotIn(values) => write!(f, "not_in:{}", values.join(",")),
            Rule::Regex(re) => write!(f, "regex:{}", re.as_str()),
            Rule::DateFormat(format) => write!(f, "date_format:{}", format),
        }
    }
}

/// Error raised for a malformed constraint expression
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleParseError {
    #[error("unknown validation rule '{0}'")]
    UnknownRule(String),

    #[error("rule '{rule}' expects {expected}")]
    InvalidArgument { rule: String, expected: &'static str },
}

fn number_arg(rule: &str, arg: Option<&str>) -> Result<f64, RuleParseError> {
    arg.and_then(|a| a.trim().parse::<f64>().ok())
        .ok_or_else(|| RuleParseError::InvalidArgument {
            rule: rule.to_string(),
            expected: "a numeric argument",
        })
}

fn list_arg(rule: &str, arg: Option<&str>) -> Result<Vec<String>, RuleParseError> {
    match arg {
        Some(a) if !a.is_empty() => Ok(a.split(',').map(|v| v.trim().to_string()).collect()),
        _ => Err(RuleParseError::InvalidArgument {
            rule: rule.to_string(),
            expected: "a comma separated list",
        }),
    }
}

impl Rule {
    /// Parse one constraint (`max:255`, `in:a,b`, `required`)
    pub fn parse(expr: &str) -> Result<Self, RuleParseError> {
        let expr = expr.trim();
        let (name, arg) = match expr.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (expr, None),
        };

        Ok(match name {
            "required" => Rule::Required,
            "sometimes" => Rule::Sometimes,
            "nullable" => Rule::Nullable,
            "string" => Rule::String,
            "integer" | "int" => Rule::Integer,
            "numeric" => Rule::Numeric,
            "boolean" | "bool" => Rule::Boolean,
            "array" => Rule::Array,
            "email" => Rule::Email,
            "min" => Rule::Min(number_arg(name, arg)?),
            "max" => Rule::Max(number_arg(name, arg)?),
            "between" => {
                let bounds = list_arg(name, arg)?;
                match bounds.as_slice() {
                    [low, high] => Rule::Between(
                        number_arg(name, Some(low))?,
                        number_arg(name, Some(high))?,
                    ),
                    _ => {
                        return Err(RuleParseError::InvalidArgument {
                            rule: name.to_string(),
                            expected: "two numeric bounds",
                        });
                    }
                }
            }
            "in" => Rule::In(list_arg(name, arg)?),
            "not_in" => Rule::NotIn(list_arg(name, arg)?),
            "regex" => {
                let pattern = arg.ok_or_else(|| RuleParseError::InvalidArgument {
                    rule: name.to_string(),
                    expected: "a pattern",
                })?;
                // delimiters as in `regex:/^[a-z]+$/`
                let pattern = pattern
                    .strip_prefix('/')
                    .and_then(|p| p.strip_suffix('/'))
                    .unwrap_or(pattern);
                Rule::Regex(Regex::new(pattern).map_err(|_| RuleParseError::InvalidArgument {
                    rule: name.to_string(),
                    expected: "a valid regular expression",
                })?)
            }
            "date_format" => Rule::DateFormat(
                arg.filter(|a| !a.is_empty())
                    .ok_or_else(|| RuleParseError::InvalidArgument {
                        rule: name.to_string(),
                        expected: "a date format",
                    })?
                    .to_string(),
            ),
            other => return Err(RuleParseError::UnknownRule(other.to_string())),
        })
    }

    /// Parse a pipe separated list of constraints
    ///
    /// `regex` must come last, its pattern may contain pipes.
    pub fn parse_list(expr: &str) -> Result<Vec<Rule>, RuleParseError> {
        let mut rules = Vec::new();
        let mut rest = expr.trim();

        while !rest.is_empty() {
            if rest.starts_with("regex:") {
                rules.push(Rule::parse(rest)?);
                break;
            }
            let (head, tail) = rest.split_once('|').unwrap_or((rest, ""));
            if !head.trim().is_empty() {
                rules.push(Rule::parse(head)?);
            }
            rest = tail.trim();
        }

        Ok(rules)
    }
}

/// Field name → constraints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet(IndexMap<String, Vec<Rule>>);

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the rules of a field from a constraint expression
    pub fn rule(mut self, field: impl Into<String>, expr: &str) -> Result<Self, RuleParseError> {
        self.0.insert(field.into(), Rule::parse_list(expr)?);
        Ok(self)
    }

    pub fn insert(&mut self, field: impl Into<String>, rules: Vec<Rule>) {
        self.0.insert(field.into(), rules);
    }

    pub fn get(&self, field: &str) -> Option<&[Rule]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Rule>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `self` overridden field by field by `other`
    pub fn merged_with(&self, other: &RuleSet) -> RuleSet {
        let mut merged = self.0.clone();
        for (field, rules) in &other.0 {
            merged.insert(field.clone(), rules.clone());
        }
        RuleSet(merged)
    }

    pub fn parse_map<'a>(
        entries: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Result<Self, RuleParseError> {
        let mut set = RuleSet::new();
        for (field, expr) in entries {
            set.insert(field.clone(), Rule::parse_list(expr)?);
        }
        Ok(set)
    }
}

/// Mutating action a rule set is selected for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Store,
    Update,
}

/// Base rules plus per-action overrides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationRules {
    pub base: RuleSet,
    pub store: Option<RuleSet>,
    pub update: Option<RuleSet>,
}

impl ValidationRules {
    /// The same rules for both actions
    pub fn shared(base: RuleSet) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    pub fn on_store(mut self, rules: RuleSet) -> Self {
        self.store = Some(rules);
        self
    }

    pub fn on_update(mut self, rules: RuleSet) -> Self {
        self.update = Some(rules);
        self
    }

    /// Rule set effective for `action`
    pub fn for_action(&self, action: RuleAction) -> RuleSet {
        let overrides = match action {
            RuleAction::Store => self.store.as_ref(),
            RuleAction::Update => self.update.as_ref(),
        };
        match overrides {
            Some(rules) => self.base.merged_with(rules),
            None => self.base.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleEntry {
    Rules(String),
    Nested(IndexMap<String, String>),
}

impl<'de> Deserialize<'de> for ValidationRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = IndexMap::<String, RuleEntry>::deserialize(deserializer)?;
        let mut rules = ValidationRules::default();

        for (key, entry) in entries {
            match (key.as_str(), entry) {
                ("store", RuleEntry::Nested(map)) => {
                    rules.store =
                        Some(RuleSet::parse_map(map.iter()).map_err(serde::de::Error::custom)?);
                }
                ("update", RuleEntry::Nested(map)) => {
                    rules.update =
                        Some(RuleSet::parse_map(map.iter()).map_err(serde::de::Error::custom)?);
                }
                (_, RuleEntry::Rules(expr)) => {
                    let parsed = Rule::parse_list(&expr).map_err(serde::de::Error::custom)?;
                    rules.base.insert(key.clone(), parsed);
                }
                (other, RuleEntry::Nested(_)) => {
                    return Err(serde::de::Error::custom(format!(
                        "nested rules are only allowed under 'store' and 'update', found '{}'",
                        other
                    )));
                }
            }
        }

        Ok(rules)
    }
}
