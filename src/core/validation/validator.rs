//! The validator seam and its rule-based implementation

use super::rules::{Rule, RuleSet};
use super::validators;
use crate::core::entity::Fields;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Field name → messages, in rule declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(IndexMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self
            .0
            .values()
            .flat_map(|msgs| msgs.iter().map(String::as_str))
            .collect();
        write!(f, "{}", messages.join(" "))
    }
}

/// Checks a submitted payload against a rule set
///
/// On success returns the validated fields: only fields that carry rules and
/// are present in the payload.
pub trait Validator: Send + Sync {
    fn validate(&self, payload: &Value, rules: &RuleSet) -> Result<Fields, FieldErrors>;
}

/// Validator evaluating [`Rule`]s
///
/// Evaluation per field:
/// 1. absent + `sometimes` → skipped;
/// 2. `required` failing → only the required message is reported;
/// 3. absent → skipped;
/// 4. `null` + `nullable` → accepted as `null`;
/// 5. every remaining rule runs, each failure adds a message.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleValidator;

impl RuleValidator {
    fn validate_field(
        field: &str,
        value: Option<&Value>,
        rules: &[Rule],
        errors: &mut FieldErrors,
    ) -> bool {
        let has = |wanted: fn(&Rule) -> bool| rules.iter().any(wanted);

        if value.is_none() && has(|r| matches!(r, Rule::Sometimes)) {
            return false;
        }

        if has(|r| matches!(r, Rule::Required)) {
            if let Err(message) = validators::required(field, value) {
                errors.add(field, message);
                return false;
            }
        }

        let Some(value) = value else {
            return false;
        };

        if value.is_null() && has(|r| matches!(r, Rule::Nullable)) {
            return true;
        }

        let numeric_hint = has(|r| matches!(r, Rule::Integer | Rule::Numeric));
        let mut valid = true;
        for rule in rules {
            if let Err(message) = validators::check(rule, field, value, numeric_hint) {
                errors.add(field, message);
                valid = false;
            }
        }
        valid
    }
}

impl Validator for RuleValidator {
    fn validate(&self, payload: &Value, rules: &RuleSet) -> Result<Fields, FieldErrors> {
        let empty = Fields::new();
        let object = match payload {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                let mut errors = FieldErrors::new();
                errors.add("payload", "The payload must be an object.");
                return Err(errors);
            }
        };

        let mut errors = FieldErrors::new();
        let mut validated = Fields::new();

        for (field, field_rules) in rules.iter() {
            let value = object.get(field);
            let keep = Self::validate_field(field, value, field_rules, &mut errors);
            if keep {
                if let Some(value) = value {
                    validated.insert(field.clone(), value.clone());
                }
            }
        }

        if errors.is_empty() {
            Ok(validated)
        } else {
            Err(errors)
        }
    }
}
