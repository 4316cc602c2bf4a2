//! Validation of submitted payloads
//!
//! Rules are declared per field as constraint expressions
//! (`required|string|max:255`), grouped in a base [`RuleSet`] with optional
//! `store` / `update` overrides ([`ValidationRules`]). The [`Validator`] trait
//! is the seam the resource handler calls; [`RuleValidator`] evaluates the
//! declared rules.

pub mod rules;
pub mod validator;
pub mod validators;

pub use rules::{Rule, RuleAction, RuleParseError, RuleSet, ValidationRules};
pub use validator::{FieldErrors, RuleValidator, Validator};
