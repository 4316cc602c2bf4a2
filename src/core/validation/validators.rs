//! Reusable field checks
//!
//! One function per constraint. Each returns the client facing message on
//! failure. Type checks are lenient with their input the way form input is:
//! `"5"` is an integer, `"1"` is a boolean.

use super::rules::Rule;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("valid email pattern"));

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Whether a value counts as "present" for `required`
pub fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

pub fn required(field: &str, value: Option<&Value>) -> Result<(), String> {
    match value {
        Some(v) if is_filled(v) => Ok(()),
        _ => Err(format!("The {} field is required.", label(field))),
    }
}

pub fn string(field: &str, value: &Value) -> Result<(), String> {
    if value.is_string() {
        Ok(())
    } else {
        Err(format!("The {} field must be a string.", label(field)))
    }
}

pub fn integer(field: &str, value: &Value) -> Result<(), String> {
    let ok = match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("The {} field must be an integer.", label(field)))
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn numeric(field: &str, value: &Value) -> Result<(), String> {
    match as_number(value) {
        Some(_) => Ok(()),
        None => Err(format!("The {} field must be a number.", label(field))),
    }
}

pub fn boolean(field: &str, value: &Value) -> Result<(), String> {
    let ok = match value {
        Value::Bool(_) => true,
        Value::Number(n) => matches!(n.as_i64(), Some(0) | Some(1)),
        Value::String(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("The {} field must be true or false.", label(field)))
    }
}

pub fn array(field: &str, value: &Value) -> Result<(), String> {
    if value.is_array() || value.is_object() {
        Ok(())
    } else {
        Err(format!("The {} field must be an array.", label(field)))
    }
}

pub fn email(field: &str, value: &Value) -> Result<(), String> {
    match value.as_str() {
        Some(s) if EMAIL.is_match(s) => Ok(()),
        _ => Err(format!(
            "The {} field must be a valid email address.",
            label(field)
        )),
    }
}

/// How a value is measured by `min`, `max` and `between`
enum Size {
    Characters(f64),
    Value(f64),
    Items(f64),
}

fn size(value: &Value, numeric_hint: bool) -> Option<Size> {
    match value {
        Value::Number(n) => n.as_f64().map(Size::Value),
        Value::String(s) if numeric_hint => s.trim().parse::<f64>().ok().map(Size::Value),
        Value::String(s) => Some(Size::Characters(s.chars().count() as f64)),
        Value::Array(a) => Some(Size::Items(a.len() as f64)),
        Value::Object(o) => Some(Size::Items(o.len() as f64)),
        _ => None,
    }
}

pub fn min(field: &str, value: &Value, bound: f64, numeric_hint: bool) -> Result<(), String> {
    let field = label(field);
    let bound_s = fmt_number(bound);
    match size(value, numeric_hint) {
        Some(Size::Characters(n)) if n < bound => Err(format!(
            "The {} field must be at least {} characters.",
            field, bound_s
        )),
        Some(Size::Value(n)) if n < bound => {
            Err(format!("The {} field must be at least {}.", field, bound_s))
        }
        Some(Size::Items(n)) if n < bound => Err(format!(
            "The {} field must have at least {} items.",
            field, bound_s
        )),
        _ => Ok(()),
    }
}

pub fn max(field: &str, value: &Value, bound: f64, numeric_hint: bool) -> Result<(), String> {
    let field = label(field);
    let bound_s = fmt_number(bound);
    match size(value, numeric_hint) {
        Some(Size::Characters(n)) if n > bound => Err(format!(
            "The {} field must not be greater than {} characters.",
            field, bound_s
        )),
        Some(Size::Value(n)) if n > bound => Err(format!(
            "The {} field must not be greater than {}.",
            field, bound_s
        )),
        Some(Size::Items(n)) if n > bound => Err(format!(
            "The {} field must not have more than {} items.",
            field, bound_s
        )),
        _ => Ok(()),
    }
}

pub fn between(
    field: &str,
    value: &Value,
    low: f64,
    high: f64,
    numeric_hint: bool,
) -> Result<(), String> {
    let outside = match size(value, numeric_hint) {
        Some(Size::Characters(n)) | Some(Size::Value(n)) | Some(Size::Items(n)) => {
            n < low || n > high
        }
        None => false,
    };
    if outside {
        Err(format!(
            "The {} field must be between {} and {}.",
            label(field),
            fmt_number(low),
            fmt_number(high)
        ))
    } else {
        Ok(())
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

pub fn in_list(field: &str, value: &Value, allowed: &[String]) -> Result<(), String> {
    match textual(value) {
        Some(s) if allowed.contains(&s) => Ok(()),
        _ => Err(format!("The selected {} is invalid.", label(field))),
    }
}

pub fn not_in_list(field: &str, value: &Value, denied: &[String]) -> Result<(), String> {
    match textual(value) {
        Some(s) if denied.contains(&s) => Err(format!("The selected {} is invalid.", label(field))),
        _ => Ok(()),
    }
}

pub fn regex(field: &str, value: &Value, pattern: &Regex) -> Result<(), String> {
    match textual(value) {
        Some(s) if pattern.is_match(&s) => Ok(()),
        _ => Err(format!("The {} field format is invalid.", label(field))),
    }
}

pub fn date_format(field: &str, value: &Value, format: &str) -> Result<(), String> {
    let ok = value.as_str().is_some_and(|s| {
        chrono::NaiveDateTime::parse_from_str(s, format).is_ok()
            || chrono::NaiveDate::parse_from_str(s, format).is_ok()
    });
    if ok {
        Ok(())
    } else {
        Err(format!(
            "The {} field must match the format {}.",
            label(field),
            format
        ))
    }
}

/// Run one value-level rule
///
/// `required`, `sometimes` and `nullable` steer the evaluation and are handled
/// by the validator, they always pass here.
pub fn check(rule: &Rule, field: &str, value: &Value, numeric_hint: bool) -> Result<(), String> {
    match rule {
        Rule::Required | Rule::Sometimes | Rule::Nullable => Ok(()),
        Rule::String => string(field, value),
        Rule::Integer => integer(field, value),
        Rule::Numeric => numeric(field, value),
        Rule::Boolean => boolean(field, value),
        Rule::Array => array(field, value),
        Rule::Email => email(field, value),
        Rule::Min(bound) => min(field, value, *bound, numeric_hint),
        Rule::Max(bound) => max(field, value, *bound, numeric_hint),
        Rule::Between(low, high) => between(field, value, *low, *high, numeric_hint),
        Rule::In(allowed) => in_list(field, value, allowed),
        Rule::NotIn(denied) => not_in_list(field, value, denied),
        Rule::Regex(pattern) => regex(field, value, pattern),
        Rule::DateFormat(format) => date_format(field, value, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required() {
        assert!(required("title", Some(&json!("A"))).is_ok());
        assert!(required("title", Some(&json!(0))).is_ok());
        assert!(required("title", Some(&json!(false))).is_ok());
        assert!(required("title", None).is_err());
        assert!(required("title", Some(&json!(null))).is_err());
        assert!(required("title", Some(&json!("   "))).is_err());
        assert!(required("tags", Some(&json!([]))).is_err());
        assert_eq!(
            required("due_date", None).unwrap_err(),
            "The due date field is required."
        );
    }

    #[test]
    fn test_type_checks() {
        assert!(string("t", &json!("x")).is_ok());
        assert!(string("t", &json!(1)).is_err());

        assert!(integer("n", &json!(5)).is_ok());
        assert!(integer("n", &json!("5")).is_ok());
        assert!(integer("n", &json!(5.5)).is_err());

        assert!(numeric("n", &json!(5.5)).is_ok());
        assert!(numeric("n", &json!("-2.5")).is_ok());
        assert!(numeric("n", &json!("abc")).is_err());

        assert!(boolean("b", &json!(true)).is_ok());
        assert!(boolean("b", &json!(1)).is_ok());
        assert!(boolean("b", &json!("0")).is_ok());
        assert!(boolean("b", &json!("yes")).is_err());

        assert!(array("a", &json!([1])).is_ok());
        assert!(array("a", &json!({"k": 1})).is_ok());
        assert!(array("a", &json!("x")).is_err());
    }

    #[test]
    fn test_email() {
        assert!(email("email", &json!("alice@example.com")).is_ok());
        assert!(email("email", &json!("alice@example")).is_err());
        assert!(email("email", &json!("not an email")).is_err());
    }

    #[test]
    fn test_size_rules_depend_on_type() {
        assert!(min("title", &json!("ab"), 3.0, false).is_err());
        assert!(min("title", &json!("abc"), 3.0, false).is_ok());
        assert!(max("count", &json!(11), 10.0, false).is_err());
        assert!(max("tags", &json!([1, 2]), 2.0, false).is_ok());

        // "100" is three characters, or the number 100 under a numeric rule
        assert!(max("amount", &json!("100"), 10.0, false).is_ok());
        assert!(max("amount", &json!("100"), 10.0, true).is_err());

        assert_eq!(
            max("title", &json!("abcdef"), 5.0, false).unwrap_err(),
            "The title field must not be greater than 5 characters."
        );
        assert!(between("age", &json!(30), 18.0, 65.0, false).is_ok());
        assert!(between("age", &json!(70), 18.0, 65.0, false).is_err());
    }

    #[test]
    fn test_lists_and_patterns() {
        let allowed = vec!["draft".to_string(), "published".to_string()];
        assert!(in_list("status", &json!("draft"), &allowed).is_ok());
        assert!(in_list("status", &json!("archived"), &allowed).is_err());
        assert!(not_in_list("status", &json!("draft"), &allowed).is_err());

        let re = Regex::new("^[A-Z]{3}$").unwrap();
        assert!(regex("code", &json!("ABC"), &re).is_ok());
        assert!(regex("code", &json!("abc"), &re).is_err());
    }

    #[test]
    fn test_date_format() {
        assert!(date_format("due", &json!("2024-03-01"), "%Y-%m-%d").is_ok());
        assert!(date_format("due", &json!("01/03/2024"), "%Y-%m-%d").is_err());
        assert!(date_format("at", &json!("2024-03-01 10:00"), "%Y-%m-%d %H:%M").is_ok());
    }
}
