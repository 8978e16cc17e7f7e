//! Parsing of user-typed values at the data-entry boundary.
//!
//! The front end may send numbers either as JSON numbers or as the raw text
//! the user typed. Everything that reaches the store (and later the grade
//! calculator) has been through these checks.

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct EntryError {
    pub field: String,
    pub message: String,
}

impl EntryError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn details(&self) -> Value {
        json!({ "field": self.field })
    }
}

/// Reads a number from a JSON number or numeric text. Blank text and `null`
/// count as missing.
pub fn parse_number(field: &str, raw: Option<&Value>) -> Result<f64, EntryError> {
    let v = match raw {
        None | Some(Value::Null) => return Err(EntryError::new(field, "is required")),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| EntryError::new(field, "is not a number"))?,
        Some(Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() {
                return Err(EntryError::new(field, "is required"));
            }
            t.parse::<f64>()
                .map_err(|_| EntryError::new(field, format!("'{t}' is not a number")))?
        }
        Some(_) => return Err(EntryError::new(field, "must be a number")),
    };
    if !v.is_finite() {
        return Err(EntryError::new(field, "must be finite"));
    }
    Ok(v)
}

pub fn parse_text(field: &str, raw: Option<&Value>) -> Result<String, EntryError> {
    match raw {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            Err(EntryError::new(field, "is required"))
        }
        Some(_) => Err(EntryError::new(field, "must be a string")),
    }
}

pub fn parse_weight(field: &str, raw: Option<&Value>) -> Result<f64, EntryError> {
    check_weight(field, parse_number(field, raw)?)
}

pub fn parse_item_max(field: &str, raw: Option<&Value>) -> Result<f64, EntryError> {
    check_item_max(field, parse_number(field, raw)?)
}

pub fn parse_score(field: &str, raw: Option<&Value>) -> Result<f64, EntryError> {
    check_score(field, parse_number(field, raw)?)
}

/// Range checks shared by the parsers and the store, which also accepts
/// already-typed values.
pub fn check_weight(field: &str, w: f64) -> Result<f64, EntryError> {
    if !w.is_finite() || !(0.0..=100.0).contains(&w) {
        return Err(EntryError::new(field, "must be between 0 and 100"));
    }
    Ok(w)
}

pub fn check_item_max(field: &str, item: f64) -> Result<f64, EntryError> {
    if !item.is_finite() || item <= 0.0 {
        return Err(EntryError::new(field, "must be greater than 0"));
    }
    Ok(item)
}

pub fn check_score(field: &str, score: f64) -> Result<f64, EntryError> {
    if !score.is_finite() {
        return Err(EntryError::new(field, "must be finite"));
    }
    if score < 0.0 {
        return Err(EntryError::new(field, "negative scores are not allowed"));
    }
    Ok(score)
}

pub fn check_score_within(score: f64, item_max: f64, allow_extra_credit: bool) -> Result<(), EntryError> {
    if !allow_extra_credit && score > item_max {
        return Err(EntryError::new("score", "must not exceed item"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_accept_json_and_trimmed_text() {
        assert_eq!(parse_number("x", Some(&json!(12.5))), Ok(12.5));
        assert_eq!(parse_number("x", Some(&json!("  40 "))), Ok(40.0));
        assert!(parse_number("x", Some(&json!(""))).is_err());
        assert!(parse_number("x", Some(&json!("abc"))).is_err());
        assert!(parse_number("x", Some(&json!("NaN"))).is_err());
        assert!(parse_number("x", Some(&json!(true))).is_err());
        assert!(parse_number("x", None).is_err());
    }

    #[test]
    fn weight_range() {
        assert_eq!(parse_weight("weight", Some(&json!("0"))), Ok(0.0));
        assert_eq!(parse_weight("weight", Some(&json!(100))), Ok(100.0));
        let e = parse_weight("weight", Some(&json!(100.5))).unwrap_err();
        assert_eq!(e.field, "weight");
        assert!(parse_weight("weight", Some(&json!(-1))).is_err());
    }

    #[test]
    fn item_max_must_be_positive() {
        assert!(parse_item_max("item", Some(&json!(0))).is_err());
        assert!(parse_item_max("item", Some(&json!("-3"))).is_err());
        assert_eq!(parse_item_max("item", Some(&json!("20"))), Ok(20.0));
    }

    #[test]
    fn typed_values_get_the_same_range_checks() {
        assert!(check_weight("w", f64::NAN).is_err());
        assert!(check_weight("w", 150.0).is_err());
        assert_eq!(check_item_max("item", 0.5), Ok(0.5));
        assert!(check_item_max("item", f64::INFINITY).is_err());
        assert!(check_score("score", -1.0).is_err());
    }

    #[test]
    fn error_message_names_the_field() {
        let e = parse_item_max("item", Some(&json!(0))).unwrap_err();
        assert_eq!(e.to_string(), "item: must be greater than 0");
    }

    #[test]
    fn score_rules() {
        assert!(parse_score("score", Some(&json!(-0.5))).is_err());
        assert_eq!(parse_score("score", Some(&json!("0"))), Ok(0.0));
        assert!(check_score_within(12.0, 10.0, true).is_ok());
        assert!(check_score_within(12.0, 10.0, false).is_err());
        assert!(check_score_within(10.0, 10.0, false).is_ok());
    }

    #[test]
    fn text_is_trimmed_and_required() {
        assert_eq!(parse_text("name", Some(&json!("  Quiz 1 "))), Ok("Quiz 1".to_string()));
        assert!(parse_text("name", Some(&json!("   "))).is_err());
        assert!(parse_text("name", Some(&json!(3))).is_err());
    }
}
