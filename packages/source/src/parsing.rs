//! Field-level parsing helpers for provider JSON.
//!
//! The police API is loosely typed: coordinates arrive as strings, some
//! flags are `null` instead of `false`, and `outcome` is `false` when
//! there was none. These helpers turn a single JSON value into the typed
//! column value without guessing.

use serde_json::Value;

use crate::SourceError;

/// Returns the string at `key`, or `None` if it is missing, `null`, or
/// not a string.
#[must_use]
pub fn string_field(object: &Value, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Returns the boolean at `key`, or `None` if it is missing or not a
/// boolean.
#[must_use]
pub fn bool_field(object: &Value, key: &str) -> Option<bool> {
    object.get(key).and_then(Value::as_bool)
}

/// Parses a coordinate that may be a numeric string or a number.
///
/// Missing, `null`, and empty values yield `Ok(None)`, never zero.
///
/// # Errors
///
/// Returns [`SourceError::Normalization`] if the value is present but is
/// not a number.
pub fn parse_coordinate(object: &Value, key: &str) -> Result<Option<f64>, SourceError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Some(value)),
            Ok(_) => Err(SourceError::Normalization {
                message: format!("invalid {key} {s:?}: not a finite number"),
            }),
            Err(e) => Err(SourceError::Normalization {
                message: format!("invalid {key} {s:?}: {e}"),
            }),
        },
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(SourceError::Normalization {
            message: format!("invalid {key}: {other}"),
        }),
    }
}

/// Parses a street identifier that may be a number or a numeric string.
#[must_use]
pub fn street_id(street: &Value) -> Option<i64> {
    match street.get("id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_string_coordinate() {
        let location = json!({"latitude": "51.507351"});
        let lat = parse_coordinate(&location, "latitude").unwrap().unwrap();
        assert!((lat - 51.507_351).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_numeric_coordinate() {
        let location = json!({"longitude": -0.127_758});
        let lng = parse_coordinate(&location, "longitude").unwrap().unwrap();
        assert!((lng - -0.127_758).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_or_empty_coordinate_is_none() {
        let location = json!({"latitude": "", "longitude": null});
        assert_eq!(parse_coordinate(&location, "latitude").unwrap(), None);
        assert_eq!(parse_coordinate(&location, "longitude").unwrap(), None);
        assert_eq!(parse_coordinate(&json!({}), "latitude").unwrap(), None);
    }

    #[test]
    fn rejects_garbage_coordinate() {
        let location = json!({"latitude": "north-ish", "longitude": true, "x": "NaN"});
        assert!(parse_coordinate(&location, "latitude").is_err());
        assert!(parse_coordinate(&location, "longitude").is_err());
        assert!(parse_coordinate(&location, "x").is_err());
    }

    #[test]
    fn string_field_ignores_non_strings() {
        let record = json!({"outcome": false, "gender": "Male"});
        assert_eq!(string_field(&record, "outcome"), None);
        assert_eq!(string_field(&record, "gender").as_deref(), Some("Male"));
        assert_eq!(string_field(&record, "missing"), None);
    }

    #[test]
    fn bool_field_keeps_null_as_none() {
        let record = json!({"operation": null, "involved_person": true});
        assert_eq!(bool_field(&record, "operation"), None);
        assert_eq!(bool_field(&record, "involved_person"), Some(true));
    }

    #[test]
    fn street_id_accepts_number_or_string() {
        assert_eq!(street_id(&json!({"id": 968_851})), Some(968_851));
        assert_eq!(street_id(&json!({"id": "42"})), Some(42));
        assert_eq!(street_id(&json!({"id": "n/a"})), None);
        assert_eq!(street_id(&json!({})), None);
    }
}
