//! Turns raw provider items into [`StopSearchRecord`]s.

use police_data_stop_search_models::{Period, StopSearchRecord};
use serde_json::Value;

use crate::SourceError;
use crate::parsing::{bool_field, parse_coordinate, street_id, string_field};

/// Normalizes one provider item fetched for `force` in `period`.
///
/// The nested `location` object is flattened into coordinate and street
/// columns. The outcome comes from a non-empty `outcome_object.name`,
/// falling back to the flat `outcome` field when the name is missing or
/// empty. The item itself is kept as
/// serialized JSON in `raw_data`.
///
/// # Errors
///
/// Returns [`SourceError`] if the item is not an object, its `location`
/// is neither an object nor `null`, or a coordinate is unparseable.
pub fn normalize_record(
    raw: &Value,
    force: &str,
    period: Period,
) -> Result<StopSearchRecord, SourceError> {
    if !raw.is_object() {
        return Err(SourceError::Normalization {
            message: format!("expected a JSON object, got {raw}"),
        });
    }

    let (latitude, longitude, street_id, street_name) = match raw.get("location") {
        None | Some(Value::Null) => (None, None, None, None),
        Some(location @ Value::Object(_)) => {
            let street = location.get("street").filter(|s| s.is_object());
            (
                parse_coordinate(location, "latitude")?,
                parse_coordinate(location, "longitude")?,
                street.and_then(street_id),
                street.and_then(|s| string_field(s, "name")),
            )
        }
        Some(other) => {
            return Err(SourceError::Normalization {
                message: format!("invalid location: {other}"),
            });
        }
    };

    Ok(StopSearchRecord {
        force: force.to_string(),
        source_period: period,
        occurred_at: string_field(raw, "datetime"),
        stop_type: string_field(raw, "type"),
        age_range: string_field(raw, "age_range"),
        gender: string_field(raw, "gender"),
        self_defined_ethnicity: string_field(raw, "self_defined_ethnicity"),
        officer_defined_ethnicity: string_field(raw, "officer_defined_ethnicity"),
        legislation: string_field(raw, "legislation"),
        object_of_search: string_field(raw, "object_of_search"),
        outcome: outcome(raw),
        outcome_linked_to_object_of_search: bool_field(raw, "outcome_linked_to_object_of_search"),
        removal_of_more_than_outer_clothing: bool_field(raw, "removal_of_more_than_outer_clothing"),
        latitude,
        longitude,
        street_id,
        street_name,
        involved_person: bool_field(raw, "involved_person"),
        operation: bool_field(raw, "operation"),
        operation_name: string_field(raw, "operation_name"),
        raw_data: serde_json::to_string(raw)?,
    })
}

fn outcome(raw: &Value) -> Option<String> {
    raw.get("outcome_object")
        .and_then(|object| object.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| string_field(raw, "outcome"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn period() -> Period {
        "2023-05".parse().unwrap()
    }

    fn sample() -> Value {
        json!({
            "age_range": "18-24",
            "outcome": "A no further action disposal",
            "involved_person": true,
            "self_defined_ethnicity": "White - English/Welsh/Scottish/Northern Irish/British",
            "gender": "Male",
            "legislation": "Misuse of Drugs Act 1971 (section 23)",
            "outcome_linked_to_object_of_search": null,
            "datetime": "2023-05-01T09:30:00+00:00",
            "removal_of_more_than_outer_clothing": false,
            "outcome_object": {
                "id": "bu-no-further-action",
                "name": "A no further action disposal"
            },
            "location": {
                "latitude": "51.512837",
                "street": {"id": 968_851, "name": "On or near Oxford Street"},
                "longitude": "-0.141596"
            },
            "operation": false,
            "officer_defined_ethnicity": "White",
            "type": "Person search",
            "operation_name": null,
            "object_of_search": "Controlled drugs"
        })
    }

    #[test]
    fn normalizes_full_record() {
        let record = normalize_record(&sample(), "metropolitan", period()).unwrap();

        assert_eq!(record.force, "metropolitan");
        assert_eq!(record.source_period, period());
        assert_eq!(record.occurred_at.as_deref(), Some("2023-05-01T09:30:00+00:00"));
        assert_eq!(record.stop_type.as_deref(), Some("Person search"));
        assert_eq!(record.object_of_search.as_deref(), Some("Controlled drugs"));
        assert_eq!(record.outcome_linked_to_object_of_search, None);
        assert_eq!(record.removal_of_more_than_outer_clothing, Some(false));
        assert_eq!(record.street_id, Some(968_851));
        assert_eq!(record.street_name.as_deref(), Some("On or near Oxford Street"));
        assert!((record.latitude.unwrap() - 51.512_837).abs() < f64::EPSILON);
        assert!((record.longitude.unwrap() - -0.141_596).abs() < f64::EPSILON);
        assert_eq!(record.operation, Some(false));
        assert_eq!(record.operation_name, None);
    }

    #[test]
    fn keeps_raw_payload_verbatim() {
        let raw = sample();
        let record = normalize_record(&raw, "metropolitan", period()).unwrap();
        let reparsed: Value = serde_json::from_str(&record.raw_data).unwrap();
        assert_eq!(reparsed, raw);
    }

    #[test]
    fn prefers_nested_outcome_name() {
        let raw = json!({"outcome_object": {"id": "x", "name": "X"}});
        let record = normalize_record(&raw, "metropolitan", period()).unwrap();
        assert_eq!(record.outcome.as_deref(), Some("X"));
    }

    #[test]
    fn falls_back_to_flat_outcome() {
        let raw = json!({"outcome": "Y"});
        let record = normalize_record(&raw, "metropolitan", period()).unwrap();
        assert_eq!(record.outcome.as_deref(), Some("Y"));

        let raw = json!({"outcome": "Y", "outcome_object": {}});
        let record = normalize_record(&raw, "metropolitan", period()).unwrap();
        assert_eq!(record.outcome.as_deref(), Some("Y"));
    }

    #[test]
    fn falls_back_when_nested_name_is_missing_or_empty() {
        let raw = json!({"outcome_object": {"id": "x"}, "outcome": "Y"});
        let record = normalize_record(&raw, "metropolitan", period()).unwrap();
        assert_eq!(record.outcome.as_deref(), Some("Y"));

        let raw = json!({"outcome_object": {"id": "x", "name": ""}, "outcome": "Y"});
        let record = normalize_record(&raw, "metropolitan", period()).unwrap();
        assert_eq!(record.outcome.as_deref(), Some("Y"));

        let raw = json!({"outcome_object": {"id": "x", "name": ""}, "outcome": false});
        let record = normalize_record(&raw, "metropolitan", period()).unwrap();
        assert_eq!(record.outcome, None);
    }

    #[test]
    fn false_outcome_is_null() {
        let raw = json!({"outcome": false, "outcome_object": null});
        let record = normalize_record(&raw, "metropolitan", period()).unwrap();
        assert_eq!(record.outcome, None);
    }

    #[test]
    fn missing_location_leaves_coordinates_null() {
        let raw = json!({"location": null, "type": "Vehicle search"});
        let record = normalize_record(&raw, "metropolitan", period()).unwrap();
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, None);
        assert_eq!(record.street_id, None);
        assert_eq!(record.street_name, None);
    }

    #[test]
    fn empty_object_still_carries_force_and_period() {
        let record = normalize_record(&json!({}), "kent", period()).unwrap();
        assert_eq!(record.force, "kent");
        assert_eq!(record.source_period, period());
        assert_eq!(record.occurred_at, None);
        assert_eq!(record.raw_data, "{}");
    }

    #[test]
    fn rejects_unparseable_latitude() {
        let raw = json!({"location": {"latitude": "abc", "longitude": "-0.1"}});
        assert!(normalize_record(&raw, "metropolitan", period()).is_err());
    }

    #[test]
    fn rejects_non_object_location_and_item() {
        let raw = json!({"location": "somewhere"});
        assert!(normalize_record(&raw, "metropolitan", period()).is_err());
        assert!(normalize_record(&json!("nope"), "metropolitan", period()).is_err());
    }
}
