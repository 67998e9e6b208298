//! Alias-chain readers over raw backend records.
//!
//! The backend uses `false` for empty values and `[id, "name"]` pairs for
//! references. Both are treated as absent/unwrapped here so the adapter only
//! ever sees `Option`s.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

use crate::backend::Record;

const BACKEND_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

fn present(value: &JsonValue) -> bool {
    !matches!(value, JsonValue::Null | JsonValue::Bool(false))
}

/// First present value along `aliases`.
pub fn first<'a>(record: &'a Record, aliases: &[String]) -> Option<&'a JsonValue> {
    aliases
        .iter()
        .filter_map(|alias| record.get(alias))
        .find(|v| present(v))
}

pub fn f64_field(record: &Record, aliases: &[String]) -> Option<f64> {
    aliases
        .iter()
        .filter_map(|alias| record.get(alias))
        .find_map(|v| match v {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

/// Text value; references yield their display name.
pub fn string_field(record: &Record, aliases: &[String]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| record.get(alias))
        .find_map(|v| match v {
            JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
            JsonValue::Array(_) => m2o_name(v),
            _ => None,
        })
}

/// Id of a reference, accepting `[id, "name"]` or a bare id.
pub fn m2o_id(record: &Record, aliases: &[String]) -> Option<i64> {
    aliases
        .iter()
        .filter_map(|alias| record.get(alias))
        .find_map(|v| match v {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::Array(items) => items.first().and_then(JsonValue::as_i64),
            _ => None,
        })
}

fn m2o_name(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Array(items) => items.get(1).and_then(JsonValue::as_str).map(str::to_string),
        _ => None,
    }
}

/// Display name of a reference.
pub fn m2o_label(record: &Record, aliases: &[String]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| record.get(alias))
        .find_map(m2o_name)
}

/// Backend timestamp (`YYYY-MM-DD HH:MM:SS`, UTC) or RFC 3339.
pub fn datetime_field(record: &Record, aliases: &[String]) -> Option<DateTime<Utc>> {
    aliases
        .iter()
        .filter_map(|alias| record.get(alias))
        .filter_map(JsonValue::as_str)
        .find_map(parse_datetime)
}

pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, BACKEND_DATETIME)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc)))
}

pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.format(BACKEND_DATETIME).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn aliases(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn false_values_fall_through_the_chain() {
        let record = json!({"reference": false, "picking_id": [3, "WH/IN/00003"], "origin": "PO42"});
        let record = record.as_object().unwrap();
        let chain = aliases(&["reference", "picking_id", "origin"]);
        assert_eq!(string_field(record, &chain).as_deref(), Some("WH/IN/00003"));
        assert_eq!(first(record, &chain), Some(&json!([3, "WH/IN/00003"])));
    }

    #[test]
    fn missing_chain_yields_none() {
        let record = json!({"origin": false});
        let record = record.as_object().unwrap();
        assert_eq!(string_field(record, &aliases(&["reference", "origin"])), None);
        assert_eq!(f64_field(record, &aliases(&["quantity"])), None);
    }

    #[test]
    fn references_read_as_id_and_label() {
        let record = json!({"product_id": [7, "[WID] Widget"], "location_id": 12});
        let record = record.as_object().unwrap();
        assert_eq!(m2o_id(record, &aliases(&["product_id"])), Some(7));
        assert_eq!(m2o_label(record, &aliases(&["product_id"])).as_deref(), Some("[WID] Widget"));
        assert_eq!(m2o_id(record, &aliases(&["location_id"])), Some(12));
    }

    #[test]
    fn quantities_prefer_the_first_numeric_alias() {
        let record = json!({"quantity_done": 0.0, "product_uom_qty": 5.0});
        let record = record.as_object().unwrap();
        assert_eq!(f64_field(record, &aliases(&["quantity_done", "product_uom_qty"])), Some(0.0));
    }

    #[test]
    fn both_datetime_formats_parse() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_datetime("2024-03-01 08:30:00"), Some(expected));
        assert_eq!(parse_datetime("2024-03-01T09:30:00+01:00"), Some(expected));
        assert_eq!(parse_datetime("yesterday"), None);
        assert_eq!(format_datetime(expected), "2024-03-01 08:30:00");
    }
}
