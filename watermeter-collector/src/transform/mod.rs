use serde_json::{Map, Value};
use time::OffsetDateTime;
use watermeter_db::domain::Reading;

use crate::pipeline::PipelineError;

pub const TOTAL_LITER_M3: &str = "total_liter_m3";
pub const ACTIVE_LITER_LPM: &str = "active_liter_lpm";
pub const WIFI_STRENGTH: &str = "wifi_strength";
pub const WIFI_SSID: &str = "wifi_ssid";
pub const TOTAL_LITER_OFFSET_M3: &str = "total_liter_offset_m3";

/// Largest magnitude a NUMERIC(12,3) column holds.
const MAX_VOLUME_M3: f64 = 999_999_999.999;
/// Largest magnitude a NUMERIC(8,3) column holds.
const MAX_FLOW_LPM: f64 = 99_999.999;

/// Build a [`Reading`] from a decoded meter payload.
///
/// Required fields accept JSON numbers or numeric strings; anything else is a
/// validation error. Optional fields never fail the reading: see [`safe_f64`].
pub fn reading_from_payload(
    payload: &Value,
    meter_id: &str,
    time: OffsetDateTime,
) -> Result<Reading, PipelineError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| PipelineError::Validation("meter payload is not a JSON object".to_string()))?;

    let reading = Reading {
        time,
        meter_id: meter_id.to_string(),
        total_liter_m3: required_f64(obj, TOTAL_LITER_M3)?,
        active_liter_lpm: required_f64(obj, ACTIVE_LITER_LPM)?,
        wifi_strength: required_i32(obj, WIFI_STRENGTH)?,
        wifi_ssid: optional_string(obj, WIFI_SSID),
        total_liter_offset_m3: safe_f64(obj, TOTAL_LITER_OFFSET_M3),
    };

    validate_reading(&reading)?;
    Ok(reading)
}

/// Range checks that keep a reading insertable.
///
/// Rules:
/// - flow rate must be non-negative.
/// - volumes must fit NUMERIC(12,3), flow must fit NUMERIC(8,3) once rounded
///   to the column scale.
pub fn validate_reading(r: &Reading) -> Result<(), PipelineError> {
    if r.active_liter_lpm < 0.0 {
        return Err(PipelineError::Validation(format!(
            "{ACTIVE_LITER_LPM} must be non-negative, got {}",
            r.active_liter_lpm
        )));
    }
    if !fits_scale_3(r.active_liter_lpm, MAX_FLOW_LPM) {
        return Err(PipelineError::Validation(format!(
            "{ACTIVE_LITER_LPM} out of range: {}",
            r.active_liter_lpm
        )));
    }
    if !fits_scale_3(r.total_liter_m3, MAX_VOLUME_M3) {
        return Err(PipelineError::Validation(format!(
            "{TOTAL_LITER_M3} out of range: {}",
            r.total_liter_m3
        )));
    }
    if let Some(offset) = r.total_liter_offset_m3 {
        if !fits_scale_3(offset, MAX_VOLUME_M3) {
            return Err(PipelineError::Validation(format!(
                "{TOTAL_LITER_OFFSET_M3} out of range: {offset}"
            )));
        }
    }
    Ok(())
}

/// Postgres rounds to three decimals on insert, so compare the rounded value.
fn fits_scale_3(value: f64, max: f64) -> bool {
    ((value * 1000.0).round() / 1000.0).abs() <= max
}

fn number_from(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn required_f64(obj: &Map<String, Value>, field: &str) -> Result<f64, PipelineError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(PipelineError::Validation(format!("missing required field: {field}"))),
        Some(value) => number_from(value).ok_or_else(|| {
            PipelineError::Validation(format!("field {field} is not numeric: {value}"))
        }),
    }
}

fn required_i32(obj: &Map<String, Value>, field: &str) -> Result<i32, PipelineError> {
    let n = required_f64(obj, field)?;
    if n.fract() != 0.0 || n < f64::from(i32::MIN) || n > f64::from(i32::MAX) {
        return Err(PipelineError::Validation(format!("field {field} is not a 32-bit integer: {n}")));
    }
    Ok(n as i32)
}

fn optional_string(obj: &Map<String, Value>, field: &str) -> Option<String> {
    match obj.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        None | Some(Value::Null) => None,
        Some(other) => {
            tracing::warn!(field, value = %other, "ignoring non-string optional field");
            None
        }
    }
}

/// Lenient conversion for optional numeric fields.
///
/// - absent or `null` -> `None`
/// - empty or blank string -> `None` (meters report unset offsets this way)
/// - malformed value -> `None` plus a warning naming the field and value
///
/// A missing value is never turned into `0.0`.
pub fn safe_f64(obj: &Map<String, Value>, field: &str) -> Option<f64> {
    match obj.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => {
            tracing::debug!(field, "empty optional field treated as absent");
            None
        }
        Some(value) => {
            let parsed = number_from(value);
            if parsed.is_none() {
                tracing::warn!(field, value = %value, "malformed optional field treated as absent");
            }
            parsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    const TS: OffsetDateTime = datetime!(2025-11-15 12:00:00 UTC);

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn converts_numeric_payload() {
        let payload = json!({
            "total_liter_m3": 123.456,
            "active_liter_lpm": 2.5,
            "wifi_strength": -45,
            "wifi_ssid": "TestNetwork",
            "total_liter_offset_m3": 1.0
        });

        let r = reading_from_payload(&payload, "test_meter", TS).unwrap();
        assert_eq!(r.time, TS);
        assert_eq!(r.meter_id, "test_meter");
        assert_eq!(r.total_liter_m3, 123.456);
        assert_eq!(r.active_liter_lpm, 2.5);
        assert_eq!(r.wifi_strength, -45);
        assert_eq!(r.wifi_ssid.as_deref(), Some("TestNetwork"));
        assert_eq!(r.total_liter_offset_m3, Some(1.0));
    }

    #[test]
    fn converts_numeric_strings() {
        let payload = json!({
            "total_liter_m3": "12.345",
            "active_liter_lpm": " 1.2 ",
            "wifi_strength": "-50"
        });

        let r = reading_from_payload(&payload, "m", TS).unwrap();
        assert_eq!(r.total_liter_m3, 12.345);
        assert_eq!(r.active_liter_lpm, 1.2);
        assert_eq!(r.wifi_strength, -50);
    }

    #[test]
    fn optional_fields_default_to_none() {
        let payload = json!({"total_liter_m3": 12.345, "active_liter_lpm": 1.2, "wifi_strength": -50});

        let r = reading_from_payload(&payload, "m", TS).unwrap();
        assert_eq!(r.wifi_ssid, None);
        assert_eq!(r.total_liter_offset_m3, None);
    }

    #[test]
    fn missing_flow_rate_is_a_validation_error() {
        let payload = json!({"total_liter_m3": 123.456, "wifi_strength": -45});

        let err = reading_from_payload(&payload, "m", TS).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ref msg) if msg.contains(ACTIVE_LITER_LPM)));
    }

    #[test]
    fn null_or_non_numeric_required_fields_are_rejected() {
        for bad in [json!(null), json!(""), json!("abc"), json!(true), json!([1])] {
            let payload = json!({"total_liter_m3": bad, "active_liter_lpm": 1.0, "wifi_strength": -50});
            assert!(matches!(
                reading_from_payload(&payload, "m", TS),
                Err(PipelineError::Validation(_))
            ));
        }
    }

    #[test]
    fn fractional_wifi_strength_is_rejected() {
        let payload = json!({"total_liter_m3": 1.0, "active_liter_lpm": 1.0, "wifi_strength": -45.5});
        assert!(matches!(reading_from_payload(&payload, "m", TS), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(
            reading_from_payload(&json!([1, 2, 3]), "m", TS),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn negative_or_oversized_flow_is_rejected() {
        for flow in [-0.1, 100_000.0] {
            let payload = json!({"total_liter_m3": 1.0, "active_liter_lpm": flow, "wifi_strength": 1});
            assert!(matches!(reading_from_payload(&payload, "m", TS), Err(PipelineError::Validation(_))));
        }
    }

    #[test]
    fn values_that_round_past_column_precision_are_rejected() {
        let reading = |total: f64, flow: f64, offset: Option<f64>| Reading {
            time: TS,
            meter_id: "m".to_string(),
            total_liter_m3: total,
            active_liter_lpm: flow,
            wifi_strength: 1,
            wifi_ssid: None,
            total_liter_offset_m3: offset,
        };

        assert!(validate_reading(&reading(999_999_999.999, 99_999.999, Some(-999_999_999.999))).is_ok());
        assert!(validate_reading(&reading(1.0, 99_999.9996, None)).is_err());
        assert!(validate_reading(&reading(999_999_999.9996, 1.0, None)).is_err());
        assert!(validate_reading(&reading(-999_999_999.9996, 1.0, None)).is_err());
        assert!(validate_reading(&reading(1.0, 1.0, Some(999_999_999.9996))).is_err());

        let payload = json!({"total_liter_m3": 1.0, "active_liter_lpm": 99_999.9996, "wifi_strength": 1});
        assert!(matches!(reading_from_payload(&payload, "m", TS), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn safe_f64_handles_valid_numbers_and_strings() {
        let o = obj(json!({"a": 123.456, "b": "123.456"}));
        assert_eq!(safe_f64(&o, "a"), Some(123.456));
        assert_eq!(safe_f64(&o, "b"), Some(123.456));
    }

    #[test]
    fn safe_f64_treats_empty_offset_as_absent() {
        let o = obj(json!({"total_liter_offset_m3": "", "blank": "   ", "null": null}));
        assert_eq!(safe_f64(&o, "total_liter_offset_m3"), None);
        assert_eq!(safe_f64(&o, "blank"), None);
        assert_eq!(safe_f64(&o, "null"), None);
        assert_eq!(safe_f64(&o, "missing"), None);
    }

    #[test]
    fn safe_f64_treats_malformed_values_as_absent() {
        let o = obj(json!({"a": "invalid", "b": false, "c": {"x": 1}}));
        assert_eq!(safe_f64(&o, "a"), None);
        assert_eq!(safe_f64(&o, "b"), None);
        assert_eq!(safe_f64(&o, "c"), None);
    }

    #[test]
    fn malformed_offset_does_not_fail_the_reading() {
        let payload = json!({
            "total_liter_m3": 1.0,
            "active_liter_lpm": 0.0,
            "wifi_strength": 80,
            "total_liter_offset_m3": "n/a",
            "wifi_ssid": ""
        });

        let r = reading_from_payload(&payload, "m", TS).unwrap();
        assert_eq!(r.total_liter_offset_m3, None);
        assert_eq!(r.wifi_ssid.as_deref(), Some(""));
    }
}
