// ABOUTME: Health-export parser — Apple-Health-style XML via a quick-xml pull reader,
// ABOUTME: plus a compact on-device JSON envelope for smaller incremental uploads
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Health data ingestion.
//!
//! Two input shapes, both producing [`HealthMetricRaw`] rows:
//!
//! - A phone-export XML dump (`<Record type="..." .../>` elements, the
//!   shape Apple Health produces): read with `quick-xml`'s pull reader so
//!   a multi-hundred-megabyte export is never materialized as a DOM.
//! - A compact `JSON` array, for a lightweight on-device sync client that
//!   already speaks this system's own field names.
//!
//! Readings whose numeric value is `NaN`/±infinity are dropped rather
//! than coerced to zero — `health_metric_raw.value` has no sane zero
//! default, unlike the nutrition scalars.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::HealthMetricRaw;
use crate::storage::normalize::{clean_f64, to_utc, Normalize};

impl Normalize for HealthMetricRaw {
    fn normalized(self) -> Self {
        Self {
            recorded_at: to_utc(self.recorded_at),
            ..self
        }
    }
}

/// Strip Apple's `HK(Quantity|Category)TypeIdentifier` prefix and convert
/// the remaining `CamelCase` identifier to `snake_case`, e.g.
/// `HKQuantityTypeIdentifierStepCount` → `step_count`.
fn metric_type_from_identifier(identifier: &str) -> String {
    let stripped = identifier
        .strip_prefix("HKQuantityTypeIdentifier")
        .or_else(|| identifier.strip_prefix("HKCategoryTypeIdentifier"))
        .unwrap_or(identifier);

    let mut out = String::with_capacity(stripped.len() + 4);
    for (i, ch) in stripped.chars().enumerate() {
        if ch.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn parse_apple_date(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z")
        .map(|dt| to_utc(dt))
        .map_err(|e| AppError::parse(format!("unrecognized Apple Health timestamp '{raw}': {e}")))
}

struct RawRecordAttrs {
    metric_type: Option<String>,
    source: Option<String>,
    value: Option<String>,
    unit: Option<String>,
    start_date: Option<String>,
}

fn attrs_to_metric(attrs: RawRecordAttrs, user_id: Uuid) -> AppResult<Option<HealthMetricRaw>> {
    let metric_type = attrs
        .metric_type
        .ok_or_else(|| AppError::parse("Record element missing 'type' attribute"))?;
    let start_date = attrs
        .start_date
        .ok_or_else(|| AppError::parse("Record element missing 'startDate' attribute"))?;
    let raw_value = attrs
        .value
        .ok_or_else(|| AppError::parse("Record element missing 'value' attribute"))?;

    let Some(value) = clean_f64(raw_value.trim().parse::<f64>().unwrap_or(f64::NAN)) else {
        return Ok(None);
    };

    let metadata = serde_json::json!({ "raw_type": metric_type });

    Ok(Some(
        HealthMetricRaw {
            user_id,
            recorded_at: parse_apple_date(&start_date)?,
            metric_type: metric_type_from_identifier(&metric_type),
            source: attrs.source.unwrap_or_else(|| "unknown".to_string()),
            value,
            unit: attrs.unit.unwrap_or_default(),
            metadata: sqlx::types::Json(metadata),
        }
        .normalized(),
    ))
}

/// Parse an Apple-Health-style XML export into [`HealthMetricRaw`] rows.
///
/// Only top-level `<Record>` elements are read; everything else
/// (`<Workout>`, `<Correlation>`, `<Me>`…) is skipped without allocation
/// beyond the event buffer `quick-xml` itself reuses per call.
///
/// # Errors
///
/// Returns `ParseError` for malformed XML or a `Record` missing a
/// required attribute.
pub fn parse_apple_health_xml(
    user_id: Uuid,
    bytes: &[u8],
) -> impl Iterator<Item = AppResult<HealthMetricRaw>> + '_ {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    std::iter::from_fn(move || loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => return None,
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"Record" => {
                let mut attrs = RawRecordAttrs {
                    metric_type: None,
                    source: None,
                    value: None,
                    unit: None,
                    start_date: None,
                };
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"type" => attrs.metric_type = Some(value),
                        b"sourceName" => attrs.source = Some(value),
                        b"value" => attrs.value = Some(value),
                        b"unit" => attrs.unit = Some(value),
                        b"startDate" => attrs.start_date = Some(value),
                        _ => {}
                    }
                }
                match attrs_to_metric(attrs, user_id) {
                    Ok(Some(metric)) => return Some(Ok(metric)),
                    Ok(None) => continue,
                    Err(e) => return Some(Err(e)),
                }
            }
            Ok(_) => continue,
            Err(e) => return Some(Err(AppError::parse(format!("xml parse error: {e}")))),
        }
    })
}

/// One reading in the compact on-device `JSON` envelope.
#[derive(Debug, Deserialize)]
struct HealthJsonRecord {
    metric_type: String,
    source: String,
    value: f64,
    unit: String,
    recorded_at: DateTime<Utc>,
}

/// One reading in the sync-client daily envelope: `{type, value, unit,
/// date}`. Unlike [`HealthJsonRecord`], this shape carries no source and
/// aggregates straight onto [`HealthMetricDaily`] instead of
/// `HealthMetricRaw` — it is the client's own daily rollup, not a raw
/// time-series point.
#[derive(Debug, Deserialize)]
struct DailyMetricReading {
    #[serde(rename = "type")]
    metric_type: String,
    value: f64,
    #[serde(default)]
    #[allow(dead_code)]
    unit: String,
    date: chrono::NaiveDate,
}

/// The compact sync-client envelope: `{metrics: [...], user_id, sync_date}`.
/// `user_id`/`sync_date` are accepted but not trusted — the caller's own
/// authenticated user id is used for every derived row instead.
#[derive(Debug, Deserialize)]
struct DailyMetricEnvelope {
    metrics: Vec<DailyMetricReading>,
}

/// Parse the compact `{metrics: [{type, value, unit, date}], user_id,
/// sync_date}` envelope into [`crate::models::HealthMetricDaily`] rows,
/// one per distinct date, with `type` mapped onto the matching daily
/// column (`steps`, `weight`, `sleep`, `active_calories`,
/// `resting_heart_rate`). An unrecognized `type` is carried into
/// `other_metrics` rather than dropped.
///
/// # Errors
///
/// Returns `ParseError` if the body is not valid `JSON` in this shape.
pub fn parse_health_daily_envelope(
    user_id: Uuid,
    bytes: &[u8],
) -> AppResult<Vec<crate::models::HealthMetricDaily>> {
    let envelope: DailyMetricEnvelope =
        serde_json::from_slice(bytes).map_err(|e| AppError::parse(format!("invalid health daily envelope: {e}")))?;

    let mut by_date: std::collections::BTreeMap<chrono::NaiveDate, crate::models::HealthMetricDaily> =
        std::collections::BTreeMap::new();

    for reading in envelope.metrics {
        let Some(value) = clean_f64(reading.value) else { continue };
        let row = by_date
            .entry(reading.date)
            .or_insert_with(|| crate::models::HealthMetricDaily::empty(user_id, reading.date));

        match reading.metric_type.as_str() {
            "steps" => row.steps = Some(value as i64),
            "weight" => row.weight_kg = Some(value),
            "sleep" => row.sleep_hours = Some(value),
            "active_calories" => row.active_calories = Some(value),
            "resting_heart_rate" => row.resting_heart_rate = Some(value),
            other => {
                if let Some(obj) = row.other_metrics.0.as_object_mut() {
                    obj.insert(other.to_string(), serde_json::json!(value));
                }
            }
        }
        row.updated_at = Utc::now();
    }

    Ok(by_date.into_values().collect())
}

/// Parse the compact `JSON` envelope (`{"readings": [...]}`
/// or a bare array) into [`HealthMetricRaw`] rows. Bounded size — the
/// whole body is deserialized at once, unlike the XML path.
///
/// # Errors
///
/// Returns `ParseError` if the body is not valid `JSON` in either shape.
pub fn parse_health_json_envelope(user_id: Uuid, bytes: &[u8]) -> AppResult<Vec<HealthMetricRaw>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Envelope {
        Wrapped { readings: Vec<HealthJsonRecord> },
        Bare(Vec<HealthJsonRecord>),
    }

    let envelope: Envelope =
        serde_json::from_slice(bytes).map_err(|e| AppError::parse(format!("invalid health JSON envelope: {e}")))?;
    let records = match envelope {
        Envelope::Wrapped { readings } => readings,
        Envelope::Bare(readings) => readings,
    };

    Ok(records
        .into_iter()
        .filter_map(|r| {
            clean_f64(r.value).map(|value| {
                HealthMetricRaw {
                    user_id,
                    recorded_at: r.recorded_at,
                    metric_type: r.metric_type,
                    source: r.source,
                    value,
                    unit: r.unit,
                    metadata: sqlx::types::Json(serde_json::json!({})),
                }
                .normalized()
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_type_conversion_strips_prefix_and_snake_cases() {
        assert_eq!(
            metric_type_from_identifier("HKQuantityTypeIdentifierStepCount"),
            "step_count"
        );
        assert_eq!(
            metric_type_from_identifier("HKQuantityTypeIdentifierActiveEnergyBurned"),
            "active_energy_burned"
        );
    }

    #[test]
    fn xml_record_parses_into_metric() {
        let xml = br#"<HealthData>
            <Record type="HKQuantityTypeIdentifierStepCount" sourceName="iPhone"
                    unit="count" startDate="2026-01-01 08:00:00 -0700" value="543"/>
        </HealthData>"#;
        let rows: Vec<_> = parse_apple_health_xml(Uuid::new_v4(), xml)
            .collect::<Result<_, _>>()
            .expect("xml should parse");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metric_type, "step_count");
        assert_eq!(rows[0].value, 543.0);
    }

    #[test]
    fn xml_record_with_nan_value_is_dropped() {
        let xml = br#"<Record type="HKQuantityTypeIdentifierStepCount" sourceName="iPhone"
                    unit="count" startDate="2026-01-01 08:00:00 -0700" value="not-a-number"/>"#;
        let rows: Vec<_> = parse_apple_health_xml(Uuid::new_v4(), xml)
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn daily_envelope_maps_steps_and_weight_onto_one_row() {
        let user_id = Uuid::new_v4();
        let body = serde_json::json!({
            "metrics": [
                {"type": "steps", "value": 8500, "unit": "count", "date": "2024-01-15"},
                {"type": "weight", "value": 82.5, "unit": "kg", "date": "2024-01-15"}
            ],
            "user_id": "u1",
            "sync_date": "2024-01-15T23:00:00Z"
        });
        let rows = parse_health_daily_envelope(user_id, body.to_string().as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].steps, Some(8500));
        assert_eq!(rows[0].weight_kg, Some(82.5));
    }

    #[test]
    fn json_envelope_accepts_wrapped_and_bare_shapes() {
        let wrapped = serde_json::json!({
            "readings": [{"metric_type": "weight_kg", "source": "scale", "value": 81.2,
                          "unit": "kg", "recorded_at": "2026-01-01T08:00:00Z"}]
        });
        let bare = serde_json::json!([{"metric_type": "weight_kg", "source": "scale", "value": 81.2,
                                        "unit": "kg", "recorded_at": "2026-01-01T08:00:00Z"}]);

        let user_id = Uuid::new_v4();
        let from_wrapped = parse_health_json_envelope(user_id, wrapped.to_string().as_bytes()).unwrap();
        let from_bare = parse_health_json_envelope(user_id, bare.to_string().as_bytes()).unwrap();
        assert_eq!(from_wrapped.len(), 1);
        assert_eq!(from_bare.len(), 1);
    }
}
