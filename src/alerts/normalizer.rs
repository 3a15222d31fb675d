//告警 payload -> 表格行
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::payload::{field_text, unwrap_envelope, PayloadShape, Series};
use crate::error::RelayError;

pub const UNKNOWN_METRIC: &str = "Unknown Metric";
pub const UNKNOWN_STATE: &str = "Unknown State";

// 某个版本里用来屏蔽占位值的一组取值
const DEGENERATE_VALUES: [&str; 4] = ["1", "0", "1e+00", "0e+00"];

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Drop series whose value is one of `1`, `0`, `1e+00`, `0e+00`.
    pub drop_degenerate_values: bool,
}

/// One appended sheet row. Column order is
/// `[timestamp, market, alert_name, state, value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub timestamp: String,
    pub market: String,
    pub alert_name: String,
    pub state: String,
    pub value: String,
}

impl OutputRow {
    pub fn cells(&self) -> [&str; 5] {
        [
            self.timestamp.as_str(),
            self.market.as_str(),
            self.alert_name.as_str(),
            self.state.as_str(),
            self.value.as_str(),
        ]
    }
}

pub fn normalize(payload: &Value, options: &NormalizeOptions) -> Result<Vec<OutputRow>, RelayError> {
    normalize_at(payload, options, Utc::now())
}

/// Same as [`normalize`], with the fallback timestamp supplied by the caller.
pub fn normalize_at(
    payload: &Value,
    options: &NormalizeOptions,
    now: DateTime<Utc>,
) -> Result<Vec<OutputRow>, RelayError> {
    let outer = payload.as_object().ok_or_else(|| {
        RelayError::MalformedPayload(format!("expected a JSON object, got {}", kind_of(payload)))
    })?;

    let unwrapped = unwrap_envelope(outer);
    let body: &Map<String, Value> = unwrapped.as_ref().unwrap_or(outer);

    let timestamp = field_text(body.get("startsAt"))
        .or_else(|| field_text(body.get("timestamp")))
        .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Secs, true));
    let alert_name = field_text(body.get("title")).unwrap_or_else(|| UNKNOWN_METRIC.to_string());
    let state = field_text(body.get("state")).unwrap_or_else(|| UNKNOWN_STATE.to_string());

    let mut series = PayloadShape::detect(body).into_series();
    if options.drop_degenerate_values {
        series.retain(|s| !DEGENERATE_VALUES.contains(&s.value.as_str()));
        // 全部被过滤时仍然保证至少一行
        if series.is_empty() {
            series.push(Series::placeholder());
        }
    }

    Ok(series
        .into_iter()
        .map(|s| OutputRow {
            timestamp: timestamp.clone(),
            market: s.market,
            alert_name: alert_name.clone(),
            state: state.clone(),
            value: s.value,
        })
        .collect())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::payload::{NO_DATA, NO_MARKET, UNKNOWN_MARKET};
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 30, 0).unwrap()
    }

    fn cells(row: &OutputRow) -> Vec<&str> {
        row.cells().to_vec()
    }

    #[test]
    fn test_unified_single_alert() {
        let payload = json!({
            "title": "CPU High",
            "state": "FIRING",
            "startsAt": "2024-01-01T00:00:00Z",
            "alerts": [{"labels": {"metric": "cpu"}, "values": {"A": "92"}}]
        });
        let rows = normalize(&payload, &NormalizeOptions::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            cells(&rows[0]),
            vec!["2024-01-01T00:00:00Z", "cpu", "CPU High", "FIRING", "92"]
        );
    }

    #[test]
    fn test_value_string_extraction() {
        let payload = json!({
            "title": "X",
            "state": "RESOLVED",
            "alerts": [{"labels": {"instance": "node1"}, "valueString": "[ metric='x' labels={} value=5.3 ]"}]
        });
        let rows = normalize(&payload, &NormalizeOptions::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].market, "node1");
        assert_eq!(rows[0].value, "5.3");
    }

    #[test]
    fn test_rows_follow_alert_order() {
        let payload = json!({
            "title": "Spread",
            "state": "alerting",
            "alerts": [
                {"labels": {"metric": "btc"}, "values": {"A": 1.5}},
                {"labels": {"metric": "eth"}, "values": {"A": 2.5}},
                {"labels": {"metric": "sol"}, "values": {"A": 3.5}}
            ]
        });
        let rows = normalize_at(&payload, &NormalizeOptions::default(), fixed_now()).unwrap();
        let markets: Vec<&str> = rows.iter().map(|r| r.market.as_str()).collect();
        assert_eq!(markets, vec!["btc", "eth", "sol"]);
        let values: Vec<&str> = rows.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["1.5", "2.5", "3.5"]);
        assert!(rows.iter().all(|r| r.timestamp == "2025-03-10T12:30:00Z"));
    }

    #[test]
    fn test_legacy_eval_matches() {
        let payload = json!({
            "title": "Legacy",
            "state": "alerting",
            "timestamp": "2023-05-01T10:00:00Z",
            "evalMatches": [
                {"value": 42, "metric": "ignored", "tags": {"metric": "mem"}},
                {"value": null, "tags": null}
            ]
        });
        let rows = normalize(&payload, &NormalizeOptions::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            cells(&rows[0]),
            vec!["2023-05-01T10:00:00Z", "mem", "Legacy", "alerting", "42"]
        );
        assert_eq!(rows[1].market, UNKNOWN_MARKET);
        assert_eq!(rows[1].value, NO_DATA);
    }

    #[test]
    fn test_empty_object_defaults() {
        let before = Utc::now();
        let rows = normalize(&json!({}), &NormalizeOptions::default()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.market, NO_MARKET);
        assert_eq!(row.alert_name, UNKNOWN_METRIC);
        assert_eq!(row.state, UNKNOWN_STATE);
        assert_eq!(row.value, NO_DATA);

        let ts = DateTime::parse_from_rfc3339(&row.timestamp).unwrap();
        let drift = ts.with_timezone(&Utc) - before;
        assert!(drift.num_seconds().abs() <= 5, "timestamp {} too far from now", row.timestamp);
    }

    #[test]
    fn test_starts_at_before_timestamp() {
        let payload = json!({"startsAt": "A", "timestamp": "B"});
        let rows = normalize(&payload, &NormalizeOptions::default()).unwrap();
        assert_eq!(rows[0].timestamp, "A");

        let payload = json!({"startsAt": null, "timestamp": "B"});
        let rows = normalize(&payload, &NormalizeOptions::default()).unwrap();
        assert_eq!(rows[0].timestamp, "B");
    }

    #[test]
    fn test_message_envelope_matches_direct() {
        let inner = json!({
            "title": "Wrapped",
            "state": "FIRING",
            "alerts": [{"labels": {"job": "api"}, "values": {"A": 7}}]
        });
        let wrapped = json!({"title": "outer", "message": inner.to_string()});
        let options = NormalizeOptions::default();
        assert_eq!(
            normalize_at(&wrapped, &options, fixed_now()).unwrap(),
            normalize_at(&inner, &options, fixed_now()).unwrap()
        );
    }

    #[test]
    fn test_plain_text_message_is_ignored() {
        let payload = json!({
            "title": "Disk",
            "state": "ok",
            "message": "[FIRING:1] Disk usage",
            "alerts": [{"labels": {"metric": "disk"}, "values": {"A": 80}}]
        });
        let rows = normalize(&payload, &NormalizeOptions::default()).unwrap();
        assert_eq!(rows[0].alert_name, "Disk");
        assert_eq!(rows[0].market, "disk");
    }

    #[test]
    fn test_degenerate_filter_modes() {
        let payload = json!({
            "title": "Flags",
            "state": "FIRING",
            "alerts": [
                {"labels": {"metric": "a"}, "values": {"A": 1}},
                {"labels": {"metric": "b"}, "values": {"A": "0e+00"}},
                {"labels": {"metric": "c"}, "values": {"A": 12.5}}
            ]
        });

        let kept = normalize(&payload, &NormalizeOptions::default()).unwrap();
        assert_eq!(kept.len(), 3);

        let filtering = NormalizeOptions {
            drop_degenerate_values: true,
        };
        let filtered = normalize(&payload, &filtering).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].market, "c");
        assert_eq!(filtered[0].value, "12.5");
    }

    #[test]
    fn test_degenerate_filter_keeps_one_row() {
        let payload = json!({
            "alerts": [
                {"labels": {"metric": "a"}, "values": {"A": "1e+00"}},
                {"labels": {"metric": "b"}, "values": {"A": 0}}
            ]
        });
        let rows = normalize(
            &payload,
            &NormalizeOptions {
                drop_degenerate_values: true,
            },
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].market, NO_MARKET);
        assert_eq!(rows[0].value, NO_DATA);
    }

    #[test]
    fn test_non_object_rejected() {
        let err = normalize(&json!([1, 2, 3]), &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, RelayError::MalformedPayload(_)));
        assert!(err.to_string().contains("an array"));
    }
}
