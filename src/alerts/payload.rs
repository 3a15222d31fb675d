//Grafana 告警 payload 的几种已知结构
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub const UNKNOWN_MARKET: &str = "Unknown Market";
pub const NO_MARKET: &str = "No Market";
pub const NO_DATA: &str = "No Data";

// labels 里按顺序取 market
const MARKET_LABEL_KEYS: [&str; 3] = ["metric", "instance", "job"];
const VALUE_MARKER: &str = "value=";

/// A single monitored series pulled out of a payload, before it becomes a row.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub market: String,
    pub value: String,
}

impl Series {
    pub fn placeholder() -> Self {
        Series {
            market: NO_MARKET.to_string(),
            value: NO_DATA.to_string(),
        }
    }
}

// 对应 unified alerting 的 alerts[] 元素
#[derive(Debug, Default, Deserialize)]
pub struct AlertEntry {
    #[serde(default, deserialize_with = "lenient_map")]
    pub labels: Map<String, Value>,

    #[serde(default, deserialize_with = "lenient_map")]
    pub values: Map<String, Value>,

    #[serde(default, rename = "valueString")]
    pub value_string: Option<Value>,
}

impl AlertEntry {
    pub fn market(&self) -> String {
        MARKET_LABEL_KEYS
            .iter()
            .find_map(|key| field_text(self.labels.get(*key)))
            .unwrap_or_else(|| UNKNOWN_MARKET.to_string())
    }

    pub fn value(&self) -> String {
        field_text(self.values.get("A"))
            .or_else(|| {
                self.value_string
                    .as_ref()
                    .and_then(Value::as_str)
                    .and_then(parse_value_string)
            })
            .unwrap_or_else(|| NO_DATA.to_string())
    }
}

// 对应旧版 evalMatches[] 元素
#[derive(Debug, Default, Deserialize)]
pub struct EvalMatch {
    #[serde(default)]
    pub value: Option<Value>,

    #[serde(default, deserialize_with = "lenient_map")]
    pub tags: Map<String, Value>,

    #[serde(default)]
    pub metric: Option<Value>,
}

impl EvalMatch {
    pub fn market(&self) -> String {
        field_text(self.tags.get("metric"))
            .or_else(|| field_text(self.metric.as_ref()))
            .unwrap_or_else(|| UNKNOWN_MARKET.to_string())
    }

    pub fn value(&self) -> String {
        field_text(self.value.as_ref()).unwrap_or_else(|| NO_DATA.to_string())
    }
}

/// The payload layouts we know how to read, in the order they are tried.
#[derive(Debug)]
pub enum PayloadShape {
    Unified(Vec<AlertEntry>),
    Legacy(Vec<EvalMatch>),
    Empty,
}

type ShapeDetector = fn(&Map<String, Value>) -> Option<PayloadShape>;

const SHAPE_DETECTORS: [ShapeDetector; 2] = [detect_unified, detect_legacy];

impl PayloadShape {
    pub fn detect(payload: &Map<String, Value>) -> PayloadShape {
        SHAPE_DETECTORS
            .iter()
            .find_map(|detector| detector(payload))
            .unwrap_or(PayloadShape::Empty)
    }

    pub fn into_series(self) -> Vec<Series> {
        match self {
            PayloadShape::Unified(entries) => entries
                .iter()
                .map(|e| Series {
                    market: e.market(),
                    value: e.value(),
                })
                .collect(),
            PayloadShape::Legacy(matches) => matches
                .iter()
                .map(|m| Series {
                    market: m.market(),
                    value: m.value(),
                })
                .collect(),
            PayloadShape::Empty => vec![Series::placeholder()],
        }
    }
}

fn detect_unified(payload: &Map<String, Value>) -> Option<PayloadShape> {
    let alerts = non_empty_array(payload, "alerts")?;
    Some(PayloadShape::Unified(
        alerts.iter().map(typed_or_default::<AlertEntry>).collect(),
    ))
}

fn detect_legacy(payload: &Map<String, Value>) -> Option<PayloadShape> {
    let matches = non_empty_array(payload, "evalMatches")?;
    Some(PayloadShape::Legacy(
        matches.iter().map(typed_or_default::<EvalMatch>).collect(),
    ))
}

/// Returns the decoded object when `message` carries a JSON-encoded payload.
pub fn unwrap_envelope(payload: &Map<String, Value>) -> Option<Map<String, Value>> {
    let message = payload.get("message")?.as_str()?;
    match serde_json::from_str::<Value>(message) {
        Ok(Value::Object(inner)) => Some(inner),
        _ => None,
    }
}

/// Pulls the token following `value=` out of a Grafana `valueString`,
/// e.g. `[ var='A' labels={instance=node1} value=5.3 ]` gives `5.3`.
pub fn parse_value_string(value_string: &str) -> Option<String> {
    let (_, rest) = value_string.split_once(VALUE_MARKER)?;
    let token = rest
        .split(|c: char| c.is_whitespace() || c == ']' || c == ',')
        .next()
        .unwrap_or_default();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Stringifies a JSON field; `null`, empty strings and absent keys count as missing.
pub fn field_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn non_empty_array<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a Vec<Value>> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
}

// 单个元素格式不对时退回默认值，不丢弃
fn typed_or_default<T: serde::de::DeserializeOwned + Default>(value: &Value) -> T {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

fn lenient_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}
