//! Configuration records and their field values.
//!
//! A [`ConfigRecord`] is the settings object the backend stores per
//! portfolio or strategy, held flat. Field names are the wire (camelCase)
//! names, with nested groups lifted to the top level by the kind's codec; the
//! owning entity id and the two server timestamps live outside the field map
//! because the user never edits them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::ResourceKind;

/// Wire name of the creation timestamp.
pub const CREATED_AT: &str = "createdAt";
/// Wire name of the last-update timestamp.
pub const UPDATED_AT: &str = "updatedAt";

/// Largest integer an `f64` represents exactly (2^53).
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Errors from decoding a record off the wire.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("configuration payload must be a JSON object")]
    NotAnObject,

    #[error("configuration payload has no '{field}'")]
    MissingOwner { field: &'static str },

    #[error("invalid timestamp in '{field}': {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// Value of a single configuration field.
///
/// Scalars cover every editable setting. `Json` carries opaque nested
/// payloads (such as `customJson`) that are preserved but never edited.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Json(Value),
}

impl ConfigValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a literal as typed on a command line or in a form field.
    ///
    /// `null`, `true` and `false` map to their variants, anything that parses
    /// as a finite number becomes a number, everything else is text.
    pub fn from_literal(raw: &str) -> Self {
        match raw {
            "null" => ConfigValue::Null,
            "true" => ConfigValue::Bool(true),
            "false" => ConfigValue::Bool(false),
            _ => match raw.trim().parse::<f64>() {
                Ok(n) if n.is_finite() && !raw.trim().is_empty() => ConfigValue::Number(n),
                _ => ConfigValue::Text(raw.to_string()),
            },
        }
    }

    /// Convert to a JSON value. Whole numbers become JSON integers.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Null => Value::Null,
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() <= MAX_EXACT_INT {
                    Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            ConfigValue::Text(s) => Value::String(s.clone()),
            ConfigValue::Json(v) => v.clone(),
        }
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => ConfigValue::Number(f),
                None => ConfigValue::Json(Value::Number(n)),
            },
            Value::String(s) => ConfigValue::Text(s),
            other => ConfigValue::Json(other),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        ConfigValue::Number(n)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Number(n as f64)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Text(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::Text(s)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Null => write!(f, "null"),
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Number(n) => write!(f, "{n}"),
            ConfigValue::Text(s) => write!(f, "{s}"),
            ConfigValue::Json(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(ConfigValue::from)
    }
}

/// Persisted settings object for one portfolio or strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRecord {
    /// Id of the owning portfolio/strategy. Server-assigned.
    pub owner_id: String,
    /// Editable settings keyed by wire name.
    pub fields: BTreeMap<String, ConfigValue>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConfigRecord {
    /// Empty record for `owner_id` with no timestamps.
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            fields: BTreeMap::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Builder-style field setter used by the schema defaults.
    pub fn with(mut self, field: &str, value: impl Into<ConfigValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&ConfigValue> {
        self.fields.get(field)
    }

    /// Set a field, returning `true` if the stored value actually changed.
    pub fn set(&mut self, field: &str, value: ConfigValue) -> bool {
        match self.fields.get(field) {
            Some(existing) if *existing == value => false,
            _ => {
                self.fields.insert(field.to_string(), value);
                true
            }
        }
    }

    /// True iff `field` holds `Bool(true)`.
    pub fn is_enabled(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(ConfigValue::Bool(true)))
    }

    /// Decode a wire payload for `kind`.
    pub fn from_json(kind: ResourceKind, value: Value) -> Result<Self, RecordError> {
        let Value::Object(mut map) = value else {
            return Err(RecordError::NotAnObject);
        };

        let owner_field = kind.owner_field();
        let owner_id = match map.remove(owner_field) {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(RecordError::MissingOwner { field: owner_field }),
        };

        let created_at = take_timestamp(&mut map, CREATED_AT)?;
        let updated_at = take_timestamp(&mut map, UPDATED_AT)?;
        kind.flatten_wire(&mut map);

        let fields = map
            .into_iter()
            .map(|(k, v)| (k, ConfigValue::from(v)))
            .collect();

        Ok(Self {
            owner_id,
            fields,
            created_at,
            updated_at,
        })
    }

    /// Full wire form, including owner id and timestamps.
    pub fn to_json(&self, kind: ResourceKind) -> Value {
        let mut map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        kind.nest_wire(&mut map);
        map.insert(
            kind.owner_field().to_string(),
            Value::String(self.owner_id.clone()),
        );
        if let Some(ts) = self.created_at {
            map.insert(CREATED_AT.to_string(), Value::String(ts.to_rfc3339()));
        }
        if let Some(ts) = self.updated_at {
            map.insert(UPDATED_AT.to_string(), Value::String(ts.to_rfc3339()));
        }
        Value::Object(map)
    }

    /// Create/update payload: editable fields only.
    pub fn request_body(&self, kind: ResourceKind) -> Value {
        let read_only = kind.read_only_fields();
        let mut map: Map<String, Value> = self
            .fields
            .iter()
            .filter(|(k, _)| !read_only.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        kind.nest_wire(&mut map);
        Value::Object(map)
    }
}

fn take_timestamp(
    map: &mut Map<String, Value>,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, RecordError> {
    match map.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| RecordError::InvalidTimestamp { field, value: s }),
        Some(other) => Err(RecordError::InvalidTimestamp {
            field,
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_portfolio_payload() {
        let payload = json!({
            "portfolioId": "P1",
            "tradingMode": "live",
            "signalCheckInterval": 600,
            "redisEnabled": false,
            "redisPassword": null,
            "customJson": {"b": 1, "a": [1, 2]},
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-15T10:30:00Z"
        });

        let record = ConfigRecord::from_json(ResourceKind::Portfolio, payload).unwrap();

        assert_eq!(record.owner_id, "P1");
        assert_eq!(record.get("tradingMode"), Some(&ConfigValue::from("live")));
        assert_eq!(record.get("signalCheckInterval"), Some(&ConfigValue::Number(600.0)));
        assert_eq!(record.get("redisPassword"), Some(&ConfigValue::Null));
        assert!(matches!(record.get("customJson"), Some(ConfigValue::Json(_))));
        assert!(record.created_at.is_some());
        assert!(record.get("portfolioId").is_none());
        assert!(record.get("createdAt").is_none());
    }

    #[test]
    fn rejects_payload_without_owner() {
        let err = ConfigRecord::from_json(ResourceKind::Strategy, json!({"universeType": "INDEX"}))
            .unwrap_err();
        assert!(matches!(err, RecordError::MissingOwner { field: "strategyId" }));
    }

    #[test]
    fn rejects_non_object_and_bad_timestamp() {
        assert!(matches!(
            ConfigRecord::from_json(ResourceKind::Portfolio, json!([1, 2])),
            Err(RecordError::NotAnObject)
        ));
        let err = ConfigRecord::from_json(
            ResourceKind::Portfolio,
            json!({"portfolioId": "P1", "createdAt": "yesterday"}),
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::InvalidTimestamp { field: "createdAt", .. }));
    }

    #[test]
    fn request_body_excludes_server_fields() {
        let record = ConfigRecord::new("S1")
            .with("id", "cfg-9")
            .with("cashReserve", 20_i64);
        let body = record.request_body(ResourceKind::Strategy);

        assert_eq!(
            body,
            json!({
                "universeDefinition": {},
                "allocations": {"cashReserve": 20},
                "riskParameters": {}
            })
        );
        let wire = record.to_json(ResourceKind::Strategy);
        assert_eq!(wire["strategyId"], json!("S1"));
        assert_eq!(wire["id"], json!("cfg-9"));
    }

    #[test]
    fn strategy_payload_decodes_flat_and_encodes_nested() {
        let payload = json!({
            "id": "cfg-1",
            "strategyId": "S1",
            "universeDefinition": {"type": "INDEX", "indices": ["NIFTY_500"]},
            "allocations": {
                "positionSizingMethod": "EQUAL_WEIGHT",
                "maxPositionSize": 10,
                "maxPortfolioAllocation": 100,
                "cashReserve": 0
            },
            "entryConditions": [{"id": "c1", "type": "TECHNICAL", "operator": "GT", "value": 1}],
            "exitConditions": [],
            "riskParameters": {"stopLossPercent": 5},
            "updatedAt": "2024-02-01T00:00:00Z"
        });

        let record = ConfigRecord::from_json(ResourceKind::Strategy, payload).unwrap();
        assert_eq!(record.get("universeType"), Some(&ConfigValue::from("INDEX")));
        assert_eq!(record.get("cashReserve"), Some(&ConfigValue::Number(0.0)));
        assert_eq!(record.get("stopLossPercent"), Some(&ConfigValue::Number(5.0)));
        assert!(matches!(record.get("entryConditions"), Some(ConfigValue::Json(_))));
        assert!(record.get("allocations").is_none());

        let body = record.request_body(ResourceKind::Strategy);
        assert_eq!(body["universeDefinition"], json!({"type": "INDEX", "indices": ["NIFTY_500"]}));
        assert_eq!(body["allocations"]["maxPositionSize"], json!(10));
        assert_eq!(body["riskParameters"], json!({"stopLossPercent": 5}));
        assert_eq!(body["exitConditions"], json!([]));
        assert!(body.get("id").is_none());
        assert!(body.get("cashReserve").is_none());
    }

    #[test]
    fn whole_numbers_serialize_as_integers() {
        assert_eq!(ConfigValue::Number(6379.0).to_json(), json!(6379));
        assert_eq!(ConfigValue::Number(2.5).to_json(), json!(2.5));
        assert_eq!(serde_json::to_string(&ConfigValue::Number(300.0)).unwrap(), "300");
    }

    #[test]
    fn set_reports_actual_changes_only() {
        let mut record = ConfigRecord::new("P1").with("lookbackDays", 30_i64);
        assert!(!record.set("lookbackDays", ConfigValue::Number(30.0)));
        assert!(record.set("lookbackDays", ConfigValue::Number(31.0)));
        assert!(record.set("exchange", ConfigValue::from("NSE")));
    }

    #[test]
    fn literals_parse_to_typed_values() {
        assert_eq!(ConfigValue::from_literal("true"), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::from_literal("null"), ConfigValue::Null);
        assert_eq!(ConfigValue::from_literal("6379"), ConfigValue::Number(6379.0));
        assert_eq!(ConfigValue::from_literal("-2.5"), ConfigValue::Number(-2.5));
        assert_eq!(ConfigValue::from_literal("live"), ConfigValue::from("live"));
        assert_eq!(ConfigValue::from_literal(""), ConfigValue::from(""));
        assert_eq!(ConfigValue::from_literal("NaN"), ConfigValue::from("NaN"));
    }

    #[test]
    fn nested_json_compares_order_independently() {
        let a = ConfigValue::from(json!({"x": 1, "y": {"p": true, "q": null}}));
        let b = ConfigValue::from(serde_json::from_str::<Value>(
            r#"{"y": {"q": null, "p": true}, "x": 1}"#,
        ).unwrap());
        assert_eq!(a, b);
    }
}
