//! Strategy configuration: universe selection, allocation limits, optional
//! risk parameters and the entry/exit condition lists.
//!
//! The backend stores universe, allocation and risk settings as nested
//! objects. Records hold them flattened so every setting is a scalar field the
//! editor and validator can address by name; [`flatten`] and [`nest`] convert
//! between the two shapes. Condition lists stay opaque JSON arrays.

use serde_json::{json, Map, Value};

use crate::record::{ConfigRecord, ConfigValue};
use crate::validation::{FieldRule, Rule};

pub const UNIVERSE_TYPES: &[&str] = &["INDEX", "SECTOR", "CUSTOM"];
pub const SIZING_METHODS: &[&str] = &["EQUAL_WEIGHT", "RISK_PARITY", "CUSTOM"];

pub const SEARCH_FIELDS: &[&str] = &["universeType", "positionSizingMethod"];

/// Config row id assigned by the backend.
pub const READ_ONLY_FIELDS: &[&str] = &["id"];

pub const ENTRY_CONDITIONS: &str = "entryConditions";
pub const EXIT_CONDITIONS: &str = "exitConditions";

/// Nested wire object -> (key inside it, flat field name).
pub const GROUPS: &[(&str, &[(&str, &str)])] = &[
    (
        "universeDefinition",
        &[
            ("type", "universeType"),
            ("indices", "universeIndices"),
            ("sectors", "universeSectors"),
            ("symbols", "universeSymbols"),
        ],
    ),
    (
        "allocations",
        &[
            ("positionSizingMethod", "positionSizingMethod"),
            ("maxPositionSize", "maxPositionSize"),
            ("maxPortfolioAllocation", "maxPortfolioAllocation"),
            ("cashReserve", "cashReserve"),
        ],
    ),
    (
        "riskParameters",
        &[
            ("stopLossPercent", "stopLossPercent"),
            ("takeProfitPercent", "takeProfitPercent"),
            ("trailingStopPercent", "trailingStopPercent"),
            ("maxDrawdownPercent", "maxDrawdownPercent"),
            ("maxDailyLoss", "maxDailyLoss"),
        ],
    ),
];

const PERCENT: Rule = Rule::Range { min: 0.0, max: 100.0 };
const PERCENT_NONZERO: Rule = Rule::Range { min: 1.0, max: 100.0 };
const OPTIONAL_PERCENT: Rule = Rule::OptionalRange { min: 0.0, max: 100.0 };

pub static RULES: &[FieldRule] = &[
    FieldRule::new("universeType", "Universe type", Rule::RequiredText),
    FieldRule::new("universeType", "Universe type", Rule::OneOf(UNIVERSE_TYPES)),
    FieldRule::new("positionSizingMethod", "Position sizing method", Rule::RequiredText),
    FieldRule::new("positionSizingMethod", "Position sizing method", Rule::OneOf(SIZING_METHODS)),
    FieldRule::new("maxPositionSize", "Max position size", PERCENT_NONZERO),
    FieldRule::new("maxPortfolioAllocation", "Max portfolio allocation", PERCENT_NONZERO),
    FieldRule::new("cashReserve", "Cash reserve", PERCENT),
    FieldRule::new("stopLossPercent", "Stop loss", OPTIONAL_PERCENT),
    FieldRule::new("takeProfitPercent", "Take profit", Rule::NonNegative),
    FieldRule::new("trailingStopPercent", "Trailing stop", OPTIONAL_PERCENT),
    FieldRule::new("maxDrawdownPercent", "Max drawdown", OPTIONAL_PERCENT),
    FieldRule::new("maxDailyLoss", "Max daily loss", Rule::NonNegative),
    FieldRule::new(ENTRY_CONDITIONS, "entry condition", Rule::NonEmptyList),
    FieldRule::new(EXIT_CONDITIONS, "exit condition", Rule::NonEmptyList),
];

pub fn default_record(strategy_id: &str) -> ConfigRecord {
    ConfigRecord::new(strategy_id)
        .with("universeType", "INDEX")
        .with("universeIndices", json!([]))
        .with("universeSectors", json!([]))
        .with("universeSymbols", json!([]))
        .with("positionSizingMethod", "EQUAL_WEIGHT")
        .with("maxPositionSize", 10_i64)
        .with("maxPortfolioAllocation", 100_i64)
        .with("cashReserve", 0_i64)
        .with("stopLossPercent", ConfigValue::Null)
        .with("takeProfitPercent", ConfigValue::Null)
        .with("trailingStopPercent", ConfigValue::Null)
        .with("maxDrawdownPercent", ConfigValue::Null)
        .with("maxDailyLoss", ConfigValue::Null)
        .with(ENTRY_CONDITIONS, json!([condition("entry-1", "LT", 30)]))
        .with(EXIT_CONDITIONS, json!([condition("exit-1", "GT", 70)]))
}

/// Daily RSI threshold, the starter condition for new strategies.
fn condition(id: &str, operator: &str, value: i64) -> Value {
    json!({
        "id": id,
        "type": "TECHNICAL",
        "indicator": "RSI",
        "operator": operator,
        "value": value,
        "timeframe": "day",
        "logicalOperator": "AND",
    })
}

/// Lift the known keys of each nested group to top-level fields.
///
/// Keys a group carries beyond the known ones stay behind in the group
/// object, which is kept only if something is left in it. Payloads that are
/// already flat pass through untouched.
pub fn flatten(map: &mut Map<String, Value>) {
    for (group, keys) in GROUPS {
        let Some(Value::Object(mut inner)) = map.remove(*group) else {
            continue;
        };
        for (key, field) in *keys {
            if let Some(value) = inner.remove(*key) {
                map.insert((*field).to_string(), value);
            }
        }
        if !inner.is_empty() {
            map.insert((*group).to_string(), Value::Object(inner));
        }
    }
}

/// Inverse of [`flatten`]: fold flat fields back into their groups.
///
/// Groups are always emitted, merged over any leftover keys preserved from
/// the last decode.
pub fn nest(map: &mut Map<String, Value>) {
    for (group, keys) in GROUPS {
        let mut inner = match map.remove(*group) {
            Some(Value::Object(inner)) => inner,
            _ => Map::new(),
        };
        for (key, field) in *keys {
            if let Some(value) = map.remove(*field) {
                inner.insert((*key).to_string(), value);
            }
        }
        map.insert((*group).to_string(), Value::Object(inner));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;

    fn backend_payload() -> Map<String, Value> {
        let Value::Object(map) = json!({
            "id": "cfg-1",
            "universeDefinition": {"type": "SECTOR", "sectors": ["Technology"], "weighting": "cap"},
            "allocations": {
                "positionSizingMethod": "RISK_PARITY",
                "maxPositionSize": 5,
                "maxPortfolioAllocation": 90,
                "cashReserve": 10
            },
            "entryConditions": [{"id": "c1", "type": "PRICE", "operator": "GT", "value": 100}],
            "exitConditions": [{"id": "c2", "type": "PRICE", "operator": "LT", "value": 90}],
            "riskParameters": {"stopLossPercent": 8, "maxDailyLoss": null}
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn flatten_lifts_group_keys_and_keeps_extras() {
        let mut map = backend_payload();
        flatten(&mut map);

        assert_eq!(map["universeType"], json!("SECTOR"));
        assert_eq!(map["universeSectors"], json!(["Technology"]));
        assert_eq!(map["cashReserve"], json!(10));
        assert_eq!(map["stopLossPercent"], json!(8));
        assert_eq!(map["maxDailyLoss"], Value::Null);
        assert_eq!(map["universeDefinition"], json!({"weighting": "cap"}));
        assert!(!map.contains_key("allocations"));
        assert!(!map.contains_key("riskParameters"));
        assert!(map[ENTRY_CONDITIONS].is_array());
    }

    #[test]
    fn nest_restores_backend_shape() {
        let original = backend_payload();
        let mut map = original.clone();
        flatten(&mut map);
        nest(&mut map);
        assert_eq!(map, original);
    }

    #[test]
    fn flat_payloads_pass_through_flatten() {
        let Value::Object(mut map) = json!({"universeType": "INDEX", "cashReserve": 5}) else {
            unreachable!()
        };
        let before = map.clone();
        flatten(&mut map);
        assert_eq!(map, before);
    }

    #[test]
    fn optional_risk_parameters_accept_null_but_not_out_of_range() {
        let mut r = default_record("S1");
        assert!(validate(&r, RULES).is_empty());

        r.set("stopLossPercent", ConfigValue::Number(-1.0));
        r.set("maxDrawdownPercent", ConfigValue::Number(400.0));
        r.set("trailingStopPercent", ConfigValue::Number(100.0));
        let errors = validate(&r, RULES);
        assert_eq!(errors.get("stopLossPercent"), Some("Stop loss must be between 0 and 100"));
        assert_eq!(
            errors.get("maxDrawdownPercent"),
            Some("Max drawdown must be between 0 and 100")
        );
        assert!(!errors.contains("trailingStopPercent"));

        // Take profit has no upper bound.
        r.set("takeProfitPercent", ConfigValue::Number(250.0));
        assert!(!validate(&r, RULES).contains("takeProfitPercent"));
    }

    #[test]
    fn allocation_limits_are_bounded() {
        let mut r = default_record("S1");
        r.set("maxPositionSize", ConfigValue::Number(0.0));
        r.set("cashReserve", ConfigValue::Number(101.0));
        let errors = validate(&r, RULES);
        assert_eq!(errors.get("maxPositionSize"), Some("Max position size must be between 1 and 100"));
        assert!(errors.contains("cashReserve"));
    }

    #[test]
    fn strategies_need_entry_and_exit_conditions() {
        let mut r = default_record("S1");
        r.set(ENTRY_CONDITIONS, ConfigValue::from(json!([])));
        r.fields.remove(EXIT_CONDITIONS);
        let errors = validate(&r, RULES);
        assert_eq!(
            errors.get(ENTRY_CONDITIONS),
            Some("At least one entry condition is required")
        );
        assert_eq!(
            errors.get(EXIT_CONDITIONS),
            Some("At least one exit condition is required")
        );
    }
}
