//! Portfolio trading configuration: trading loop, historical cache, redis,
//! entry and exit conditions.

use crate::record::{ConfigRecord, ConfigValue};
use crate::validation::{FieldRule, Rule};

pub const TRADING_MODES: &[&str] = &["paper", "live"];

pub const SEARCH_FIELDS: &[&str] = &["tradingMode", "exchange", "candleInterval"];

pub static RULES: &[FieldRule] = &[
    // Trading
    FieldRule::new("tradingMode", "Trading mode", Rule::RequiredText),
    FieldRule::new("tradingMode", "Trading mode", Rule::OneOf(TRADING_MODES)),
    FieldRule::new("signalCheckInterval", "Signal check interval", Rule::RequiredPositiveInt),
    FieldRule::new("lookbackDays", "Lookback days", Rule::RequiredPositiveInt),
    FieldRule::new("cacheDurationSeconds", "Cache duration", Rule::NonNegative),
    // Historical cache
    FieldRule::new(
        "historicalCacheLookbackDays",
        "Historical cache lookback days",
        Rule::RequiredPositiveInt,
    )
    .when("historicalCacheEnabled"),
    FieldRule::new("historicalCacheExchange", "Historical cache exchange", Rule::RequiredText)
        .when("historicalCacheEnabled"),
    FieldRule::new("historicalCacheTtlSeconds", "Historical cache TTL", Rule::NonNegative),
    // Redis
    FieldRule::new("redisHost", "Redis host", Rule::RequiredText).when("redisEnabled"),
    FieldRule::new("redisPort", "Redis port", Rule::Range { min: 1.0, max: 65535.0 })
        .when("redisEnabled"),
    FieldRule::new("redisDb", "Redis database", Rule::Range { min: 0.0, max: 15.0 })
        .when("redisEnabled"),
    // Entry
    FieldRule::new("entryRsiThreshold", "RSI threshold", Rule::Range { min: 0.0, max: 100.0 }),
    FieldRule::new("entryFallbackSmaPeriod", "Fallback SMA period", Rule::NonNegative),
    FieldRule::new("entryFallbackAtrMultiplier", "Fallback ATR multiplier", Rule::NonNegative),
    // Exit
    FieldRule::new("exitTakeProfitPct", "Take profit", Rule::NonNegative),
    FieldRule::new("exitStopLossAtrMult", "Stop loss ATR multiple", Rule::NonNegative),
];

/// Documented defaults for a portfolio with no stored configuration.
pub fn default_record(portfolio_id: &str) -> ConfigRecord {
    ConfigRecord::new(portfolio_id)
        .with("tradingMode", "paper")
        .with("signalCheckInterval", 300_i64)
        .with("lookbackDays", 30_i64)
        .with("historicalCacheEnabled", false)
        .with("historicalCacheLookbackDays", 365_i64)
        .with("historicalCacheExchange", "NSE")
        .with("historicalCacheInstrumentType", "EQ")
        .with("historicalCacheCandleInterval", "day")
        .with("historicalCacheTtlSeconds", 86_400_i64)
        .with("redisEnabled", false)
        .with("redisHost", "localhost")
        .with("redisPort", 6379_i64)
        .with("redisPassword", ConfigValue::Null)
        .with("redisDb", 0_i64)
        .with("redisKeyPrefix", "portfolio:")
        .with("enableConditionalLogging", false)
        .with("cacheDurationSeconds", 300_i64)
        .with("exchange", "NSE")
        .with("candleInterval", "day")
        .with("entryBbLower", true)
        .with("entryRsiThreshold", 30_i64)
        .with("entryMacdTurnPositive", true)
        .with("entryVolumeAboveAvg", true)
        .with("entryFallbackSmaPeriod", 20_i64)
        .with("entryFallbackAtrMultiplier", 2.0)
        .with("exitTakeProfitPct", 5.0)
        .with("exitStopLossAtrMult", 2.0)
        .with("exitAllowTpExitsOnly", false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;

    #[test]
    fn defaults_match_documented_values() {
        let r = default_record("P1");
        assert_eq!(r.get("tradingMode"), Some(&ConfigValue::from("paper")));
        assert_eq!(r.get("signalCheckInterval"), Some(&ConfigValue::Number(300.0)));
        assert_eq!(r.get("lookbackDays"), Some(&ConfigValue::Number(30.0)));
        assert_eq!(r.get("redisPort"), Some(&ConfigValue::Number(6379.0)));
        assert_eq!(r.get("exitTakeProfitPct"), Some(&ConfigValue::Number(5.0)));
        assert!(!r.is_enabled("redisEnabled"));
        assert!(!r.is_enabled("historicalCacheEnabled"));
        assert!(r.created_at.is_none());
    }

    #[test]
    fn redis_fields_required_only_when_enabled() {
        let mut r = default_record("P1");
        r.set("redisHost", ConfigValue::from(""));
        r.set("redisPort", ConfigValue::Null);
        assert!(validate(&r, RULES).is_empty());

        r.set("redisEnabled", ConfigValue::Bool(true));
        let errors = validate(&r, RULES);
        assert_eq!(errors.get("redisHost"), Some("Redis host is required"));
        assert_eq!(errors.get("redisPort"), Some("Redis port must be between 1 and 65535"));
    }

    #[test]
    fn historical_cache_fields_gated_on_toggle() {
        let mut r = default_record("P1");
        r.set("historicalCacheLookbackDays", ConfigValue::Number(0.0));
        assert!(validate(&r, RULES).is_empty());

        r.set("historicalCacheEnabled", ConfigValue::Bool(true));
        assert!(validate(&r, RULES).contains("historicalCacheLookbackDays"));
    }
}
