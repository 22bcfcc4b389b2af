//! Declarative field validation.
//!
//! Each resource kind publishes a static table of [`FieldRule`]s; one engine
//! ([`validate`]) evaluates any table against any record. Every rule runs on
//! every call and failures accumulate, so a record can report many errors at
//! once. The first failing rule for a field supplies its message.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::record::{ConfigRecord, ConfigValue};

/// Rule class applied to a single field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    /// Text that is present and not blank.
    RequiredText,
    /// Whole number strictly greater than zero.
    RequiredPositiveInt,
    /// Number within `[min, max]`. Missing values are out of range.
    Range { min: f64, max: f64 },
    /// Number within `[min, max]`, or missing/null.
    OptionalRange { min: f64, max: f64 },
    /// Number >= 0. Missing or null values pass: the field is optional.
    NonNegative,
    /// JSON array with at least one element.
    NonEmptyList,
    /// Text drawn from a fixed vocabulary. Blank text is left to `RequiredText`.
    OneOf(&'static [&'static str]),
}

impl Rule {
    /// Check `value`, returning the failure message if it does not pass.
    fn check(&self, label: &str, value: Option<&ConfigValue>) -> Option<String> {
        let passes = match self {
            Rule::RequiredText => value
                .and_then(ConfigValue::as_str)
                .is_some_and(|s| !s.trim().is_empty()),
            Rule::RequiredPositiveInt => value
                .and_then(ConfigValue::as_f64)
                .is_some_and(|n| n > 0.0 && n.fract() == 0.0),
            Rule::Range { min, max } => value
                .and_then(ConfigValue::as_f64)
                .is_some_and(|n| n >= *min && n <= *max),
            Rule::OptionalRange { min, max } => match value {
                None | Some(ConfigValue::Null) => true,
                Some(ConfigValue::Number(n)) => *n >= *min && *n <= *max,
                Some(_) => false,
            },
            Rule::NonNegative => match value {
                None | Some(ConfigValue::Null) => true,
                Some(ConfigValue::Number(n)) => *n >= 0.0,
                Some(_) => false,
            },
            Rule::NonEmptyList => matches!(
                value,
                Some(ConfigValue::Json(Value::Array(items))) if !items.is_empty()
            ),
            Rule::OneOf(allowed) => match value.and_then(ConfigValue::as_str) {
                Some(s) if s.trim().is_empty() => true,
                Some(s) => allowed.contains(&s),
                None => true,
            },
        };

        if passes {
            return None;
        }

        Some(match self {
            Rule::RequiredText => format!("{label} is required"),
            Rule::RequiredPositiveInt => format!("{label} must be a positive whole number"),
            Rule::Range { min, max } | Rule::OptionalRange { min, max } => {
                format!("{label} must be between {min} and {max}")
            }
            Rule::NonNegative => format!("{label} must be zero or greater"),
            Rule::NonEmptyList => format!("At least one {label} is required"),
            Rule::OneOf(allowed) => format!("{label} must be one of: {}", allowed.join(", ")),
        })
    }
}

/// One row of a rule table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    /// Wire name of the field being checked.
    pub field: &'static str,
    /// Human-readable name used in messages.
    pub label: &'static str,
    pub rule: Rule,
    /// Boolean sibling that must be `true` for this rule to apply.
    pub when: Option<&'static str>,
}

impl FieldRule {
    pub const fn new(field: &'static str, label: &'static str, rule: Rule) -> Self {
        Self {
            field,
            label,
            rule,
            when: None,
        }
    }

    /// Apply this rule only while `toggle` is enabled.
    pub const fn when(mut self, toggle: &'static str) -> Self {
        self.when = Some(toggle);
        self
    }

    fn applies_to(&self, record: &ConfigRecord) -> bool {
        self.when.map_or(true, |toggle| record.is_enabled(toggle))
    }
}

/// Field name -> message. Absence of a key means the field is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Record `message` for `field` unless it already has one.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut errors = ValidationErrors::new();
        for (field, message) in iter {
            errors.insert(field, message);
        }
        errors
    }
}

/// Evaluate every applicable rule in `rules` against `record`.
pub fn validate(record: &ConfigRecord, rules: &[FieldRule]) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for rule in rules.iter().filter(|r| r.applies_to(record)) {
        if errors.contains(rule.field) {
            continue;
        }
        if let Some(message) = rule.rule.check(rule.label, record.get(rule.field)) {
            errors.insert(rule.field, message);
        }
    }
    errors
}
