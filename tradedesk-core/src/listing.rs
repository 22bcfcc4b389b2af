//! Free-text search, categorical filter and toggleable sort over a record
//! collection.
//!
//! Everything here is pure: callers own the source collection and re-run
//! [`apply`] whenever the query or the source changes.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{ConfigRecord, ConfigValue, CREATED_AT, UPDATED_AT};
use crate::schema::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }
}

/// Exact-match filter on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFilter {
    pub field: String,
    pub value: ConfigValue,
}

impl CategoryFilter {
    pub fn new(field: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &ConfigRecord) -> bool {
        record.get(&self.field) == Some(&self.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub text: String,
    pub category: Option<CategoryFilter>,
    pub sort: Option<SortSpec>,
}

impl ListQuery {
    /// Sort by `field`, flipping the direction if it is already the sort field.
    pub fn toggle_sort(&mut self, field: &str) {
        self.sort = Some(match self.sort.take() {
            Some(spec) if spec.field == field => SortSpec {
                direction: spec.direction.flipped(),
                ..spec
            },
            _ => SortSpec::ascending(field),
        });
    }

    /// Inclusion predicate: text match AND category match.
    pub fn matches(&self, kind: ResourceKind, record: &ConfigRecord) -> bool {
        matches_text(kind, record, &self.text)
            && self.category.as_ref().map_or(true, |c| c.matches(record))
    }
}

/// Case-insensitive substring match against the owner id and the kind's
/// searchable fields. A blank query matches everything.
pub fn matches_text(kind: ResourceKind, record: &ConfigRecord, text: &str) -> bool {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    if record.owner_id.to_lowercase().contains(&needle) {
        return true;
    }
    kind.search_fields().iter().any(|field| match record.get(field) {
        None | Some(ConfigValue::Null) => false,
        Some(value) => value.to_string().to_lowercase().contains(&needle),
    })
}

/// Filter then sort `items` according to `query`.
pub fn apply(kind: ResourceKind, items: &[ConfigRecord], query: &ListQuery) -> Vec<ConfigRecord> {
    let mut visible: Vec<ConfigRecord> = items
        .iter()
        .filter(|r| query.matches(kind, r))
        .cloned()
        .collect();
    if let Some(spec) = &query.sort {
        sort_records(kind, &mut visible, spec);
    }
    visible
}

/// Stable sort. Descending order is the exact reverse of ascending order.
pub fn sort_records(kind: ResourceKind, items: &mut [ConfigRecord], spec: &SortSpec) {
    items.sort_by(|a, b| compare_by(kind, a, b, &spec.field));
    if spec.direction == SortDirection::Descending {
        items.reverse();
    }
}

/// Comparable projection of a field value.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Instant(DateTime<Utc>),
    Number(f64),
    Bool(bool),
    Text(String),
    Missing,
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Instant(_) => 0,
            SortKey::Number(_) => 1,
            SortKey::Bool(_) => 2,
            SortKey::Text(_) => 3,
            SortKey::Missing => 4,
        }
    }
}

fn sort_key(kind: ResourceKind, record: &ConfigRecord, field: &str) -> SortKey {
    if field == kind.owner_field() {
        return SortKey::Text(record.owner_id.to_lowercase());
    }
    let stamp = match field {
        CREATED_AT => Some(record.created_at),
        UPDATED_AT => Some(record.updated_at),
        _ => None,
    };
    if let Some(stamp) = stamp {
        return stamp.map_or(SortKey::Missing, SortKey::Instant);
    }
    match record.get(field) {
        None | Some(ConfigValue::Null) => SortKey::Missing,
        Some(ConfigValue::Number(n)) => SortKey::Number(*n),
        Some(ConfigValue::Bool(b)) => SortKey::Bool(*b),
        Some(ConfigValue::Text(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => SortKey::Instant(dt.with_timezone(&Utc)),
            Err(_) => SortKey::Text(s.to_lowercase()),
        },
        Some(ConfigValue::Json(v)) => SortKey::Text(v.to_string().to_lowercase()),
    }
}

fn compare_by(kind: ResourceKind, a: &ConfigRecord, b: &ConfigRecord, field: &str) -> Ordering {
    let (ka, kb) = (sort_key(kind, a, field), sort_key(kind, b, field));
    match (&ka, &kb) {
        (SortKey::Instant(x), SortKey::Instant(y)) => x.cmp(y),
        (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
        (SortKey::Bool(x), SortKey::Bool(y)) => x.cmp(y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        _ => ka.rank().cmp(&kb.rank()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(id: &str, mode: &str, lookback: i64) -> ConfigRecord {
        ConfigRecord::new(id)
            .with("tradingMode", mode)
            .with("lookbackDays", lookback)
            .with("exchange", "NSE")
    }

    fn ids(rows: &[ConfigRecord]) -> Vec<&str> {
        rows.iter().map(|r| r.owner_id.as_str()).collect()
    }

    #[test]
    fn blank_query_matches_everything() {
        let rows = vec![row("P1", "paper", 30), row("P2", "live", 10)];
        let q = ListQuery {
            text: "   ".into(),
            ..Default::default()
        };
        assert_eq!(apply(ResourceKind::Portfolio, &rows, &q).len(), 2);
    }

    #[test]
    fn text_search_is_case_insensitive_over_search_fields() {
        let rows = vec![row("Alpha", "paper", 30), row("Beta", "LIVE", 10)];
        let mut q = ListQuery::default();

        q.text = "live".into();
        assert_eq!(ids(&apply(ResourceKind::Portfolio, &rows, &q)), vec!["Beta"]);

        q.text = "ALP".into();
        assert_eq!(ids(&apply(ResourceKind::Portfolio, &rows, &q)), vec!["Alpha"]);

        // lookbackDays is not a search field
        q.text = "30".into();
        assert!(apply(ResourceKind::Portfolio, &rows, &q).is_empty());
    }

    #[test]
    fn category_filter_requires_exact_value() {
        let rows = vec![row("P1", "paper", 30), row("P2", "live", 10), row("P3", "Live", 5)];
        let q = ListQuery {
            category: Some(CategoryFilter::new("tradingMode", "live")),
            ..Default::default()
        };
        assert_eq!(ids(&apply(ResourceKind::Portfolio, &rows, &q)), vec!["P2"]);
    }

    #[test]
    fn toggle_sort_flips_then_resets_on_new_field() {
        let mut q = ListQuery::default();
        q.toggle_sort("lookbackDays");
        assert_eq!(q.sort.as_ref().map(|s| s.direction), Some(SortDirection::Ascending));
        q.toggle_sort("lookbackDays");
        assert_eq!(q.sort.as_ref().map(|s| s.direction), Some(SortDirection::Descending));
        q.toggle_sort("tradingMode");
        assert_eq!(q.sort, Some(SortSpec::ascending("tradingMode")));
    }

    #[test]
    fn numbers_sort_numerically_and_missing_last() {
        let rows = vec![
            row("P1", "paper", 100),
            ConfigRecord::new("P2"),
            row("P3", "paper", 9),
        ];
        let mut q = ListQuery::default();
        q.toggle_sort("lookbackDays");
        assert_eq!(ids(&apply(ResourceKind::Portfolio, &rows, &q)), vec!["P3", "P1", "P2"]);
        q.toggle_sort("lookbackDays");
        assert_eq!(ids(&apply(ResourceKind::Portfolio, &rows, &q)), vec!["P2", "P1", "P3"]);
    }

    #[test]
    fn text_sort_ignores_case() {
        let rows = vec![row("b", "x", 1), row("A", "x", 1), row("c", "x", 1)];
        let q = ListQuery {
            sort: Some(SortSpec::ascending("portfolioId")),
            ..Default::default()
        };
        assert_eq!(ids(&apply(ResourceKind::Portfolio, &rows, &q)), vec!["A", "b", "c"]);
    }

    #[test]
    fn timestamps_sort_as_instants() {
        let mut early = ConfigRecord::new("early");
        early.updated_at = Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        let mut late = ConfigRecord::new("late");
        late.updated_at = Some(Utc.with_ymd_and_hms(2024, 11, 2, 0, 0, 0).unwrap());

        let q = ListQuery {
            sort: Some(SortSpec {
                field: UPDATED_AT.into(),
                direction: SortDirection::Descending,
            }),
            ..Default::default()
        };
        let rows = vec![early, late];
        assert_eq!(ids(&apply(ResourceKind::Portfolio, &rows, &q)), vec!["late", "early"]);
    }

    #[test]
    fn ascending_sort_is_stable_for_ties() {
        let rows = vec![row("P1", "live", 1), row("P2", "paper", 1), row("P3", "live", 1)];
        let q = ListQuery {
            sort: Some(SortSpec::ascending("lookbackDays")),
            ..Default::default()
        };
        assert_eq!(ids(&apply(ResourceKind::Portfolio, &rows, &q)), vec!["P1", "P2", "P3"]);
    }
}
