//! Current/original snapshot pair for dirty tracking.
//!
//! `original` is the last state known to be persisted and only changes
//! through [`SnapshotPair::commit`]. `current` is what the user is editing.

use crate::record::{ConfigRecord, ConfigValue};

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPair {
    current: ConfigRecord,
    original: ConfigRecord,
}

impl SnapshotPair {
    pub fn new(record: ConfigRecord) -> Self {
        Self {
            current: record.clone(),
            original: record,
        }
    }

    pub fn current(&self) -> &ConfigRecord {
        &self.current
    }

    pub fn original(&self) -> &ConfigRecord {
        &self.original
    }

    /// Full-depth structural inequality between the two snapshots.
    pub fn is_dirty(&self) -> bool {
        self.current != self.original
    }

    /// Edit a field of `current`. Returns `true` if the value changed.
    pub fn set_field(&mut self, field: &str, value: ConfigValue) -> bool {
        self.current.set(field, value)
    }

    /// Discard edits.
    pub fn reset(&mut self) {
        self.current = self.original.clone();
    }

    /// Adopt a freshly persisted record as both snapshots.
    pub fn commit(&mut self, record: ConfigRecord) {
        self.current = record.clone();
        self.original = record;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ResourceKind;

    fn pair() -> SnapshotPair {
        SnapshotPair::new(ResourceKind::Portfolio.default_record("P1"))
    }

    #[test]
    fn fresh_pair_is_clean() {
        assert!(!pair().is_dirty());
    }

    #[test]
    fn any_scalar_change_is_dirty() {
        let mut p = pair();
        p.set_field("exitTakeProfitPct", ConfigValue::Number(5.000_000_1));
        assert!(p.is_dirty());
    }

    #[test]
    fn setting_same_value_stays_clean() {
        let mut p = pair();
        assert!(!p.set_field("tradingMode", ConfigValue::from("paper")));
        assert!(!p.is_dirty());
    }

    #[test]
    fn changing_back_clears_dirty() {
        let mut p = pair();
        p.set_field("tradingMode", ConfigValue::from("live"));
        assert!(p.is_dirty());
        p.set_field("tradingMode", ConfigValue::from("paper"));
        assert!(!p.is_dirty());
    }

    #[test]
    fn reset_restores_original() {
        let mut p = pair();
        p.set_field("lookbackDays", ConfigValue::Number(90.0));
        p.reset();
        assert!(!p.is_dirty());
        assert_eq!(p.current(), p.original());
    }

    #[test]
    fn commit_replaces_both_snapshots() {
        let mut p = pair();
        p.set_field("lookbackDays", ConfigValue::Number(90.0));
        let saved = p.current().clone();
        p.commit(saved.clone());
        assert!(!p.is_dirty());
        assert_eq!(p.original(), &saved);
    }
}
