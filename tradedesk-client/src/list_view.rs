//! Derived "visible list" over a fetched collection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use tradedesk_core::listing::{self, CategoryFilter, ListQuery, SortSpec};
use tradedesk_core::{Clock, ConfigRecord, Debouncer, ResourceKind};

use crate::api::ConfigApi;
use crate::error::{ErrorKind, Failure, Operation};
use crate::session::Session;

/// Source collection plus query, with the filtered and sorted result kept
/// up to date. Search text is debounced; everything else applies at once.
pub struct ListView {
    kind: ResourceKind,
    source: Vec<ConfigRecord>,
    query: ListQuery,
    search: Debouncer<String>,
    visible: Vec<ConfigRecord>,
}

impl ListView {
    pub fn new(kind: ResourceKind, clock: Arc<dyn Clock>, quiet_period: Duration) -> Self {
        Self {
            kind,
            source: Vec::new(),
            query: ListQuery::default(),
            search: Debouncer::new(quiet_period, clock),
            visible: Vec::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn visible(&self) -> &[ConfigRecord] {
        &self.visible
    }

    pub fn source(&self) -> &[ConfigRecord] {
        &self.source
    }

    pub fn set_source(&mut self, rows: Vec<ConfigRecord>) {
        self.source = rows;
        self.recompute();
    }

    /// Fetch the collection and replace the source.
    pub fn refresh(&mut self, api: &ConfigApi, session: &Session) -> Result<usize, Failure> {
        match api.list(self.kind) {
            Ok(rows) => {
                let count = rows.len();
                self.set_source(rows);
                Ok(count)
            }
            Err(err) => {
                let failure = Failure::from_api_error(self.kind, Operation::List, &err);
                warn!(kind = %self.kind, error = %err, "list refresh failed");
                if failure.kind == ErrorKind::Unauthorized {
                    session.expire();
                }
                Err(failure)
            }
        }
    }

    /// Queue new search text. Applied by [`ListView::tick`] once typing pauses.
    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search.push(text.into());
    }

    pub fn has_pending_search(&self) -> bool {
        self.search.has_pending()
    }

    /// Apply queued search text if the quiet period has passed.
    pub fn tick(&mut self) -> bool {
        match self.search.ready() {
            Some(text) => {
                self.apply_search(text);
                true
            }
            None => false,
        }
    }

    /// Apply queued search text immediately.
    pub fn flush_search(&mut self) -> bool {
        match self.search.flush() {
            Some(text) => {
                self.apply_search(text);
                true
            }
            None => false,
        }
    }

    pub fn set_category(&mut self, category: Option<CategoryFilter>) {
        self.query.category = category;
        self.recompute();
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.query.sort = sort;
        self.recompute();
    }

    pub fn toggle_sort(&mut self, field: &str) {
        self.query.toggle_sort(field);
        self.recompute();
    }

    fn apply_search(&mut self, text: String) {
        if text != self.query.text {
            self.query.text = text;
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        self.visible = listing::apply(self.kind, &self.source, &self.query);
        debug!(kind = %self.kind, total = self.source.len(), visible = self.visible.len(), "list recomputed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradedesk_core::ManualClock;

    fn rows() -> Vec<ConfigRecord> {
        vec![
            ConfigRecord::new("P1").with("tradingMode", "paper").with("lookbackDays", 30_i64),
            ConfigRecord::new("P2").with("tradingMode", "live").with("lookbackDays", 10_i64),
            ConfigRecord::new("P3").with("tradingMode", "live").with("lookbackDays", 20_i64),
        ]
    }

    fn ids(view: &ListView) -> Vec<&str> {
        view.visible().iter().map(|r| r.owner_id.as_str()).collect()
    }

    #[test]
    fn search_waits_for_quiet_period() {
        let clock = Arc::new(ManualClock::new());
        let mut view = ListView::new(ResourceKind::Portfolio, clock.clone(), Duration::from_millis(300));
        view.set_source(rows());
        assert_eq!(view.visible().len(), 3);

        view.set_search("l");
        clock.advance(Duration::from_millis(100));
        view.set_search("live");
        clock.advance(Duration::from_millis(299));
        assert!(!view.tick());
        assert_eq!(view.visible().len(), 3);

        clock.advance(Duration::from_millis(1));
        assert!(view.tick());
        assert_eq!(ids(&view), vec!["P2", "P3"]);
    }

    #[test]
    fn category_and_sort_apply_immediately() {
        let clock = Arc::new(ManualClock::new());
        let mut view = ListView::new(ResourceKind::Portfolio, clock, Duration::from_millis(300));
        view.set_source(rows());

        view.set_category(Some(CategoryFilter::new("tradingMode", "live")));
        view.toggle_sort("lookbackDays");
        assert_eq!(ids(&view), vec!["P2", "P3"]);

        view.toggle_sort("lookbackDays");
        assert_eq!(ids(&view), vec!["P3", "P2"]);
    }

    #[test]
    fn source_changes_recompute() {
        let clock = Arc::new(ManualClock::new());
        let mut view = ListView::new(ResourceKind::Portfolio, clock, Duration::ZERO);
        view.set_search("p1");
        assert!(view.flush_search());
        view.set_source(rows());
        assert_eq!(ids(&view), vec!["P1"]);
    }
}
