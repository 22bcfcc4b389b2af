//! Load/save orchestration for one resource kind.
//!
//! A [`ConfigEditor`] owns everything the edit screen needs: the selected
//! entity, the current/original snapshots, local and server validation
//! errors, the last failure, and a TTL cache of loaded records. Every public
//! method returns an outcome value; failures never escape as panics or
//! errors.
//!
//! Loads and saves come in two forms. `load_config` / `save` run the request
//! inline. `begin_*` / `complete_*` split the request out so the caller can
//! run it elsewhere; each ticket is tagged with the selection and a sequence
//! number, and completions whose tag no longer matches are discarded.
//!
//! Saves are tracked per owner until their ticket comes back through
//! `complete_save`, even across reselection and `close`, so an owner never
//! has two writes outstanding.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use tradedesk_core::{
    validate, Clock, ConfigRecord, ConfigValue, ResourceKind, SnapshotPair, TtlCache,
    ValidationErrors,
};

use crate::api::ConfigApi;
use crate::error::{ApiError, ErrorKind, Failure, Operation};
use crate::session::{Level, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    /// Nothing selected.
    Idle,
    Loading,
    /// Showing a stored configuration.
    Loaded,
    /// No stored configuration; showing documented defaults.
    Defaulted,
    /// Load failed; no snapshots.
    Errored,
    /// Current differs from original.
    Editing,
    Saving,
    SaveErrored,
}

/// Pending load, tagged with the selection it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    owner_id: String,
    seq: u64,
}

impl LoadTicket {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded { from_cache: bool },
    Defaulted,
    Failed(Failure),
    /// Response arrived for a selection that is no longer current.
    Discarded,
}

#[derive(Debug)]
pub enum LoadStep {
    Ready(LoadOutcome),
    Pending(LoadTicket),
}

/// Pending save. Carries the record snapshot that was submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    owner_id: String,
    seq: u64,
    create: bool,
    record: ConfigRecord,
}

impl SaveTicket {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// `true` for POST (no stored config yet), `false` for PUT.
    pub fn is_create(&self) -> bool {
        self.create
    }

    pub fn record(&self) -> &ConfigRecord {
        &self.record
    }
}

/// Why a save was refused before any request was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveBlock {
    AlreadySaving,
    NothingLoaded,
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Created,
    Updated,
    Blocked(SaveBlock),
    Failed(Failure),
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing stored for the selection, or a save is in flight.
    Skipped,
    Failed(Failure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("no configuration is loaded")]
    NothingLoaded,

    #[error("a save is in progress")]
    Saving,
}

pub struct ConfigEditor {
    kind: ResourceKind,
    api: ConfigApi,
    session: Arc<Session>,
    cache: TtlCache<String, ConfigRecord>,
    state: EditorState,
    selected: Option<String>,
    snapshots: Option<SnapshotPair>,
    exists: bool,
    errors: ValidationErrors,
    server_errors: ValidationErrors,
    failure: Option<Failure>,
    seq: u64,
    /// Sequence number at which the current selection was made.
    selected_seq: u64,
    load_seq: Option<u64>,
    /// Owner id -> sequence number of its outstanding save ticket.
    in_flight: BTreeMap<String, u64>,
}

impl ConfigEditor {
    pub fn new(
        kind: ResourceKind,
        api: ConfigApi,
        session: Arc<Session>,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            kind,
            api,
            session,
            cache: TtlCache::new(cache_ttl, clock),
            state: EditorState::Idle,
            selected: None,
            snapshots: None,
            exists: false,
            errors: ValidationErrors::new(),
            server_errors: ValidationErrors::new(),
            failure: None,
            seq: 0,
            selected_seq: 0,
            load_seq: None,
            in_flight: BTreeMap::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn current(&self) -> Option<&ConfigRecord> {
        self.snapshots.as_ref().map(SnapshotPair::current)
    }

    pub fn original(&self) -> Option<&ConfigRecord> {
        self.snapshots.as_ref().map(SnapshotPair::original)
    }

    /// Whether the backend holds a configuration for the selection.
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    /// Local rule failures for the current snapshot.
    pub fn validation_errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Field errors reported by the server on the last failed save.
    pub fn server_errors(&self) -> &ValidationErrors {
        &self.server_errors
    }

    /// Message to show next to `field`: local rules first, then server.
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).or_else(|| self.server_errors.get(field))
    }

    pub fn is_dirty(&self) -> bool {
        self.snapshots.as_ref().is_some_and(SnapshotPair::is_dirty)
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether the selected owner has a save outstanding.
    pub fn is_saving(&self) -> bool {
        self.selected
            .as_ref()
            .is_some_and(|owner| self.in_flight.contains_key(owner))
    }

    pub fn can_save(&self) -> bool {
        self.is_dirty() && self.is_valid() && !self.is_saving()
    }

    pub fn cache(&self) -> &TtlCache<String, ConfigRecord> {
        &self.cache
    }

    // ── Load ─────────────────────────────────────────────────────────

    /// Select `owner_id` and load its configuration, from cache if fresh.
    pub fn load_config(&mut self, owner_id: &str) -> LoadOutcome {
        match self.begin_load(owner_id) {
            LoadStep::Ready(outcome) => outcome,
            LoadStep::Pending(ticket) => {
                let result = self.api.get_config(self.kind, ticket.owner_id());
                self.complete_load(ticket, result)
            }
        }
    }

    /// Drop the cached copy and load from the backend.
    pub fn reload(&mut self) -> Option<LoadOutcome> {
        let owner_id = self.selected.clone()?;
        self.cache.invalidate(&owner_id);
        Some(self.load_config(&owner_id))
    }

    pub fn begin_load(&mut self, owner_id: &str) -> LoadStep {
        self.seq += 1;
        self.selected_seq = self.seq;
        self.selected = Some(owner_id.to_string());
        self.failure = None;
        self.server_errors.clear();

        if let Some(record) = self.cache.get(&owner_id.to_string()) {
            debug!(kind = %self.kind, owner = %owner_id, "config cache hit");
            self.load_seq = None;
            self.adopt(record, true);
            return LoadStep::Ready(LoadOutcome::Loaded { from_cache: true });
        }

        debug!(kind = %self.kind, owner = %owner_id, "config cache miss");
        self.load_seq = Some(self.seq);
        self.snapshots = None;
        self.errors.clear();
        self.exists = false;
        self.state = EditorState::Loading;
        LoadStep::Pending(LoadTicket {
            owner_id: owner_id.to_string(),
            seq: self.seq,
        })
    }

    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<ConfigRecord, ApiError>,
    ) -> LoadOutcome {
        if self.load_seq != Some(ticket.seq)
            || self.selected.as_deref() != Some(ticket.owner_id.as_str())
        {
            warn!(kind = %self.kind, owner = %ticket.owner_id, "discarding stale load response");
            return LoadOutcome::Discarded;
        }
        self.load_seq = None;

        match result {
            Ok(record) => {
                self.cache.put(ticket.owner_id, record.clone());
                self.adopt(record, true);
                LoadOutcome::Loaded { from_cache: false }
            }
            Err(err) if err.is_not_found() => {
                info!(kind = %self.kind, owner = %ticket.owner_id, "no stored configuration, using defaults");
                let defaults = self.kind.default_record(&ticket.owner_id);
                self.adopt(defaults, false);
                LoadOutcome::Defaulted
            }
            Err(err) => {
                let failure = self.fail(Operation::Load, &err);
                self.snapshots = None;
                self.errors.clear();
                self.exists = false;
                self.state = EditorState::Errored;
                LoadOutcome::Failed(failure)
            }
        }
    }

    // ── Edit ─────────────────────────────────────────────────────────

    /// Change one field of the current snapshot and re-run validation.
    /// Returns whether the value changed.
    pub fn set_field(&mut self, field: &str, value: ConfigValue) -> Result<bool, EditError> {
        if self.is_saving() {
            return Err(EditError::Saving);
        }
        let pair = self.snapshots.as_mut().ok_or(EditError::NothingLoaded)?;
        let changed = pair.set_field(field, value);

        self.server_errors.clear();
        if self.failure.as_ref().is_some_and(|f| !f.is_retryable()) {
            self.failure = None;
        }
        self.revalidate();
        self.settle_state();
        Ok(changed)
    }

    /// Discard edits and return to the last persisted state.
    pub fn cancel(&mut self) -> bool {
        if self.is_saving() {
            return false;
        }
        let Some(pair) = self.snapshots.as_mut() else {
            return false;
        };
        pair.reset();
        self.server_errors.clear();
        self.failure = None;
        self.revalidate();
        self.settle_state();
        true
    }

    // ── Save ─────────────────────────────────────────────────────────

    /// Create or update the current snapshot.
    pub fn save(&mut self) -> SaveOutcome {
        let ticket = match self.begin_save() {
            Ok(ticket) => ticket,
            Err(block) => return SaveOutcome::Blocked(block),
        };
        let result = if ticket.create {
            self.api.create_config(self.kind, &ticket.record)
        } else {
            self.api.update_config(self.kind, &ticket.record)
        };
        self.complete_save(ticket, result)
    }

    pub fn begin_save(&mut self) -> Result<SaveTicket, SaveBlock> {
        if self.is_saving() {
            return Err(SaveBlock::AlreadySaving);
        }
        let (Some(owner_id), Some(pair)) = (self.selected.clone(), self.snapshots.as_ref()) else {
            return Err(SaveBlock::NothingLoaded);
        };
        let record = pair.current().clone();

        self.revalidate();
        if !self.errors.is_empty() {
            debug!(kind = %self.kind, owner = %owner_id, errors = self.errors.len(), "save blocked by validation");
            self.failure = Some(Failure::invalid_locally(self.errors.clone()));
            return Err(SaveBlock::Invalid);
        }

        self.seq += 1;
        self.in_flight.insert(owner_id.clone(), self.seq);
        self.failure = None;
        self.state = EditorState::Saving;
        Ok(SaveTicket {
            owner_id,
            seq: self.seq,
            create: !self.exists,
            record,
        })
    }

    pub fn complete_save(
        &mut self,
        ticket: SaveTicket,
        result: Result<ConfigRecord, ApiError>,
    ) -> SaveOutcome {
        let outstanding = self.in_flight.get(&ticket.owner_id) == Some(&ticket.seq);
        if outstanding {
            self.in_flight.remove(&ticket.owner_id);
        }
        // Reselecting, even the same owner, replaces the snapshots the save
        // was taken from.
        let applies = outstanding
            && self.selected.as_deref() == Some(ticket.owner_id.as_str())
            && self.selected_seq < ticket.seq;
        if !applies {
            // The write may still have landed; never serve the old copy.
            if result.is_ok() {
                self.cache.invalidate(&ticket.owner_id);
            }
            warn!(kind = %self.kind, owner = %ticket.owner_id, "discarding stale save response");
            return SaveOutcome::Discarded;
        }

        match result {
            Ok(saved) => {
                self.cache.invalidate(&ticket.owner_id);
                if let Some(pair) = self.snapshots.as_mut() {
                    pair.commit(saved);
                }
                self.exists = true;
                self.server_errors.clear();
                self.failure = None;
                self.revalidate();
                self.state = EditorState::Loaded;
                info!(kind = %self.kind, owner = %ticket.owner_id, create = ticket.create, "configuration saved");
                self.session.notify(
                    Level::Success,
                    "Configuration Saved",
                    &format!("{} configuration saved successfully.", self.kind.display_name()),
                );
                if ticket.create {
                    SaveOutcome::Created
                } else {
                    SaveOutcome::Updated
                }
            }
            Err(err) => {
                let failure = self.fail(Operation::Save, &err);
                self.server_errors = failure.field_errors.clone();
                self.state = EditorState::SaveErrored;
                self.session.notify(Level::Error, "Save Failed", &failure.message);
                SaveOutcome::Failed(failure)
            }
        }
    }

    // ── Delete / close ───────────────────────────────────────────────

    /// Delete the stored configuration and fall back to defaults.
    pub fn delete(&mut self) -> DeleteOutcome {
        let Some(owner_id) = self.selected.clone() else {
            return DeleteOutcome::Skipped;
        };
        if !self.exists || self.is_saving() {
            return DeleteOutcome::Skipped;
        }

        match self.api.delete_config(self.kind, &owner_id) {
            Ok(()) => {
                self.cache.invalidate(&owner_id);
                let defaults = self.kind.default_record(&owner_id);
                self.adopt(defaults, false);
                self.session.notify(
                    Level::Success,
                    "Configuration Deleted",
                    &format!("{} configuration reset to defaults.", self.kind.display_name()),
                );
                DeleteOutcome::Deleted
            }
            Err(err) => {
                let failure = self.fail(Operation::Delete, &err);
                self.session.notify(Level::Error, "Delete Failed", &failure.message);
                DeleteOutcome::Failed(failure)
            }
        }
    }

    /// Drop the selection. Responses still in flight become no-ops, but
    /// outstanding saves keep blocking new saves for their owner.
    pub fn close(&mut self) {
        self.seq += 1;
        self.selected_seq = self.seq;
        self.selected = None;
        self.snapshots = None;
        self.exists = false;
        self.errors.clear();
        self.server_errors.clear();
        self.failure = None;
        self.load_seq = None;
        self.state = EditorState::Idle;
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Install `record` as both snapshots.
    fn adopt(&mut self, record: ConfigRecord, exists: bool) {
        self.snapshots = Some(SnapshotPair::new(record));
        self.exists = exists;
        self.server_errors.clear();
        self.revalidate();
        self.state = if exists {
            EditorState::Loaded
        } else {
            EditorState::Defaulted
        };
    }

    fn revalidate(&mut self) {
        self.errors = match &self.snapshots {
            Some(pair) => validate(pair.current(), self.kind.rules()),
            None => ValidationErrors::new(),
        };
    }

    fn settle_state(&mut self) {
        self.state = if self.is_dirty() {
            EditorState::Editing
        } else if self.exists {
            EditorState::Loaded
        } else {
            EditorState::Defaulted
        };
    }

    fn fail(&mut self, operation: Operation, err: &ApiError) -> Failure {
        let failure = Failure::from_api_error(self.kind, operation, err);
        warn!(
            kind = %self.kind,
            owner = ?self.selected,
            ?operation,
            status = failure.status,
            error = %err,
            "request failed"
        );
        if failure.kind == ErrorKind::Unauthorized {
            self.session.expire();
        }
        self.failure = Some(failure.clone());
        failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::settings::ClientSettings;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use tradedesk_core::ManualClock;

    fn editor(t: &Arc<ScriptedTransport>) -> ConfigEditor {
        let clock = Arc::new(ManualClock::new());
        let session = Session::init(&ClientSettings::default(), clock.clone());
        ConfigEditor::new(
            ResourceKind::Portfolio,
            ConfigApi::new(t.clone(), RetryPolicy::none()),
            session,
            clock,
            Duration::from_secs(300),
        )
    }

    #[test]
    fn starts_idle_with_nothing_to_save() {
        let t = Arc::new(ScriptedTransport::new());
        let mut e = editor(&t);
        assert_eq!(e.state(), EditorState::Idle);
        assert!(!e.can_save());
        assert_eq!(e.save(), SaveOutcome::Blocked(SaveBlock::NothingLoaded));
        assert_eq!(e.set_field("tradingMode", "live".into()), Err(EditError::NothingLoaded));
        assert_eq!(t.request_count(), 0);
    }

    #[test]
    fn edit_state_follows_dirtiness() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond_ok(json!({"portfolioId": "P1", "tradingMode": "paper", "signalCheckInterval": 300, "lookbackDays": 30}));
        let mut e = editor(&t);
        e.load_config("P1");
        assert_eq!(e.state(), EditorState::Loaded);

        assert_eq!(e.set_field("lookbackDays", ConfigValue::Number(60.0)), Ok(true));
        assert_eq!(e.state(), EditorState::Editing);
        assert_eq!(e.set_field("lookbackDays", ConfigValue::Number(30.0)), Ok(true));
        assert_eq!(e.state(), EditorState::Loaded);
    }

    #[test]
    fn cancel_restores_original_and_clears_errors() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond(404, None);
        let mut e = editor(&t);
        e.load_config("P1");

        e.set_field("tradingMode", "".into()).unwrap();
        assert!(!e.is_valid());
        assert!(e.cancel());
        assert!(e.is_valid());
        assert!(!e.is_dirty());
        assert_eq!(e.state(), EditorState::Defaulted);
    }

    #[test]
    fn close_drops_selection_and_late_load() {
        let t = Arc::new(ScriptedTransport::new());
        let mut e = editor(&t);
        let LoadStep::Pending(ticket) = e.begin_load("P1") else {
            panic!("expected a pending load");
        };
        e.close();
        let outcome = e.complete_load(ticket, Ok(ConfigRecord::new("P1")));
        assert_eq!(outcome, LoadOutcome::Discarded);
        assert_eq!(e.state(), EditorState::Idle);
        assert!(e.current().is_none());
    }

    #[test]
    fn outstanding_save_survives_close_and_reopen() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond(404, None).respond(404, None);
        let mut e = editor(&t);
        e.load_config("P1");
        e.set_field("lookbackDays", ConfigValue::Number(45.0)).unwrap();
        let ticket = e.begin_save().unwrap();

        e.close();
        assert!(!e.is_saving());
        e.load_config("P1");
        assert!(e.is_saving());
        assert_eq!(e.begin_save(), Err(SaveBlock::AlreadySaving));

        // Reselection replaced the snapshots, so the result is not applied.
        let stored = ticket.record().clone();
        assert_eq!(e.complete_save(ticket, Ok(stored)), SaveOutcome::Discarded);
        assert!(!e.is_saving());
    }
}
