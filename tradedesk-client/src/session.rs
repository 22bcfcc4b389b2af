//! Session-scoped state: bearer token and user notifications.
//!
//! A [`Session`] is created once with [`Session::init`], shared behind an
//! `Arc`, and torn down with [`Session::dispose`]. Nothing here is global.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use tradedesk_core::Clock;

use crate::settings::{ClientSettings, NotificationSettings};

/// Bearer token shared between the transport and the editors.
#[derive(Debug, Default)]
pub struct TokenStore {
    token: RwLock<Option<String>>,
}

impl TokenStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    pub fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_present(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: u64,
    pub level: Level,
    pub summary: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    #[serde(skip)]
    recorded_at: Instant,
}

/// In-memory notification list with retention and size limits.
pub struct NotificationCenter {
    items: Mutex<Vec<Notification>>,
    next_id: AtomicU64,
    limits: NotificationSettings,
    clock: Arc<dyn Clock>,
}

impl NotificationCenter {
    pub fn new(limits: NotificationSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            limits,
            clock,
        }
    }

    /// Add a notification and run cleanup. Returns its id.
    pub fn push(&self, level: Level, summary: impl Into<String>, detail: impl Into<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let notification = Notification {
            id,
            level,
            summary: summary.into(),
            detail: detail.into(),
            created_at: Utc::now(),
            read: false,
            recorded_at: self.clock.now(),
        };
        debug!(id, ?level, summary = %notification.summary, "notification");
        self.lock().push(notification);
        self.cleanup();
        id
    }

    /// Newest first.
    pub fn list(&self) -> Vec<Notification> {
        let mut items = self.lock().clone();
        items.reverse();
        items
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().iter().filter(|n| !n.read).count()
    }

    pub fn mark_read(&self, id: u64) -> bool {
        match self.lock().iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&self) {
        for n in self.lock().iter_mut() {
            n.read = true;
        }
    }

    pub fn remove(&self, id: u64) -> bool {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|n| n.id != id);
        items.len() != before
    }

    /// Drop every read notification. Returns how many were removed.
    pub fn clear_read(&self) -> usize {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|n| !n.read);
        before - items.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drop notifications older than the retention period, then the oldest
    /// ones beyond the size limit. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let retention: Duration = self.limits.retention();
        let mut items = self.lock();
        let before = items.len();

        items.retain(|n| now.saturating_duration_since(n.recorded_at) < retention);
        // Items are kept in insertion order, so the oldest are at the front.
        if items.len() > self.limits.max_count {
            let excess = items.len() - self.limits.max_count;
            items.drain(..excess);
        }
        before - items.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Injectable replacement for process-wide auth and notification state.
pub struct Session {
    tokens: Arc<TokenStore>,
    notifications: NotificationCenter,
    active: AtomicBool,
}

impl Session {
    pub fn init(settings: &ClientSettings, clock: Arc<dyn Clock>) -> Arc<Self> {
        info!(authenticated = settings.token.is_some(), "session started");
        Arc::new(Self {
            tokens: Arc::new(TokenStore::new(settings.token.clone())),
            notifications: NotificationCenter::new(settings.notifications.clone(), clock),
            active: AtomicBool::new(true),
        })
    }

    /// Clear the token and notifications. Later notifications are dropped.
    pub fn dispose(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.tokens.clear();
            self.notifications.clear();
            info!("session disposed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Drop the bearer token after the backend rejected it.
    pub fn expire(&self) {
        if self.tokens.is_present() {
            info!("session token cleared after 401");
        }
        self.tokens.clear();
    }

    /// Push a notification while the session is active.
    pub fn notify(&self, level: Level, summary: &str, detail: &str) -> Option<u64> {
        if !self.is_active() {
            return None;
        }
        Some(self.notifications.push(level, summary, detail))
    }
}
