//! Bounded, time-windowed error store
//!
//! The production store serializes every event into one cookie as a JSON
//! array. Reads prune expired events from the persisted value, so the store
//! cleans itself without a separate collection pass.

use std::sync::{Arc, Mutex};

use keywarden_config::StoreConfig;

use crate::clock::Clock;
use crate::event::{ErrorEvent, ErrorInput, generate_id};
use crate::jar::{Cookie, CookieJar, CookieScope, JarError};

/// Size and age bounds shared by every store implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Most events kept, oldest evicted first
    pub max_entries: usize,
    /// Events older than this are never surfaced
    pub retention_ms: i64,
    /// Lifetime of the persisted cookie
    pub cookie_ttl_ms: i64,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_entries: 10,
            retention_ms: 5 * 60 * 1000,
            cookie_ttl_ms: 24 * 60 * 60 * 1000,
        }
    }
}

impl From<&StoreConfig> for StoreLimits {
    fn from(config: &StoreConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            retention_ms: i64::try_from(config.retention.as_millis()).unwrap_or(i64::MAX),
            cookie_ttl_ms: i64::try_from(config.cookie_ttl.as_millis()).unwrap_or(i64::MAX),
        }
    }
}

/// Record of recent client errors
///
/// Every operation is best-effort: persistence failures are logged and never
/// surface to the caller.
pub trait ErrorStore: Send + Sync {
    /// Assign id and timestamp, append, and evict beyond the size bound
    fn record(&self, input: ErrorInput) -> ErrorEvent;

    /// Events inside the retention window, oldest first
    ///
    /// Pruned events are physically removed from the backing storage.
    fn list(&self) -> Vec<ErrorEvent>;

    /// Remove one event; unknown ids are ignored
    fn dismiss(&self, id: &str);

    /// Remove every event
    fn dismiss_all(&self);
}

/// Build an event whose id does not collide with any stored one
fn new_event(events: &[ErrorEvent], input: ErrorInput, now_ms: i64) -> ErrorEvent {
    let mut event = input.into_event(now_ms);
    while events.iter().any(|e| e.id == event.id) {
        event.id = generate_id(now_ms);
    }
    event
}

/// Append keeping only the newest `max` entries
fn push_bounded(events: &mut Vec<ErrorEvent>, event: ErrorEvent, max: usize) {
    events.push(event);
    if events.len() > max {
        let excess = events.len() - max;
        events.drain(..excess);
    }
}

/// Split off expired events, reporting whether anything was dropped
fn retain_live(events: &mut Vec<ErrorEvent>, now_ms: i64, retention_ms: i64) -> bool {
    let before = events.len();
    events.retain(|e| e.is_live(now_ms, retention_ms));
    events.len() != before
}

/// Outcome of reading the persisted events
enum Loaded {
    Events(Vec<ErrorEvent>),
    /// Content is corrupt and gets reset
    Malformed,
    /// The jar could not be read; its content is left alone
    Unavailable,
}

/// Store persisted in a single cookie
pub struct CookieErrorStore {
    jar: Arc<dyn CookieJar>,
    clock: Arc<dyn Clock>,
    scope: CookieScope,
    limits: StoreLimits,
}

impl CookieErrorStore {
    pub fn new(jar: Arc<dyn CookieJar>, clock: Arc<dyn Clock>, scope: CookieScope, limits: StoreLimits) -> Self {
        Self {
            jar,
            clock,
            scope,
            limits,
        }
    }

    /// Build from configuration with the given jar and clock
    pub fn from_config(config: &StoreConfig, jar: Arc<dyn CookieJar>, clock: Arc<dyn Clock>) -> Self {
        let scope = CookieScope::new(&config.cookie_name, &config.domain, &config.path);
        Self::new(jar, clock, scope, StoreLimits::from(config))
    }

    pub const fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Read and decode the cookie
    fn load(&self, now_ms: i64) -> Loaded {
        let raw = match self.jar.get(&self.scope, now_ms) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Loaded::Events(Vec::new()),
            Err(JarError::Format(e)) => {
                tracing::warn!(cookie = %self.scope.name, error = %e, "cookie jar is malformed");
                return Loaded::Malformed;
            }
            Err(e) => {
                tracing::warn!(cookie = %self.scope.name, error = %e, "failed to read error cookie");
                return Loaded::Unavailable;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(events) => Loaded::Events(events),
            Err(e) => {
                tracing::warn!(cookie = %self.scope.name, error = %e, "discarding malformed error cookie");
                Loaded::Malformed
            }
        }
    }

    fn save(&self, events: &[ErrorEvent], now_ms: i64) {
        if events.is_empty() {
            self.clear();
            return;
        }

        let value = match serde_json::to_string(events) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize error events");
                return;
            }
        };

        let cookie = Cookie {
            scope: self.scope.clone(),
            value,
            expires_at: now_ms.saturating_add(self.limits.cookie_ttl_ms),
        };

        if let Err(e) = self.jar.set(cookie) {
            tracing::warn!(cookie = %self.scope.name, error = %e, "failed to write error cookie");
        }
    }

    fn clear(&self) {
        if let Err(e) = self.jar.remove(&self.scope) {
            tracing::warn!(cookie = %self.scope.name, error = %e, "failed to remove error cookie");
        }
    }
}

impl ErrorStore for CookieErrorStore {
    fn record(&self, input: ErrorInput) -> ErrorEvent {
        let now = self.clock.now_ms();
        let mut events = match self.load(now) {
            Loaded::Events(events) => events,
            Loaded::Malformed => Vec::new(),
            Loaded::Unavailable => {
                let event = input.into_event(now);
                tracing::warn!(error_id = %event.id, "error cookie unreadable, event not persisted");
                return event;
            }
        };

        let event = new_event(&events, input, now);
        push_bounded(&mut events, event.clone(), self.limits.max_entries);
        self.save(&events, now);

        tracing::debug!(error_id = %event.id, code = %event.code, status = ?event.status, "recorded error");
        event
    }

    fn list(&self) -> Vec<ErrorEvent> {
        let now = self.clock.now_ms();

        let mut events = match self.load(now) {
            Loaded::Events(events) => events,
            Loaded::Malformed => {
                self.clear();
                return Vec::new();
            }
            Loaded::Unavailable => return Vec::new(),
        };

        if retain_live(&mut events, now, self.limits.retention_ms) {
            self.save(&events, now);
        }

        events
    }

    fn dismiss(&self, id: &str) {
        let now = self.clock.now_ms();
        let mut events = match self.load(now) {
            Loaded::Events(events) => events,
            Loaded::Malformed => {
                self.clear();
                return;
            }
            Loaded::Unavailable => return,
        };

        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() != before {
            self.save(&events, now);
        }
    }

    fn dismiss_all(&self) {
        self.clear();
    }
}

/// Store held in process memory, with the same bounds as the cookie store
pub struct MemoryErrorStore {
    events: Mutex<Vec<ErrorEvent>>,
    clock: Arc<dyn Clock>,
    limits: StoreLimits,
}

impl MemoryErrorStore {
    pub fn new(clock: Arc<dyn Clock>, limits: StoreLimits) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            clock,
            limits,
        }
    }

    /// Everything currently held, including expired events not yet pruned
    pub fn raw(&self) -> Vec<ErrorEvent> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ErrorEvent>> {
        self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ErrorStore for MemoryErrorStore {
    fn record(&self, input: ErrorInput) -> ErrorEvent {
        let now = self.clock.now_ms();
        let mut events = self.lock();

        let event = new_event(&events, input, now);
        push_bounded(&mut events, event.clone(), self.limits.max_entries);
        event
    }

    fn list(&self) -> Vec<ErrorEvent> {
        let now = self.clock.now_ms();
        let mut events = self.lock();
        retain_live(&mut events, now, self.limits.retention_ms);
        events.clone()
    }

    fn dismiss(&self, id: &str) {
        self.lock().retain(|e| e.id != id);
    }

    fn dismiss_all(&self) {
        self.lock().clear();
    }
}
