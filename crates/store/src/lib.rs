//! Tekdash store: the session-scoped caches the sync session owns.
//!
//! Nothing here is persisted; every structure lives for one session and is
//! cleared on dispose. All types are plain data guarded by the caller.

#![forbid(unsafe_code)]

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tekdash_core::{ActivityEntry, StatusDoc};
use tracing::debug;

mod external;
mod flight;

pub use external::{ExternalMap, PortConflict};
pub use flight::{Flight, SingleFlight};

/// Default number of activity entries kept.
pub const ACTIVITY_CAP: usize = 20;

/// Composite key for per-app state: `(workspace, app)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppKey {
    pub workspace: String,
    pub app: String,
}

impl AppKey {
    pub fn new(workspace: impl Into<String>, app: impl Into<String>) -> Self {
        Self { workspace: workspace.into(), app: app.into() }
    }
}

impl std::fmt::Display for AppKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.workspace, self.app)
    }
}

/// Bounded, most-recent-first log of control actions.
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    cap: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_CAP)
    }
}

impl ActivityLog {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { entries: VecDeque::with_capacity(cap), cap }
    }

    pub fn record(&mut self, method: &str, endpoint: &str, status: u16, message: impl Into<String>) {
        self.push(ActivityEntry { method: method.to_string(), endpoint: endpoint.to_string(), status, message: message.into(), at: Utc::now() });
    }

    pub fn push(&mut self, entry: ActivityEntry) {
        self.entries.push_front(entry);
        // Oldest entries decay off the back.
        self.entries.truncate(self.cap);
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn cap(&self) -> usize { self.cap }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Last fetched status of one workspace. Failures are cached too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub workspace: String,
    /// True only for a 200 response.
    pub ok: bool,
    /// HTTP status; `None` after a transport failure.
    pub status: Option<u16>,
    /// Raw body as received (JSON or text).
    pub raw: serde_json::Value,
    pub doc: StatusDoc,
    pub error: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn from_response(workspace: &str, status: u16, raw: serde_json::Value) -> Self {
        let doc = StatusDoc::from_value(&raw);
        Self { workspace: workspace.to_string(), ok: status == 200, status: Some(status), raw, doc, error: None, fetched_at: Utc::now() }
    }

    pub fn from_transport_error(workspace: &str, error: impl Into<String>) -> Self {
        Self {
            workspace: workspace.to_string(),
            ok: false,
            status: None,
            raw: serde_json::Value::Null,
            doc: StatusDoc::default(),
            error: Some(error.into()),
            fetched_at: Utc::now(),
        }
    }
}

/// One snapshot per workspace; writes always overwrite.
#[derive(Default)]
pub struct StatusCache {
    map: FxHashMap<String, StatusSnapshot>,
}

impl StatusCache {
    pub fn put(&mut self, snap: StatusSnapshot) {
        debug!(workspace = %snap.workspace, ok = snap.ok, status = ?snap.status, "store: status snapshot");
        self.map.insert(snap.workspace.clone(), snap);
    }

    pub fn get(&self, workspace: &str) -> Option<&StatusSnapshot> {
        self.map.get(workspace)
    }

    pub fn remove(&mut self, workspace: &str) -> Option<StatusSnapshot> {
        self.map.remove(workspace)
    }

    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// Resolved endpoints per `(workspace, app)`. Entries never expire.
#[derive(Default)]
pub struct EndpointCache {
    map: FxHashMap<AppKey, String>,
}

impl EndpointCache {
    pub fn get(&self, key: &AppKey) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &AppKey) -> bool {
        self.map.contains_key(key)
    }

    /// Empty endpoints are ignored; returns whether the cache changed.
    pub fn insert(&mut self, key: AppKey, endpoint: &str) -> bool {
        if endpoint.is_empty() {
            return false;
        }
        self.map.insert(key, endpoint.to_string()).as_deref() != Some(endpoint)
    }

    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}
