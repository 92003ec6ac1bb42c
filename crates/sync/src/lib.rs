//! Tekdash sync session.
//!
//! A [`Session`] owns every cache of one dashboard session (activity log,
//! status snapshots, resolved endpoints, the external port map, host info)
//! and runs the operations that keep them fresh. Presentation code only reads
//! [`Session::view`] and re-renders when the revision channel ticks.
//!
//! Background work (endpoint prefetch, default port claims, polling) is
//! spawned on the ambient tokio runtime, so sessions must be driven from
//! inside one.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use metrics::counter;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tekdash_api::{ApiResponse, ApiResult, Body, Method, Request, RunnerApi};
use tekdash_core::{HostInfo, WorkspaceEntry};
use tekdash_store::{ActivityLog, AppKey, EndpointCache, ExternalMap, SingleFlight, StatusCache};
use tokio::sync::watch;
use tracing::{debug, info, warn};

mod actions;
mod config;
mod poll;
mod ports;
mod refresh;
mod view;

pub use config::SessionConfig;
pub use view::{AppView, DashboardView, StatusLabel, WorkspaceCard, WorkspaceDetail};

/// Health badge state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Health {
    #[default]
    Unknown,
    Status(u16),
    Error(String),
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Health::Status(200))
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Health::Unknown => f.write_str("HEALTH: ?"),
            Health::Status(code) => write!(f, "HEALTH: {}", code),
            Health::Error(_) => f.write_str("HEALTH: ERR"),
        }
    }
}

/// Why the last workspace listing failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListError {
    Status(u16),
    Transport(String),
}

impl std::fmt::Display for ListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListError::Status(code) => write!(f, "workspaces unavailable (status {})", code),
            ListError::Transport(e) => write!(f, "workspaces unavailable ({})", e),
        }
    }
}

#[derive(Default)]
pub(crate) struct State {
    pub(crate) focus: Option<String>,
    pub(crate) selected_app: Option<String>,
    pub(crate) workspaces: Vec<WorkspaceEntry>,
    pub(crate) list_error: Option<ListError>,
    pub(crate) statuses: StatusCache,
    pub(crate) endpoints: EndpointCache,
    pub(crate) activity: ActivityLog,
    pub(crate) health: Health,
    // keys whose default external port was already attempted
    pub(crate) auto_claimed: FxHashSet<AppKey>,
}

impl State {
    pub(crate) fn workspace(&self, id: &str) -> Option<&WorkspaceEntry> {
        self.workspaces.iter().find(|w| w.workspace == id)
    }
}

pub(crate) struct Inner {
    pub(crate) api: Arc<dyn RunnerApi>,
    pub(crate) cfg: SessionConfig,
    pub(crate) state: Mutex<State>,
    pub(crate) endpoint_flights: SingleFlight<AppKey>,
    pub(crate) claim_flights: SingleFlight<AppKey>,
    // serializes check -> persist -> reload for external port claims
    pub(crate) claim_lock: tokio::sync::Mutex<()>,
    pub(crate) external: ArcSwap<ExternalMap>,
    pub(crate) host: ArcSwap<HostInfo>,
    pub(crate) poll: Mutex<Option<poll::PollTask>>,
    pub(crate) rev: watch::Sender<u64>,
}

/// One operator session. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl Session {
    pub fn create(api: Arc<dyn RunnerApi>, cfg: SessionConfig) -> Self {
        info!(poll_ms = %cfg.poll_interval.as_millis(), activity_cap = cfg.activity_cap, "sync: session created");
        let (rev, _) = watch::channel(0u64);
        let state = State { activity: ActivityLog::with_capacity(cfg.activity_cap), ..State::default() };
        Self {
            inner: Arc::new(Inner {
                api,
                cfg,
                state: Mutex::new(state),
                endpoint_flights: SingleFlight::new(),
                claim_flights: SingleFlight::new(),
                claim_lock: tokio::sync::Mutex::new(()),
                external: ArcSwap::from_pointee(ExternalMap::default()),
                host: ArcSwap::from_pointee(HostInfo::default()),
                poll: Mutex::new(None),
                rev,
            }),
        }
    }

    /// Stop the poll timer and drop every cache. The session stays usable
    /// and behaves like a freshly created one.
    pub fn dispose(&self) {
        self.stop_poll();
        {
            let mut st = lock(&self.inner.state);
            let cap = st.activity.cap();
            *st = State { activity: ActivityLog::with_capacity(cap), ..State::default() };
        }
        self.inner.endpoint_flights.clear();
        self.inner.claim_flights.clear();
        self.inner.external.store(Arc::new(ExternalMap::default()));
        self.inner.host.store(Arc::new(HostInfo::default()));
        info!("sync: session disposed");
        self.bump();
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.cfg
    }

    /// Revision counter, bumped on every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.rev.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.inner.rev.borrow()
    }

    pub(crate) fn bump(&self) {
        self.inner.rev.send_modify(|r| *r = r.wrapping_add(1));
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut st = lock(&self.inner.state);
        f(&mut st)
    }

    /// Append to the activity log.
    pub(crate) fn log(&self, method: Method, endpoint: &str, status: u16, message: impl Into<String>) {
        self.with_state(|st| st.activity.record(method.as_str(), endpoint, status, message));
        self.bump();
    }

    /// Issue one request. Unless `quiet`, the outcome lands in the activity
    /// log; transport failures are logged with status `0`.
    pub(crate) async fn request(&self, req: Request, quiet: bool) -> ApiResult<ApiResponse> {
        let method = req.method;
        let path = req.path.clone();
        counter!("sync_requests_total", 1u64);
        let res = self.inner.api.call(req).await;
        match &res {
            Ok(r) => {
                debug!(method = %method, path = %path, status = r.status, quiet, "sync: request done");
                if !quiet {
                    self.log(method, &path, r.status, r.message());
                }
            }
            Err(e) => {
                warn!(method = %method, path = %path, error = %e, quiet, "sync: request failed");
                if !quiet {
                    self.log(method, &path, 0, e.to_string());
                }
            }
        }
        res
    }

    // ---- read accessors ----

    pub fn focus(&self) -> Option<String> {
        lock(&self.inner.state).focus.clone()
    }

    pub fn selected_app(&self) -> Option<String> {
        lock(&self.inner.state).selected_app.clone()
    }

    pub fn workspaces(&self) -> Vec<WorkspaceEntry> {
        lock(&self.inner.state).workspaces.clone()
    }

    pub fn list_error(&self) -> Option<ListError> {
        lock(&self.inner.state).list_error.clone()
    }

    pub fn status(&self, workspace: &str) -> Option<tekdash_store::StatusSnapshot> {
        lock(&self.inner.state).statuses.get(workspace).cloned()
    }

    pub fn endpoint(&self, workspace: &str, app: &str) -> Option<String> {
        lock(&self.inner.state).endpoints.get(&AppKey::new(workspace, app)).map(str::to_string)
    }

    pub fn activity(&self) -> Vec<tekdash_core::ActivityEntry> {
        lock(&self.inner.state).activity.snapshot()
    }

    pub fn health(&self) -> Health {
        lock(&self.inner.state).health.clone()
    }

    pub fn host_info(&self) -> HostInfo {
        (**self.inner.host.load()).clone()
    }

    pub fn external_map(&self) -> Arc<ExternalMap> {
        self.inner.external.load_full()
    }

    pub fn endpoint_in_flight(&self, workspace: &str, app: &str) -> bool {
        self.inner.endpoint_flights.is_in_flight(&AppKey::new(workspace, app))
    }

    pub fn claim_in_flight(&self, workspace: &str, app: &str) -> bool {
        self.inner.claim_flights.is_in_flight(&AppKey::new(workspace, app))
    }
}

/// Body as a JSON value; text bodies become a JSON string.
pub(crate) fn body_value(body: &Body) -> serde_json::Value {
    match body {
        Body::Json(v) => v.clone(),
        Body::Text(s) => serde_json::Value::String(s.clone()),
    }
}
