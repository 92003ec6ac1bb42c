use std::sync::Arc;

use metrics::counter;
use tekdash_api::{paths, Method, Request};
use tekdash_core::{derive_apps, is_addressable, parse_external_map, parse_workspace_list, HostInfo};
use tekdash_store::{AppKey, ExternalMap, StatusSnapshot};
use tracing::{debug, info, warn};

use crate::{body_value, Health, ListError, Session};

impl Session {
    /// Startup sequence: health probe, host info, external map, workspace list.
    pub async fn bootstrap(&self) {
        info!("sync: bootstrap start");
        self.probe_health().await;
        self.load_host_info().await;
        self.load_external_map().await;
        self.list_workspaces().await;
        info!(workspaces = self.workspaces().len(), "sync: bootstrap done");
    }

    /// Fetch and cache the status of `workspace`.
    ///
    /// Placeholder ids (not `ws-*`) are skipped without a request or log entry.
    /// Non-200 answers and transport failures are cached as `ok = false`.
    pub async fn refresh_status(&self, workspace: &str, quiet: bool) -> Option<StatusSnapshot> {
        if !is_addressable(workspace) {
            debug!(workspace = %workspace, "sync: status skipped for placeholder workspace");
            return None;
        }
        let res = self.request(Request::get(paths::workspace_status(workspace)), quiet).await;
        let snap = match res {
            Ok(r) => StatusSnapshot::from_response(workspace, r.status, body_value(&r.body)),
            Err(e) => StatusSnapshot::from_transport_error(workspace, e.to_string()),
        };
        let focused = self.with_state(|st| {
            st.statuses.put(snap.clone());
            st.focus.as_deref() == Some(workspace)
        });
        self.bump();
        if focused {
            self.after_status(workspace);
        }
        Some(snap)
    }

    /// Follow-up work once the focused workspace has fresh data: resolve
    /// endpoints and claim default external ports for every known app.
    pub(crate) fn after_status(&self, workspace: &str) {
        self.prefetch_endpoints(workspace);
        self.reconcile_external_ports(workspace);
    }

    /// Fetch the workspace collection. Failures are always logged and leave
    /// an error for the list view; on success the focused workspace is refreshed quietly.
    pub async fn list_workspaces(&self) {
        let res = self.request(Request::get(paths::WORKSPACES), true).await;
        let list = match res {
            Ok(r) if r.is_ok() => r.body.json().map(parse_workspace_list).unwrap_or_default(),
            Ok(r) => {
                warn!(status = r.status, "sync: workspace list failed");
                self.with_state(|st| st.list_error = Some(ListError::Status(r.status)));
                self.log(Method::Get, paths::WORKSPACES, r.status, r.message());
                return;
            }
            Err(e) => {
                self.with_state(|st| st.list_error = Some(ListError::Transport(e.to_string())));
                self.log(Method::Get, paths::WORKSPACES, 0, e.to_string());
                return;
            }
        };
        info!(count = list.len(), "sync: workspaces listed");
        let empty = list.is_empty();
        let focus = self.with_state(|st| {
            st.workspaces = list;
            st.list_error = None;
            st.focus.clone()
        });
        self.bump();
        if empty {
            return;
        }
        if let Some(ws) = focus {
            self.refresh_status(&ws, true).await;
        }
    }

    /// Unlogged health probe used at startup.
    pub async fn probe_health(&self) -> Health {
        self.health_inner(true).await
    }

    /// Operator health check; always logged.
    pub async fn check_health(&self) -> Health {
        self.health_inner(false).await
    }

    async fn health_inner(&self, quiet: bool) -> Health {
        let health = match self.request(Request::get(paths::HEALTHZ), quiet).await {
            Ok(r) => Health::Status(r.status),
            Err(e) => Health::Error(e.to_string()),
        };
        self.with_state(|st| st.health = health.clone());
        self.bump();
        health
    }

    /// Read host info once per session; later calls keep the first value.
    pub async fn load_host_info(&self) -> HostInfo {
        if self.inner.host.load().is_known() {
            return self.host_info();
        }
        if let Ok(r) = self.request(Request::get(paths::HOSTINFO), true).await {
            if let Some(ip) = r.is_ok().then(|| r.str_field("host_ip")).flatten() {
                info!(host_ip = %ip, "sync: host info loaded");
                self.inner.host.store(Arc::new(HostInfo { host_ip: ip.to_string() }));
                self.bump();
            }
        }
        self.host_info()
    }

    /// Authoritative reload of the external port map. The local copy is
    /// replaced only by a 200 array answer.
    pub async fn load_external_map(&self) -> bool {
        let Ok(r) = self.request(Request::get(paths::EXTERNAL_MAP), true).await else { return false };
        if !r.is_ok() {
            return false;
        }
        let Some(entries) = r.body.json().and_then(parse_external_map) else { return false };
        debug!(entries = entries.len(), "sync: external map loaded");
        self.inner.external.store(Arc::new(ExternalMap::new(entries)));
        self.bump();
        true
    }

    /// Resolve the endpoint of `(workspace, app)` quietly.
    ///
    /// Resolved keys are never re-requested. While a resolution is in flight
    /// further calls for the same key return immediately.
    pub async fn ensure_endpoint(&self, workspace: &str, app: &str) {
        let key = AppKey::new(workspace, app);
        if self.with_state(|st| st.endpoints.contains(&key)) {
            return;
        }
        let Some(flight) = self.inner.endpoint_flights.begin(key.clone()) else {
            counter!("sync_endpoint_dedup_total", 1u64);
            return;
        };
        self.resolve_endpoint(workspace, app, key).await;
        drop(flight);
        // release is observable to revision subscribers
        self.bump();
    }

    async fn resolve_endpoint(&self, workspace: &str, app: &str, key: AppKey) {
        // another flight may have completed between the cache check and begin
        if self.with_state(|st| st.endpoints.contains(&key)) {
            return;
        }
        let Ok(r) = self.request(Request::get(paths::endpoint(workspace, app)), true).await else { return };
        if !r.is_ok() {
            return;
        }
        if let Some(ep) = r.str_field("endpoint") {
            debug!(key = %key, endpoint = %ep, "sync: endpoint resolved");
            self.with_state(|st| st.endpoints.insert(key, ep));
        }
    }

    /// Spawn endpoint resolution for every app currently known for `workspace`.
    pub fn prefetch_endpoints(&self, workspace: &str) {
        let apps = self.with_state(|st| {
            let doc = st.statuses.get(workspace).map(|s| &s.doc);
            derive_apps(st.workspace(workspace), doc)
        });
        for app in apps {
            let session = self.clone();
            let ws = workspace.to_string();
            tokio::spawn(async move { session.ensure_endpoint(&ws, &app).await });
        }
    }
}
