use metrics::counter;
use serde_json::json;
use tekdash_api::{paths, Method, Request};
use tekdash_core::{default_external_port, derive_apps, service_node_port};
use tekdash_store::AppKey;
use tracing::{debug, info, warn};

use crate::Session;

impl Session {
    /// Operator claim of `port` for `(workspace, app)`.
    ///
    /// Refused locally (logged as 409) when another pair owns the port. On
    /// acceptance the mapping is persisted and the full map reloaded before
    /// returning `true`.
    pub async fn set_external_port(&self, workspace: &str, app: &str, port: u16) -> bool {
        self.claim_port(workspace, app, port, false).await
    }

    pub(crate) async fn claim_port(&self, workspace: &str, app: &str, port: u16, quiet: bool) -> bool {
        if port == 0 {
            return false;
        }
        let _serial = self.inner.claim_lock.lock().await;
        if let Err(conflict) = self.inner.external.load().check_claim(workspace, app, port) {
            counter!("sync_port_conflicts_total", 1u64);
            if quiet {
                debug!(workspace = %workspace, app = %app, %conflict, "sync: default port claim refused");
            } else {
                warn!(workspace = %workspace, app = %app, %conflict, "sync: port claim refused");
                self.log(Method::Post, paths::EXTERNAL_MAP, 409, "Port already in use");
            }
            return false;
        }
        let body = json!({ "workspace": workspace, "app": app, "external_port": port });
        let accepted = matches!(
            self.request(Request::post_json(paths::EXTERNAL_MAP, body), quiet).await,
            Ok(r) if r.is_ok()
        );
        if !accepted {
            return false;
        }
        info!(workspace = %workspace, app = %app, port, "sync: external port claimed");
        self.load_external_map().await;
        true
    }

    /// For each app of the focused workspace with a known node port and no
    /// mapping yet, claim `18000 + nodePort mod 1000` in the background.
    /// Each key is attempted once per session; a colliding default is left
    /// unmapped for the operator.
    pub(crate) fn reconcile_external_ports(&self, workspace: &str) {
        let candidates: Vec<(String, u16)> = self.with_state(|st| {
            let Some(snap) = st.statuses.get(workspace) else { return Vec::new() };
            derive_apps(st.workspace(workspace), Some(&snap.doc))
                .into_iter()
                .filter_map(|app| default_external_port(service_node_port(&snap.doc, &app)).map(|p| (app, p)))
                .collect()
        });
        let map = self.inner.external.load_full();
        for (app, port) in candidates {
            if map.port_for(workspace, &app).is_some() {
                continue;
            }
            self.spawn_default_claim(workspace, &app, port);
        }
    }

    fn spawn_default_claim(&self, workspace: &str, app: &str, port: u16) {
        let key = AppKey::new(workspace, app);
        if self.inner.claim_flights.is_in_flight(&key) {
            return;
        }
        let first = self.with_state(|st| st.auto_claimed.insert(key.clone()));
        if !first {
            return;
        }
        let Some(flight) = self.inner.claim_flights.begin(key) else { return };
        let session = self.clone();
        let (ws, app) = (workspace.to_string(), app.to_string());
        debug!(workspace = %ws, app = %app, port, "sync: default port claim start");
        tokio::spawn(async move {
            let ok = session.claim_port(&ws, &app, port, true).await;
            drop(flight);
            session.bump();
            debug!(workspace = %ws, app = %app, port, ok, "sync: default port claim done");
        });
    }
}
