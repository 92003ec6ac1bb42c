//! App derivation and per-app figures computed from a status document.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::{StatusDoc, WorkspaceEntry};

/// Base of the default external port range.
pub const EXTERNAL_PORT_BASE: u16 = 18000;

/// Effective app names for a workspace.
///
/// A non-empty authoritative list is returned verbatim. Otherwise names are
/// derived from the raw records: every service name, plus every pod name with
/// its trailing `-<suffix>` segment removed. Derived names are deduplicated and
/// keep first-seen order (services before pods).
pub fn derive_apps(entry: Option<&WorkspaceEntry>, status: Option<&StatusDoc>) -> Vec<String> {
    if let Some(entry) = entry {
        if !entry.apps.is_empty() {
            return entry.apps.iter().map(|a| a.name.clone()).collect();
        }
    }
    let Some(doc) = status else { return Vec::new() };

    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut out = Vec::new();
    let mut push = |name: &str| {
        if !name.is_empty() && seen.insert(name.to_string()) {
            out.push(name.to_string());
        }
    };
    for svc in &doc.services {
        push(&svc.name);
    }
    for pod in &doc.pods {
        if let Some((app, _suffix)) = pod.name.rsplit_once('-') {
            push(app);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PodCounts {
    pub running: usize,
    pub total: usize,
}

/// Pods belonging to `app` are those named `<app>-...`.
pub fn pod_counts(status: &StatusDoc, app: &str) -> PodCounts {
    let prefix = format!("{}-", app);
    let mut counts = PodCounts::default();
    for pod in status.pods.iter().filter(|p| p.name.starts_with(&prefix)) {
        counts.total += 1;
        if pod.phase == "Running" {
            counts.running += 1;
        }
    }
    counts
}

/// Node port of the service named exactly `app`; zero counts as unallocated.
pub fn service_node_port(status: &StatusDoc, app: &str) -> Option<u16> {
    status
        .services
        .iter()
        .find(|s| s.name == app)
        .and_then(|s| s.node_port)
        .filter(|p| *p != 0)
}

/// Default external port for a node port: `18000 + (node_port mod 1000)`.
pub fn default_external_port(node_port: Option<u16>) -> Option<u16> {
    match node_port {
        Some(np) if np != 0 => Some(EXTERNAL_PORT_BASE + np % 1000),
        _ => None,
    }
}
