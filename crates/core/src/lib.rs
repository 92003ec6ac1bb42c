//! Tekdash core types: workspaces, raw status documents and the pure
//! derivations the dashboard computes from them.

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod derive;
pub mod job;

pub use derive::{default_external_port, derive_apps, pod_counts, service_node_port, PodCounts};
pub use job::{DeploySpec, ImageSpec, JobSpec, JobSource};

/// Workspaces backed by real infrastructure carry this prefix.
pub const WORKSPACE_PREFIX: &str = "ws-";

/// True when `id` names a remote-addressable workspace (`ws-*`).
/// Other ids are placeholders and are never queried.
pub fn is_addressable(id: &str) -> bool {
    id.starts_with(WORKSPACE_PREFIX)
}

/// One deployable unit inside a workspace.
///
/// The backend echoes either `{ "app": .. }` or `{ "name": .. }`; a missing
/// name falls back to `"app"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAppRef")]
pub struct AppRef {
    pub name: String,
}

#[derive(Deserialize)]
struct RawAppRef {
    #[serde(default)]
    app: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl From<RawAppRef> for AppRef {
    fn from(r: RawAppRef) -> Self {
        let name = r
            .app
            .filter(|s| !s.is_empty())
            .or(r.name.filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "app".to_string());
        Self { name }
    }
}

impl AppRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A workspace as reported by the `/workspaces` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkspaceEntry {
    #[serde(default)]
    pub workspace: String,
    /// Authoritative app list; empty when the backend did not echo one.
    #[serde(default, deserialize_with = "lenient_vec")]
    pub apps: Vec<AppRef>,
}

impl WorkspaceEntry {
    pub fn new(workspace: impl Into<String>, apps: &[&str]) -> Self {
        Self { workspace: workspace.into(), apps: apps.iter().map(|a| AppRef::new(*a)).collect() }
    }

    /// Label used by list views; entries without an id render as `(unknown)`.
    pub fn label(&self) -> &str {
        if self.workspace.is_empty() { "(unknown)" } else { &self.workspace }
    }
}

/// Decode the `/workspaces` body, which is either a bare array or `{ "items": [..] }`.
/// Anything else yields an empty list.
pub fn parse_workspace_list(body: &serde_json::Value) -> Vec<WorkspaceEntry> {
    let items = match body {
        serde_json::Value::Array(items) => items.as_slice(),
        serde_json::Value::Object(map) => match map.get("items") {
            Some(serde_json::Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    items
        .iter()
        .filter_map(|v| serde_json::from_value::<WorkspaceEntry>(v.clone()).ok())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PodRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phase: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServiceRecord {
    #[serde(default)]
    pub name: String,
    /// Unparsable or out-of-range values decode as `None`; the row is kept.
    #[serde(rename = "nodePort", default, deserialize_with = "lenient_port", skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u16>,
}

/// Raw `/workspace/status` document: pods and services of one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatusDoc {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub pods: Vec<PodRecord>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub services: Vec<ServiceRecord>,
}

impl StatusDoc {
    /// Tolerant decode; malformed or non-object bodies give an empty document.
    pub fn from_value(v: &serde_json::Value) -> Self {
        if !v.is_object() {
            return Self::default();
        }
        serde_json::from_value(v.clone()).unwrap_or_default()
    }
}

/// One `/external-map` row: an operator-facing port owned by a (workspace, app) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalMapEntry {
    pub workspace: String,
    pub app: String,
    pub external_port: u16,
}

impl ExternalMapEntry {
    pub fn new(workspace: impl Into<String>, app: impl Into<String>, external_port: u16) -> Self {
        Self { workspace: workspace.into(), app: app.into(), external_port }
    }

    pub fn is_pair(&self, workspace: &str, app: &str) -> bool {
        self.workspace == workspace && self.app == app
    }
}

/// Decode the `/external-map` body. Rows that do not parse are skipped;
/// a non-array body yields `None` so callers keep their current map.
pub fn parse_external_map(body: &serde_json::Value) -> Option<Vec<ExternalMapEntry>> {
    let items = body.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|v| serde_json::from_value::<ExternalMapEntry>(v.clone()).ok())
            .collect(),
    )
}

/// Process-wide host information used to build externally reachable URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HostInfo {
    #[serde(default)]
    pub host_ip: String,
}

impl HostInfo {
    pub fn is_known(&self) -> bool {
        !self.host_ip.is_empty()
    }

    /// `http://<host_ip>:<port>`, or `None` while the host ip is unknown.
    pub fn external_url(&self, port: u16) -> Option<String> {
        self.is_known().then(|| format!("http://{}:{}", self.host_ip, port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Ok,
    Warn,
    Error,
}

/// Outcome of one control action as shown in the operator activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub method: String,
    pub endpoint: String,
    /// HTTP status; `0` marks a transport failure.
    pub status: u16,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn severity(&self) -> Severity {
        match self.status {
            200..=299 => Severity::Ok,
            400..=499 => Severity::Warn,
            _ => Severity::Error,
        }
    }
}

fn lenient_vec<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    // Non-array values (null, objects, strings) decode as empty; bad rows are dropped.
    let v = serde_json::Value::deserialize(de)?;
    Ok(match v {
        serde_json::Value::Array(items) => items.into_iter().filter_map(|i| serde_json::from_value(i).ok()).collect(),
        _ => Vec::new(),
    })
}

fn lenient_port<'de, D>(de: D) -> Result<Option<u16>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // numbers and numeric strings within u16; anything else is unallocated
    let v = serde_json::Value::deserialize(de)?;
    Ok(match v {
        serde_json::Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        serde_json::Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn addressable_requires_ws_prefix() {
        assert!(is_addressable("ws-demo"));
        assert!(!is_addressable("demo"));
        assert!(!is_addressable(""));
        assert!(!is_addressable("WS-demo"));
    }

    #[test]
    fn workspace_list_accepts_array_and_items() {
        let bare = json!([{ "workspace": "ws-a", "apps": [{ "app": "web" }] }]);
        let wrapped = json!({ "items": [{ "workspace": "ws-b" }] });
        let a = parse_workspace_list(&bare);
        let b = parse_workspace_list(&wrapped);
        assert_eq!(a, vec![WorkspaceEntry::new("ws-a", &["web"])]);
        assert_eq!(b, vec![WorkspaceEntry::new("ws-b", &[])]);
        assert!(parse_workspace_list(&json!("nope")).is_empty());
        assert!(parse_workspace_list(&json!({ "items": 3 })).is_empty());
    }

    #[test]
    fn app_ref_prefers_app_then_name() {
        let entry: WorkspaceEntry = serde_json::from_value(json!({
            "workspace": "ws-a",
            "apps": [{ "app": "a1" }, { "name": "n1" }, {}, { "app": "", "name": "n2" }]
        }))
        .unwrap();
        let names: Vec<_> = entry.apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a1", "n1", "app", "n2"]);
    }

    #[test]
    fn apps_that_are_not_an_array_decode_empty() {
        let entry: WorkspaceEntry = serde_json::from_value(json!({ "workspace": "ws-a", "apps": null })).unwrap();
        assert!(entry.apps.is_empty());
        assert_eq!(WorkspaceEntry::default().label(), "(unknown)");
    }

    #[test]
    fn status_doc_is_tolerant() {
        let doc = StatusDoc::from_value(&json!({
            "pods": [{ "name": "web-1", "phase": "Running" }, 42],
            "services": [{ "name": "web", "nodePort": 30080 }]
        }));
        assert_eq!(doc.pods.len(), 1);
        assert_eq!(doc.services[0].node_port, Some(30080));
        assert_eq!(StatusDoc::from_value(&json!("text body")), StatusDoc::default());
        assert_eq!(StatusDoc::from_value(&json!({ "pods": "x" })).pods.len(), 0);
    }

    #[test]
    fn bad_node_port_keeps_the_service() {
        let doc = StatusDoc::from_value(&json!({
            "services": [
                { "name": "web", "nodePort": "abc" },
                { "name": "api", "nodePort": 70000 },
                { "name": "db", "nodePort": "30432" },
                { "name": "cache", "nodePort": null },
                { "name": "neg", "nodePort": -1 }
            ]
        }));
        let ports: Vec<_> = doc.services.iter().map(|s| (s.name.as_str(), s.node_port)).collect();
        assert_eq!(
            ports,
            vec![("web", None), ("api", None), ("db", Some(30432)), ("cache", None), ("neg", None)]
        );
        assert_eq!(derive_apps(None, Some(&doc)), vec!["web", "api", "db", "cache", "neg"]);
    }

    #[test]
    fn external_map_non_array_is_none() {
        assert!(parse_external_map(&json!({ "error": "x" })).is_none());
        let rows = parse_external_map(&json!([
            { "workspace": "ws-a", "app": "web", "external_port": 18080 },
            { "workspace": "ws-a" }
        ]))
        .unwrap();
        assert_eq!(rows, vec![ExternalMapEntry::new("ws-a", "web", 18080)]);
    }

    #[test]
    fn severity_buckets() {
        let mk = |status| ActivityEntry { method: "GET".into(), endpoint: "/x".into(), status, message: String::new(), at: Utc::now() };
        assert_eq!(mk(200).severity(), Severity::Ok);
        assert_eq!(mk(409).severity(), Severity::Warn);
        assert_eq!(mk(500).severity(), Severity::Error);
        assert_eq!(mk(0).severity(), Severity::Error);
    }

    #[test]
    fn external_url_needs_host() {
        assert_eq!(HostInfo::default().external_url(18080), None);
        let h = HostInfo { host_ip: "10.0.0.5".into() };
        assert_eq!(h.external_url(18080).as_deref(), Some("http://10.0.0.5:18080"));
    }
}
