//! Read-only view model composed from one consistent read of the session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tekdash_core::{
    default_external_port, derive_apps, pod_counts, service_node_port, ActivityEntry, HostInfo, PodCounts,
    WorkspaceEntry,
};
use tekdash_store::{AppKey, EndpointCache, ExternalMap, StatusSnapshot};

use crate::{lock, Health, ListError, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusLabel {
    Pending,
    Ok,
    Fail,
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StatusLabel::Pending => "PENDING",
            StatusLabel::Ok => "OK",
            StatusLabel::Fail => "FAIL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkspaceCard {
    pub id: String,
    pub label: String,
    pub apps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppView {
    pub name: String,
    pub pods: PodCounts,
    pub node_port: Option<u16>,
    /// `None` while unresolved.
    pub endpoint: Option<String>,
    pub external_port: Option<u16>,
    pub external_url: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkspaceDetail {
    pub workspace: String,
    pub app_count: usize,
    pub status: StatusLabel,
    pub last_update: Option<DateTime<Utc>>,
    pub last_status_code: Option<u16>,
    pub apps: Vec<AppView>,
    pub selected_app: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub revision: u64,
    pub health: Health,
    pub host_ip: Option<String>,
    pub workspaces: Vec<WorkspaceCard>,
    pub list_error: Option<ListError>,
    pub detail: Option<WorkspaceDetail>,
    pub activity: Vec<ActivityEntry>,
    pub polling: Option<String>,
}

impl Session {
    pub fn view(&self) -> DashboardView {
        let revision = self.revision();
        let polling = self.polling();
        let host = self.inner.host.load_full();
        let external = self.inner.external.load_full();
        let st = lock(&self.inner.state);
        let detail = st.focus.as_deref().map(|ws| {
            compose_detail(
                ws,
                st.workspace(ws),
                st.statuses.get(ws),
                &st.endpoints,
                &external,
                &host,
                st.selected_app.as_deref(),
            )
        });
        DashboardView {
            revision,
            health: st.health.clone(),
            host_ip: host.is_known().then(|| host.host_ip.clone()),
            workspaces: st.workspaces.iter().map(card).collect(),
            list_error: st.list_error.clone(),
            detail,
            activity: st.activity.snapshot(),
            polling,
        }
    }
}

fn card(entry: &WorkspaceEntry) -> WorkspaceCard {
    WorkspaceCard {
        id: entry.workspace.clone(),
        label: entry.label().to_string(),
        apps: entry.apps.iter().map(|a| a.name.clone()).collect(),
    }
}

/// External port shown for an app: its mapping, else the default port when
/// no other pair owns it.
pub(crate) fn shown_external_port(map: &ExternalMap, workspace: &str, app: &str, node_port: Option<u16>) -> Option<u16> {
    map.port_for(workspace, app).or_else(|| {
        default_external_port(node_port).filter(|p| map.other_owner(*p, workspace, app).is_none())
    })
}

pub(crate) fn compose_detail(
    workspace: &str,
    entry: Option<&WorkspaceEntry>,
    snap: Option<&StatusSnapshot>,
    endpoints: &EndpointCache,
    external: &ExternalMap,
    host: &HostInfo,
    selected: Option<&str>,
) -> WorkspaceDetail {
    let doc = snap.map(|s| &s.doc);
    let status = match snap {
        None => StatusLabel::Pending,
        Some(s) if s.ok => StatusLabel::Ok,
        Some(_) => StatusLabel::Fail,
    };
    let apps: Vec<AppView> = derive_apps(entry, doc)
        .into_iter()
        .map(|name| {
            let node_port = doc.and_then(|d| service_node_port(d, &name));
            let external_port = shown_external_port(external, workspace, &name, node_port);
            AppView {
                pods: doc.map(|d| pod_counts(d, &name)).unwrap_or_default(),
                node_port,
                endpoint: endpoints.get(&AppKey::new(workspace, &name)).map(str::to_string),
                external_port,
                external_url: external_port.and_then(|p| host.external_url(p)),
                selected: selected == Some(name.as_str()),
                name,
            }
        })
        .collect();
    WorkspaceDetail {
        workspace: workspace.to_string(),
        app_count: apps.len(),
        status,
        last_update: snap.map(|s| s.fetched_at),
        last_status_code: snap.and_then(|s| s.status),
        apps,
        selected_app: selected.map(str::to_string),
    }
}
