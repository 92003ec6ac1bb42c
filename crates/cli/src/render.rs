//! Plain-text rendering of the dashboard view.

use std::fmt::Write;

use chrono::Local;
use tekdash_core::{ActivityEntry, ExternalMapEntry, Severity};
use tekdash_sync::{DashboardView, WorkspaceCard, WorkspaceDetail};

pub fn workspaces(cards: &[WorkspaceCard]) -> String {
    if cards.is_empty() {
        return "no workspaces\n".to_string();
    }
    let mut s = String::new();
    let _ = writeln!(s, "{:<24} APPS", "WORKSPACE");
    for c in cards {
        let apps = if c.apps.is_empty() { "-".to_string() } else { c.apps.join(", ") };
        let _ = writeln!(s, "{:<24} {}", c.label, apps);
    }
    s
}

pub fn detail(d: &WorkspaceDetail) -> String {
    let mut s = String::new();
    let updated = d
        .last_update
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(s, "{}  [{}]  apps: {}  updated: {}", d.workspace, d.status, d.app_count, updated);
    if d.apps.is_empty() {
        let _ = writeln!(s, "  (no apps)");
        return s;
    }
    let _ = writeln!(s, "  {:<20} {:<7} {:<9} {:<24} EXTERNAL", "APP", "PODS", "NODEPORT", "ENDPOINT");
    for a in &d.apps {
        let mark = if a.selected { '*' } else { ' ' };
        let node_port = a.node_port.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        let endpoint = a.endpoint.as_deref().unwrap_or("loading...");
        let external = a
            .external_url
            .clone()
            .or_else(|| a.external_port.map(|p| p.to_string()))
            .unwrap_or_else(|| "-".into());
        let pods = format!("{}/{}", a.pods.running, a.pods.total);
        let _ = writeln!(s, "{}{:<20} {:<7} {:<9} {:<24} {}", mark, a.name, pods, node_port, endpoint, external);
    }
    s
}

fn activity_line(e: &ActivityEntry) -> String {
    let tag = match e.severity() {
        Severity::Ok => "ok ",
        Severity::Warn => "wrn",
        Severity::Error => "err",
    };
    let at = e.at.with_timezone(&Local).format("%H:%M:%S");
    format!("{} {} {} {} {} {}", at, tag, e.method, e.endpoint, e.status, e.message)
}

pub fn external_map(entries: &[ExternalMapEntry]) -> String {
    if entries.is_empty() {
        return "no external ports mapped\n".to_string();
    }
    let mut s = String::new();
    let _ = writeln!(s, "{:<8} {:<24} APP", "PORT", "WORKSPACE");
    for e in entries {
        let _ = writeln!(s, "{:<8} {:<24} {}", e.external_port, e.workspace, e.app);
    }
    s
}

pub fn dashboard(v: &DashboardView) -> String {
    let mut s = String::new();
    let host = v.host_ip.as_deref().unwrap_or("-");
    let polling = v.polling.as_deref().unwrap_or("-");
    let _ = writeln!(s, "{}  host: {}  polling: {}  rev: {}", v.health, host, polling, v.revision);
    let _ = writeln!(s);
    match &v.list_error {
        Some(err) => {
            let _ = writeln!(s, "{}", err);
        }
        None => s.push_str(&workspaces(&v.workspaces)),
    }
    if let Some(d) = &v.detail {
        let _ = writeln!(s);
        s.push_str(&detail(d));
    }
    let _ = writeln!(s);
    let _ = writeln!(s, "ACTIVITY");
    if v.activity.is_empty() {
        let _ = writeln!(s, "  (none)");
    }
    for e in &v.activity {
        let _ = writeln!(s, "  {}", activity_line(e));
    }
    s
}
