//! Relative runner paths. Query values are escaped with the URI component set.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

pub const HEALTHZ: &str = "/healthz";
pub const HOSTINFO: &str = "/hostinfo";
pub const EXTERNAL_MAP: &str = "/external-map";
pub const WORKSPACES: &str = "/workspaces";
pub const RUN: &str = "/run";

/// Characters left unescaped by a URI component encoder.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn escape(v: &str) -> String {
    utf8_percent_encode(v, COMPONENT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceAction {
    Restart,
    Delete,
}

impl WorkspaceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceAction::Restart => "restart",
            WorkspaceAction::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Status,
    Restart,
    Delete,
}

impl AppAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppAction::Status => "status",
            AppAction::Restart => "restart",
            AppAction::Delete => "delete",
        }
    }
}

pub fn workspace_status(workspace: &str) -> String {
    format!("/workspace/status?workspace={}", escape(workspace))
}

pub fn workspace_action(action: WorkspaceAction, workspace: &str) -> String {
    format!("/workspace/{}?workspace={}", action.as_str(), escape(workspace))
}

pub fn workspace_scale(workspace: &str, app: &str, replicas: u32) -> String {
    format!(
        "/workspace/scale?workspace={}&app={}&replicas={}",
        escape(workspace),
        escape(app),
        replicas
    )
}

pub fn endpoint(workspace: &str, app: &str) -> String {
    format!("/endpoint?workspace={}&app={}", escape(workspace), escape(app))
}

pub fn app_action(action: AppAction, workspace: &str, app: &str) -> String {
    format!("/app/{}?workspace={}&app={}", action.as_str(), escape(workspace), escape(app))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_a_uri_component() {
        assert_eq!(escape("ws-demo"), "ws-demo");
        assert_eq!(escape("a b&c=d/e"), "a%20b%26c%3Dd%2Fe");
        assert_eq!(escape("x.y_z~(1)!*'"), "x.y_z~(1)!*'");
        assert_eq!(escape("ü"), "%C3%BC");
    }

    #[test]
    fn builds_action_paths() {
        assert_eq!(workspace_status("ws-a"), "/workspace/status?workspace=ws-a");
        assert_eq!(workspace_action(WorkspaceAction::Delete, "ws a"), "/workspace/delete?workspace=ws%20a");
        assert_eq!(workspace_scale("ws-a", "web", 3), "/workspace/scale?workspace=ws-a&app=web&replicas=3");
        assert_eq!(endpoint("ws-a", "w&b"), "/endpoint?workspace=ws-a&app=w%26b");
        assert_eq!(app_action(AppAction::Restart, "ws-a", "web"), "/app/restart?workspace=ws-a&app=web");
    }
}
