use tekdash_api::paths::{self, AppAction, WorkspaceAction};
use tekdash_api::{ApiResponse, Request};
use tekdash_core::JobSpec;
use tekdash_store::AppKey;
use tracing::{info, warn};

use crate::Session;

impl Session {
    /// Focus `workspace`: clear the selected app, restart polling on it,
    /// prefetch endpoints for its known apps and refresh its status quietly.
    pub async fn open_workspace(&self, workspace: &str) {
        info!(workspace = %workspace, "sync: open workspace");
        self.with_state(|st| {
            st.focus = Some(workspace.to_string());
            st.selected_app = None;
        });
        self.bump();
        self.start_poll(workspace);
        self.prefetch_endpoints(workspace);
        self.refresh_status(workspace, true).await;
    }

    pub fn select_app(&self, app: Option<&str>) {
        self.with_state(|st| st.selected_app = app.map(str::to_string));
        self.bump();
    }

    pub async fn restart_workspace(&self, workspace: &str) -> Option<ApiResponse> {
        let path = paths::workspace_action(WorkspaceAction::Restart, workspace);
        self.request(Request::post(path), false).await.ok()
    }

    /// Delete `workspace`, then refresh the list. If it was focused, focus is
    /// cleared and polling stops before the list refresh.
    pub async fn delete_workspace(&self, workspace: &str) -> Option<ApiResponse> {
        let path = paths::workspace_action(WorkspaceAction::Delete, workspace);
        let res = self.request(Request::post(path), false).await.ok();
        let deleted = res.as_ref().is_some_and(|r| (200..300).contains(&r.status));
        let was_focused = self.with_state(|st| {
            if deleted {
                st.statuses.remove(workspace);
            }
            if st.focus.as_deref() != Some(workspace) {
                return false;
            }
            st.focus = None;
            st.selected_app = None;
            true
        });
        if was_focused {
            self.stop_poll();
        }
        self.bump();
        self.list_workspaces().await;
        res
    }

    /// Scale `app` to `replicas`, then refresh the workspace status quietly.
    pub async fn scale_app(&self, workspace: &str, app: &str, replicas: u32) -> Option<ApiResponse> {
        let path = paths::workspace_scale(workspace, app, replicas);
        let res = self.request(Request::post(path), false).await.ok();
        self.refresh_status(workspace, true).await;
        res
    }

    pub async fn restart_app(&self, workspace: &str, app: &str) -> Option<ApiResponse> {
        let path = paths::app_action(AppAction::Restart, workspace, app);
        self.request(Request::post(path), false).await.ok()
    }

    pub async fn delete_app(&self, workspace: &str, app: &str) -> Option<ApiResponse> {
        let path = paths::app_action(AppAction::Delete, workspace, app);
        let res = self.request(Request::post(path), false).await.ok();
        self.list_workspaces().await;
        res
    }

    pub async fn app_status(&self, workspace: &str, app: &str) -> Option<ApiResponse> {
        let path = paths::app_action(AppAction::Status, workspace, app);
        self.request(Request::get(path), false).await.ok()
    }

    /// Manual endpoint lookup. Logged; a non-empty answer also fills the cache.
    pub async fn query_endpoint(&self, workspace: &str, app: &str) -> Option<String> {
        let r = self.request(Request::get(paths::endpoint(workspace, app)), false).await.ok()?;
        if !r.is_ok() {
            return None;
        }
        let ep = r.str_field("endpoint").filter(|e| !e.is_empty())?.to_string();
        let key = AppKey::new(workspace, app);
        if self.with_state(|st| st.endpoints.insert(key, &ep)) {
            self.bump();
        }
        Some(ep)
    }

    /// Submit a build/deploy job, then refresh the workspace list.
    pub async fn submit_job(&self, job: &JobSpec) -> Option<ApiResponse> {
        let body = match serde_json::to_value(job) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "sync: job encode failed");
                return None;
            }
        };
        info!(app = %job.app_name, workspace = %job.workspace, source = job.source.kind(), "sync: submit job");
        let res = self.request(Request::post_json(paths::RUN, body), false).await.ok();
        self.list_workspaces().await;
        res
    }

    pub fn clear_activity(&self) {
        self.with_state(|st| st.activity.clear());
        self.bump();
    }
}
