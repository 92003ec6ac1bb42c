use std::sync::Arc;

use metrics::counter;
use tekdash_core::is_addressable;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::{lock, Session};

/// The single poll timer of a session. Aborting it cancels future ticks only.
pub(crate) struct PollTask {
    pub(crate) workspace: String,
    handle: JoinHandle<()>,
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl Session {
    /// Replace any running poller with one refreshing `workspace` every
    /// poll interval. The first tick fires one interval from now. Placeholder
    /// workspaces only stop the previous poller.
    pub fn start_poll(&self, workspace: &str) {
        let mut slot = lock(&self.inner.poll);
        if let Some(prev) = slot.take() {
            debug!(workspace = %prev.workspace, "sync: poll stopped");
        }
        if !is_addressable(workspace) {
            return;
        }
        let period = self.inner.cfg.poll_interval;
        let weak = Arc::downgrade(&self.inner);
        let ws = workspace.to_string();
        let handle = tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + period, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let session = Session { inner };
                counter!("sync_poll_ticks_total", 1u64);
                // detached so stopping the timer never drops a response in flight
                let ws = ws.clone();
                tokio::spawn(async move {
                    session.refresh_status(&ws, true).await;
                });
            }
        });
        info!(workspace = %workspace, period_ms = %period.as_millis(), "sync: poll started");
        *slot = Some(PollTask { workspace: workspace.to_string(), handle });
    }

    pub fn stop_poll(&self) {
        if let Some(prev) = lock(&self.inner.poll).take() {
            debug!(workspace = %prev.workspace, "sync: poll stopped");
        }
    }

    /// Workspace currently being polled.
    pub fn polling(&self) -> Option<String> {
        lock(&self.inner.poll).as_ref().map(|p| p.workspace.clone())
    }
}
