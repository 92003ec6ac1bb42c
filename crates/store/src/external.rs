use serde::{Deserialize, Serialize};
use tekdash_core::ExternalMapEntry;

use crate::AppKey;

/// A claim for `port` was refused because another pair owns it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("external port {port} already owned by {owner}")]
pub struct PortConflict {
    pub port: u16,
    pub owner: AppKey,
}

/// Local copy of the global external port map.
///
/// Only ever replaced wholesale from an authoritative `/external-map` read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalMap {
    entries: Vec<ExternalMapEntry>,
}

impl ExternalMap {
    pub fn new(entries: Vec<ExternalMapEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ExternalMapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Port mapped to `(workspace, app)`, if any.
    pub fn port_for(&self, workspace: &str, app: &str) -> Option<u16> {
        self.entries.iter().find(|e| e.is_pair(workspace, app)).map(|e| e.external_port).filter(|p| *p != 0)
    }

    /// Owner of `port` other than `(workspace, app)`.
    pub fn other_owner(&self, port: u16, workspace: &str, app: &str) -> Option<AppKey> {
        self.entries
            .iter()
            .find(|e| e.external_port == port && !e.is_pair(workspace, app))
            .map(|e| AppKey::new(e.workspace.clone(), e.app.clone()))
    }

    /// Collision check run before every claim. The same pair re-claiming its
    /// own port is allowed.
    pub fn check_claim(&self, workspace: &str, app: &str, port: u16) -> Result<(), PortConflict> {
        match self.other_owner(port, workspace, app) {
            Some(owner) => Err(PortConflict { port, owner }),
            None => Ok(()),
        }
    }
}
