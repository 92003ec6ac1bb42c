use std::time::Duration;

/// Session tunables. Defaults match the dashboard: 5 s poll, 20 log entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub poll_interval: Duration,
    pub activity_cap: usize,
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            activity_cap: tekdash_store::ACTIVITY_CAP,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `TEKDASH_POLL_SECS`, `TEKDASH_ACTIVITY_CAP`
    /// and `TEKDASH_TIMEOUT_SECS`. Unparsable or zero values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let num = |k: &str| get(k).and_then(|s| s.trim().parse::<u64>().ok()).filter(|v| *v > 0);
        let mut cfg = Self::default();
        if let Some(s) = num("TEKDASH_POLL_SECS") { cfg.poll_interval = Duration::from_secs(s); }
        if let Some(n) = num("TEKDASH_ACTIVITY_CAP") { cfg.activity_cap = n as usize; }
        if let Some(s) = num("TEKDASH_TIMEOUT_SECS") { cfg.request_timeout = Duration::from_secs(s); }
        cfg
    }
}
