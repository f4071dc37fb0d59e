use std::time::Duration;

use serde::Deserialize;

/// Error poller configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    /// Time between store reads
    #[serde(default = "default_interval", with = "crate::duration")]
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

const fn default_interval() -> Duration {
    Duration::from_secs(1)
}
