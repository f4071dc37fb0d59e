use std::time::Duration;

use serde::Deserialize;

/// Permission repair configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepairConfig {
    /// Role that receives repaired permissions
    #[serde(default = "default_role")]
    pub role: String,
    /// Delay between a successful grant and the reload
    #[serde(default = "default_reload_delay", with = "crate::duration")]
    pub reload_delay: Duration,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            reload_delay: default_reload_delay(),
        }
    }
}

fn default_role() -> String {
    "superadmin".to_owned()
}

const fn default_reload_delay() -> Duration {
    Duration::from_millis(1500)
}
