use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Admin REST backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL every admin path is joined onto, e.g. `https://auth.example.com/api`
    pub base_url: Url,
    /// Bearer token for the operator session
    #[serde(default)]
    pub token: Option<SecretString>,
    /// Per-request timeout
    #[serde(default = "default_timeout", with = "crate::duration")]
    pub timeout: Duration,
    /// Path of the current-session endpoint
    #[serde(default = "default_session_path")]
    pub session_path: String,
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_session_path() -> String {
    "/auth/me".to_owned()
}
