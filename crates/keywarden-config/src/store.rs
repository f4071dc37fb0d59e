use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Error store persistence configuration
///
/// The cookie contract is the one shared with the web console: a single
/// cookie holding a JSON array of error events.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Cookie key
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Cookie domain scope
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Cookie path scope
    #[serde(default = "default_path")]
    pub path: String,
    /// File backing the cookie jar
    #[serde(default = "default_jar_path")]
    pub jar_path: PathBuf,
    /// Maximum number of retained events
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Age after which an event is no longer surfaced
    #[serde(default = "default_retention", with = "crate::duration")]
    pub retention: Duration,
    /// Lifetime of the cookie itself
    #[serde(default = "default_cookie_ttl", with = "crate::duration")]
    pub cookie_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            domain: default_domain(),
            path: default_path(),
            jar_path: default_jar_path(),
            max_entries: default_max_entries(),
            retention: default_retention(),
            cookie_ttl: default_cookie_ttl(),
        }
    }
}

fn default_cookie_name() -> String {
    "app_errors".to_owned()
}

fn default_domain() -> String {
    "localhost".to_owned()
}

fn default_path() -> String {
    "/".to_owned()
}

fn default_jar_path() -> PathBuf {
    PathBuf::from(".keywarden/cookies.json")
}

const fn default_max_entries() -> usize {
    10
}

const fn default_retention() -> Duration {
    Duration::from_secs(5 * 60)
}

const fn default_cookie_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}
