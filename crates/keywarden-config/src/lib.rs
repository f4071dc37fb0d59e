#![allow(clippy::must_use_candidate)]

pub mod api;
mod duration;
mod env;
mod loader;
pub mod poller;
pub mod repair;
pub mod store;
pub mod telemetry;

use serde::Deserialize;

pub use api::*;
pub use poller::*;
pub use repair::*;
pub use store::*;
pub use telemetry::TelemetryConfig;

/// Top-level keywarden configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Admin backend connection
    pub api: ApiConfig,
    /// Error store persistence
    #[serde(default)]
    pub store: StoreConfig,
    /// Notification poller
    #[serde(default)]
    pub poller: PollerConfig,
    /// Permission repair workflow
    #[serde(default)]
    pub repair: RepairConfig,
    /// Logging and trace export
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
