#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Notification surface and permission repair for keywarden
//!
//! The poller mirrors the error store into observable state; the repair
//! workflow turns a 403 into a granted permission.

mod poller;
mod push;
mod repair;
pub mod surface;

pub use poller::{ErrorPoller, PollerHandle};
pub use push::NotifyingStore;
pub use repair::{Granted, PermissionRepair, Reload, RepairError, RepairOutcome};
pub use surface::{Effect, Phase, Surface, SurfaceView};
