#![allow(clippy::must_use_candidate)]

//! Core types for keywarden
//!
//! Holds the persisted error event model, the cookie-backed error store and
//! the mapping from a forbidden request to the permission it implies.

pub mod clock;
pub mod event;
pub mod jar;
pub mod message;
pub mod permission;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{ErrorCode, ErrorDetails, ErrorEvent, ErrorInput};
pub use jar::{Cookie, CookieJar, CookieScope, FileCookieJar, JarError, MemoryCookieJar};
pub use permission::{Action, PermissionDescriptor, extract_permission, route_template};
pub use store::{CookieErrorStore, ErrorStore, MemoryErrorStore, StoreLimits};
