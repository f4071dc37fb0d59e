#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Typed Rust HTTP client for the keywarden admin backend
//!
//! Covers the permission, role and session endpoints the repair workflow
//! needs. Failures can be funneled into an error store as they happen.

mod client;
pub mod error;
pub mod types;

pub use client::{AdminApi, AdminClient};
pub use error::{ClientError, Result};
pub use types::*;
