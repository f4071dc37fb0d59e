#![allow(dead_code, clippy::missing_panics_doc)]

pub mod config;
pub mod mock_admin;
