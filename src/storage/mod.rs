//! Storage Layer
//!
//! Read-only JSON configuration.

pub mod config;

pub use config::*;
