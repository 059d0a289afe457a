//! Data Models
//!
//! Settings, session state and command payloads.

pub mod response;
pub mod session;
pub mod settings;
