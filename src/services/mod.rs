//! Services
//!
//! Business logic behind the command layer.

pub mod analysis;
pub mod dialog;
