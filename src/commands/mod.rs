//! Commands
//!
//! Entry points called by a frontend, one module per feature.

pub mod analysis;

pub use analysis::*;
