//! Integration Tests Module
//!
//! Tests cover report parsing and tree building, the analysis session flow
//! against scripted analyzers, and configuration loading.

// Report parsing and call-tree building
mod report_tree_test;

// Session stage machine driven by scripted analyzer processes
#[cfg(unix)]
mod session_flow_test;

// Configuration file handling
mod config_test;
