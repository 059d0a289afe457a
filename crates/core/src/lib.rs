//! CovSBOM Core
//!
//! I/O-free building blocks for the CovSBOM Desktop workspace: the analyzer
//! report model and parser, and the dependency tree builder. Nothing in this
//! crate spawns processes or touches the filesystem.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `report` - Report model (`DependencyReport`, `MethodCallEntry`, ...) and `parse_report`
//! - `tree` - Depth-guarded tree builder (`TreeBuilder`, `TreeNode`, `TreeMetrics`)

pub mod error;
pub mod report;
pub mod tree;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Report Model ───────────────────────────────────────────────────────
pub use report::{
    count_reachable, parse_report, DeclarationInfo, DependencyKey, DependencyReport,
    MethodCallEntry, DEFAULT_MAX_NESTING_DEPTH,
};

// ── Tree Builder ───────────────────────────────────────────────────────
pub use tree::{
    build_tree, truncate_label, DependencyTree, TreeBuilder, TreeMetrics, TreeNode,
    LABEL_MAX_CHARS,
};
