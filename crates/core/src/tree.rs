//! Dependency Tree Builder
//!
//! Turns the method call entries of one dependency into a labeled tree plus
//! aggregate metrics (entry count, maximum depth) used to size the view.
//!
//! The walk uses an explicit frame stack instead of native recursion so the
//! nesting ceiling can be large without risking the call stack.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::report::{MethodCallEntry, DEFAULT_MAX_NESTING_DEPTH};

/// Labels longer than this are truncated for display.
pub const LABEL_MAX_CHARS: usize = 20;
const LABEL_KEEP_CHARS: usize = 17;
const ELLIPSIS: &str = "...";

/// A rendered node of the call tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Method name, truncated to [`LABEL_MAX_CHARS`]
    pub display_label: String,
    /// Untruncated method name
    pub full_label: String,
    /// Tooltip anchor, `tooltip-<index>-<depth>`
    pub tooltip_id: String,
    /// Children in source entry order
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn from_entry(entry: &MethodCallEntry, index: usize, depth: usize, children: Vec<TreeNode>) -> Self {
        Self {
            display_label: truncate_label(&entry.method_name),
            full_label: entry.method_name.clone(),
            tooltip_id: format!("tooltip-{}-{}", index, depth),
            children,
        }
    }

    /// Synthetic unlabeled wrapper around the top-level nodes
    fn root(children: Vec<TreeNode>) -> Self {
        Self {
            display_label: String::new(),
            full_label: String::new(),
            tooltip_id: String::new(),
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Aggregate size of a built tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeMetrics {
    /// Number of entries reachable from the input, the input entries included
    pub entry_count: usize,
    /// Deepest entry layer reached; top-level entries are depth 0
    pub max_depth: usize,
}

/// Output of one tree build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyTree {
    pub root: TreeNode,
    pub metrics: TreeMetrics,
}

/// Truncate a method name to the display width.
///
/// Counts characters, not bytes, so multi-byte names are never split.
pub fn truncate_label(name: &str) -> String {
    if name.chars().count() > LABEL_MAX_CHARS {
        let mut label: String = name.chars().take(LABEL_KEEP_CHARS).collect();
        label.push_str(ELLIPSIS);
        label
    } else {
        name.to_string()
    }
}

/// Depth-guarded tree builder.
#[derive(Debug, Clone, Copy)]
pub struct TreeBuilder {
    max_depth: usize,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NESTING_DEPTH)
    }
}

/// One list of sibling entries being converted.
struct Frame<'a> {
    entries: &'a [MethodCallEntry],
    depth: usize,
    next: usize,
    nodes: Vec<TreeNode>,
}

impl<'a> Frame<'a> {
    fn new(entries: &'a [MethodCallEntry], depth: usize) -> Self {
        Self {
            entries,
            depth,
            next: 0,
            nodes: Vec::with_capacity(entries.len()),
        }
    }
}

impl TreeBuilder {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Build the tree for one dependency's entries.
    ///
    /// Fails with [`CoreError::DepthExceeded`] as soon as an entry deeper than
    /// the configured ceiling is reached.
    pub fn build(&self, entries: &[MethodCallEntry]) -> CoreResult<DependencyTree> {
        let mut metrics = TreeMetrics::default();
        let mut stack = vec![Frame::new(entries, 0)];

        loop {
            let Some(frame) = stack.last_mut() else {
                return Err(CoreError::internal("tree builder lost its root frame"));
            };

            if let Some(entry) = frame.entries.get(frame.next) {
                let depth = frame.depth;
                if depth > self.max_depth {
                    return Err(CoreError::depth_exceeded(depth, self.max_depth));
                }
                metrics.entry_count += 1;
                metrics.max_depth = metrics.max_depth.max(depth);

                let inner = entry.inner_calls();
                if inner.is_empty() {
                    let node = TreeNode::from_entry(entry, frame.next, depth, Vec::new());
                    frame.nodes.push(node);
                    frame.next += 1;
                } else {
                    // parent's `next` stays on this entry until its children are done
                    stack.push(Frame::new(inner, depth + 1));
                }
                continue;
            }

            let Some(done) = stack.pop() else {
                return Err(CoreError::internal("tree builder lost its frame"));
            };
            match stack.last_mut() {
                Some(parent) => {
                    let index = parent.next;
                    let Some(entry) = parent.entries.get(index) else {
                        return Err(CoreError::internal("tree builder parent out of range"));
                    };
                    let node = TreeNode::from_entry(entry, index, parent.depth, done.nodes);
                    parent.nodes.push(node);
                    parent.next += 1;
                }
                None => {
                    return Ok(DependencyTree {
                        root: TreeNode::root(done.nodes),
                        metrics,
                    });
                }
            }
        }
    }
}

/// Build a tree with the default nesting ceiling.
pub fn build_tree(entries: &[MethodCallEntry]) -> CoreResult<DependencyTree> {
    TreeBuilder::default().build(entries)
}
