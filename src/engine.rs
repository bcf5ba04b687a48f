use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Handle to one node of one [`SourceTree`]. Carries the owning tree's id so
/// a handle from one tree cannot silently read another tree's nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    tree: u64,
    node: u32,
}

impl NodeHandle {
    pub(crate) fn new(tree: u64, node: u32) -> Self {
        Self { tree, node }
    }

    pub(crate) fn tree(&self) -> u64 {
        self.tree
    }

    pub(crate) fn node(&self) -> u32 {
        self.node
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeProperties {
    pub kind: &'static str,
    /// Byte offset where the node's span starts in the source text.
    pub start: usize,
    /// Byte offset one past the end of the node's span.
    pub end: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("node handle belongs to tree {handle_tree}, not tree {tree}")]
    ForeignHandle { tree: u64, handle_tree: u64 },
    #[error("tree {tree} has no node {node}")]
    UnknownNode { tree: u64, node: u32 },
}

/// The tree a rule engine builds from one file's text. Node internals are
/// opaque; consumers navigate through handles only.
pub trait SourceTree {
    fn root(&self) -> NodeHandle;
    fn properties(&self, node: NodeHandle) -> Result<NodeProperties, EngineError>;
    /// Direct children, each labeled with the role it plays under its parent.
    fn children(&self, node: NodeHandle) -> Result<Vec<(&'static str, NodeHandle)>, EngineError>;
    /// Named lists of children, for roles that hold an ordered sequence.
    fn child_lists(
        &self,
        node: NodeHandle,
    ) -> Result<Vec<(&'static str, Vec<NodeHandle>)>, EngineError>;
}

/// One rule firing: the rule that fired and the entire file content after
/// applying that rule's fixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    pub rule_id: u32,
    pub text: String,
}

/// The analysis collaborator. Must be safe to share across worker threads;
/// `analyze` takes no mutable state and may run concurrently for different
/// files.
pub trait RuleEngine: Sync {
    /// Evaluate the rule catalog against one file's text. Malformed input
    /// yields an empty set, never an error.
    fn analyze(&self, original: &str) -> Vec<Repair>;

    /// Human-readable description for a rule id, if the catalog knows it.
    fn describe(&self, rule_id: u32) -> Option<&str>;

    /// Whether files with this extension are candidates for analysis when
    /// expanding directories.
    fn handles_extension(&self, extension: &str) -> bool;
}

/// Materialize the rewrite candidates for one file: every repair the engine
/// proposes, minus candidates identical to the original and exact duplicates.
pub fn generate_rewrites(engine: &dyn RuleEngine, original: &str) -> Vec<Repair> {
    let mut seen: HashSet<(u32, String)> = HashSet::new();
    engine
        .analyze(original)
        .into_iter()
        .filter(|repair| repair.text != original)
        .filter(|repair| seen.insert((repair.rule_id, repair.text.clone())))
        .collect()
}

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id for a freshly built tree.
pub(crate) fn next_tree_id() -> u64 {
    NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine(Vec<Repair>);

    impl RuleEngine for FixedEngine {
        fn analyze(&self, _original: &str) -> Vec<Repair> {
            self.0.clone()
        }

        fn describe(&self, _rule_id: u32) -> Option<&str> {
            None
        }

        fn handles_extension(&self, _extension: &str) -> bool {
            true
        }
    }

    fn repair(rule_id: u32, text: &str) -> Repair {
        Repair {
            rule_id,
            text: text.to_string(),
        }
    }

    #[test]
    fn drops_candidates_equal_to_original() {
        let engine = FixedEngine(vec![repair(1, "same\n"), repair(2, "changed\n")]);
        let kept = generate_rewrites(&engine, "same\n");
        assert_eq!(kept, vec![repair(2, "changed\n")]);
    }

    #[test]
    fn drops_exact_duplicates_but_keeps_distinct_fixes_of_one_rule() {
        let engine = FixedEngine(vec![
            repair(7, "first\n"),
            repair(7, "first\n"),
            repair(7, "second\n"),
        ]);
        let kept = generate_rewrites(&engine, "orig\n");
        assert_eq!(kept, vec![repair(7, "first\n"), repair(7, "second\n")]);
    }

    #[test]
    fn tree_ids_are_unique() {
        let first = next_tree_id();
        let second = next_tree_id();
        assert_ne!(first, second);
    }
}
