//! VAD tree traversal
//!
//! The walker enumerates every reachable node of one process's VAD tree in
//! pre-order together with its depth. Links come from an untrusted snapshot,
//! so nodes are tracked in side tables keyed by their offset and every link
//! is checked against what has already been visited.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::node::VadNode;
use crate::core::types::{Address, ProcessId, VadError};
use crate::snapshot::RecordMaterializer;

/// Guards against corrupt trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalkLimits {
    /// Stop after yielding this many nodes
    pub max_nodes: usize,
    /// Do not descend below this depth
    pub max_depth: usize,
}

impl Default for WalkLimits {
    fn default() -> Self {
        WalkLimits {
            max_nodes: 65536,
            max_depth: 128,
        }
    }
}

/// A node together with its distance from the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalkEntry {
    pub node: VadNode,
    pub depth: usize,
}

/// Why part of a tree was not traversed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TruncationReason {
    /// A link pointed back at an ancestor on the current path
    Cycle { from: Address, to: Address },
    /// A link pointed at a node already reached through another parent
    SharedNode { from: Address, to: Address },
    /// Children of a node at the depth limit were dropped
    DepthLimit { offset: Address, depth: usize },
    /// The node budget ran out; nothing after this point was visited
    NodeLimit { limit: usize },
}

/// A truncation event with the number of nodes visited before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Truncation {
    pub reason: TruncationReason,
    pub visited: usize,
}

/// A node that failed to materialize
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedNode {
    pub offset: Address,
    pub reason: String,
}

/// Summary of one traversal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkReport {
    pub pid: ProcessId,
    pub visited: usize,
    pub skipped: Vec<SkippedNode>,
    pub truncations: Vec<Truncation>,
    /// Nodes whose `start > end`
    pub malformed: Vec<Address>,
}

impl WalkReport {
    pub fn is_truncated(&self) -> bool {
        !self.truncations.is_empty()
    }

    /// Whether anything about the walk deserves a mention
    pub fn has_anomalies(&self) -> bool {
        self.is_truncated() || !self.skipped.is_empty() || !self.malformed.is_empty()
    }
}

/// Lazy pre-order traversal of one VAD tree
///
/// The walker is a one-shot iterator. Use [`VadWalker::report`] after
/// iteration (iterate with `by_ref()`) to see what was skipped or truncated.
pub struct VadWalker<'a> {
    materializer: &'a dyn RecordMaterializer,
    limits: WalkLimits,
    /// Pending references with the offset of the node that linked to them
    stack: Vec<(Address, Option<Address>)>,
    depths: HashMap<Address, usize>,
    /// Traversal parent of every visited non-root node
    parents: HashMap<Address, Address>,
    seen: HashSet<Address>,
    report: WalkReport,
    finished: bool,
}

impl<'a> VadWalker<'a> {
    /// Creates a walker rooted at `root`. A missing root gives an empty walk.
    pub fn new(
        pid: ProcessId,
        root: Option<Address>,
        materializer: &'a dyn RecordMaterializer,
        limits: WalkLimits,
    ) -> Self {
        let stack = root
            .and_then(Address::non_null)
            .map(|root| vec![(root, None)])
            .unwrap_or_default();

        VadWalker {
            materializer,
            limits,
            stack,
            depths: HashMap::new(),
            parents: HashMap::new(),
            seen: HashSet::new(),
            report: WalkReport {
                pid,
                ..Default::default()
            },
            finished: false,
        }
    }

    /// What the walk has seen so far
    pub fn report(&self) -> &WalkReport {
        &self.report
    }

    /// Consumes the walker and returns its report
    pub fn into_report(self) -> WalkReport {
        self.report
    }

    fn truncate(&mut self, reason: TruncationReason) {
        warn!(
            pid = self.report.pid,
            visited = self.report.visited,
            ?reason,
            "VAD walk truncated"
        );
        self.report.truncations.push(Truncation {
            reason,
            visited: self.report.visited,
        });
    }

    fn depth_of(&self, parent: Option<Address>) -> usize {
        parent
            .and_then(|p| self.depths.get(&p))
            .map_or(0, |depth| depth + 1)
    }

    /// Whether `target` lies on the traversal path from the root to `from`
    fn is_ancestor(&self, target: Address, from: Address) -> bool {
        let mut cursor = Some(from);
        while let Some(current) = cursor {
            if current == target {
                return true;
            }
            cursor = self.parents.get(&current).copied();
        }
        false
    }
}

impl Iterator for VadWalker<'_> {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while let Some((reference, linked_from)) = self.stack.pop() {
            if !self.seen.insert(reference) {
                let from = linked_from.unwrap_or_default();
                let reason = if self.is_ancestor(reference, from) {
                    TruncationReason::Cycle {
                        from,
                        to: reference,
                    }
                } else {
                    TruncationReason::SharedNode {
                        from,
                        to: reference,
                    }
                };
                self.truncate(reason);
                continue;
            }

            if self.report.visited >= self.limits.max_nodes {
                self.truncate(TruncationReason::NodeLimit {
                    limit: self.limits.max_nodes,
                });
                self.stack.clear();
                self.finished = true;
                return None;
            }

            let node = match self.materializer.materialize(reference) {
                Ok(node) => node,
                Err(err) => {
                    warn!(pid = self.report.pid, offset = %reference, error = %err, "Skipping VAD node");
                    let reason = match err {
                        VadError::CorruptNode { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    self.report.skipped.push(SkippedNode {
                        offset: reference,
                        reason,
                    });
                    continue;
                }
            };

            let depth = self.depth_of(linked_from);
            self.depths.insert(node.offset, depth);
            if let Some(parent) = linked_from {
                self.parents.insert(node.offset, parent);
            }
            self.report.visited += 1;

            if node.parent != linked_from {
                debug!(
                    pid = self.report.pid,
                    offset = %node.offset,
                    parent = ?node.parent,
                    linked_from = ?linked_from,
                    "Parent link disagrees with traversal"
                );
            }

            if !node.is_well_formed() {
                warn!(
                    pid = self.report.pid,
                    offset = %node.offset,
                    start = %node.start,
                    end = %node.end,
                    "VAD node ends before it starts"
                );
                self.report.malformed.push(node.offset);
            }

            if depth + 1 >= self.limits.max_depth {
                if node.children().next().is_some() {
                    self.truncate(TruncationReason::DepthLimit {
                        offset: node.offset,
                        depth,
                    });
                }
            } else {
                // Right first so the left subtree is popped next
                if let Some(right) = node.right {
                    self.stack.push((right, Some(node.offset)));
                }
                if let Some(left) = node.left {
                    self.stack.push((left, Some(node.offset)));
                }
            }

            return Some(WalkEntry { node, depth });
        }

        self.finished = true;
        None
    }
}

/// Walks the tree rooted at `root`
pub fn walk<'a>(
    pid: ProcessId,
    root: Option<Address>,
    materializer: &'a dyn RecordMaterializer,
    limits: WalkLimits,
) -> VadWalker<'a> {
    VadWalker::new(pid, root, materializer, limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{MemorySnapshot, VadEntry};
    use pretty_assertions::assert_eq;

    fn offsets(entries: &[WalkEntry]) -> Vec<(u64, usize)> {
        entries
            .iter()
            .map(|e| (e.node.offset.as_u64(), e.depth))
            .collect()
    }

    #[test]
    fn test_null_root_is_empty() {
        let tree = MemorySnapshot::builder().build();
        let mut walker = walk(1, None, &tree, WalkLimits::default());
        assert!(walker.next().is_none());
        assert!(!walker.report().has_anomalies());

        let mut walker = walk(1, Some(Address::null()), &tree, WalkLimits::default());
        assert!(walker.next().is_none());
    }

    #[test]
    fn test_preorder_with_depths() {
        let tree = MemorySnapshot::builder()
            .vad(VadEntry::short_modern(0xa0, 0x1000, 0x1fff).left(0xb0))
            .vad(VadEntry::short_modern(0xb0, 0x2000, 0x2fff).parent(0xa0).right(0xc0))
            .vad(VadEntry::short_modern(0xc0, 0x3000, 0x3fff).parent(0xb0))
            .build();

        let entries: Vec<_> = walk(1, Some(Address::new(0xa0)), &tree, WalkLimits::default()).collect();
        assert_eq!(offsets(&entries), vec![(0xa0, 0), (0xb0, 1), (0xc0, 2)]);
    }

    #[test]
    fn test_left_subtree_before_right() {
        let tree = MemorySnapshot::builder()
            .vad(VadEntry::short_modern(0x10, 0x5000, 0x5fff).left(0x20).right(0x30))
            .vad(VadEntry::short_modern(0x20, 0x1000, 0x1fff).parent(0x10).left(0x40))
            .vad(VadEntry::short_modern(0x30, 0x9000, 0x9fff).parent(0x10))
            .vad(VadEntry::short_modern(0x40, 0x0000, 0x0fff).parent(0x20))
            .build();

        let entries: Vec<_> = walk(1, Some(Address::new(0x10)), &tree, WalkLimits::default()).collect();
        assert_eq!(
            offsets(&entries),
            vec![(0x10, 0), (0x20, 1), (0x40, 2), (0x30, 1)]
        );
    }

    #[test]
    fn test_corrupt_node_is_skipped() {
        let tree = MemorySnapshot::builder()
            .vad(VadEntry::short_modern(0x10, 0x5000, 0x5fff).left(0x20).right(0x30))
            .corrupt_vad(0x20)
            .vad(VadEntry::short_modern(0x30, 0x9000, 0x9fff).parent(0x10))
            .build();

        let mut walker = walk(7, Some(Address::new(0x10)), &tree, WalkLimits::default());
        let entries: Vec<_> = walker.by_ref().collect();
        assert_eq!(offsets(&entries), vec![(0x10, 0), (0x30, 1)]);

        let report = walker.report();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].offset, Address::new(0x20));
        assert!(!report.is_truncated());
    }

    #[test]
    fn test_self_referencing_root_terminates() {
        let tree = MemorySnapshot::builder()
            .vad(VadEntry::short_modern(0x10, 0x1000, 0x1fff).left(0x10))
            .build();

        let mut walker = walk(1, Some(Address::new(0x10)), &tree, WalkLimits::default());
        let entries: Vec<_> = walker.by_ref().collect();
        assert_eq!(offsets(&entries), vec![(0x10, 0)]);

        let report = walker.into_report();
        assert!(report.is_truncated());
        assert_eq!(
            report.truncations[0].reason,
            TruncationReason::Cycle {
                from: Address::new(0x10),
                to: Address::new(0x10)
            }
        );
        assert_eq!(report.truncations[0].visited, 1);
    }

    #[test]
    fn test_node_reached_twice_is_not_a_cycle() {
        // 0x20 and 0x30 are siblings that both point at 0x40
        let tree = MemorySnapshot::builder()
            .vad(VadEntry::short_modern(0x10, 0x5000, 0x5fff).left(0x20).right(0x30))
            .vad(VadEntry::short_modern(0x20, 0x1000, 0x1fff).parent(0x10).right(0x40))
            .vad(VadEntry::short_modern(0x30, 0x9000, 0x9fff).parent(0x10).left(0x40))
            .vad(VadEntry::short_modern(0x40, 0x3000, 0x3fff).parent(0x20))
            .build();

        let mut walker = walk(1, Some(Address::new(0x10)), &tree, WalkLimits::default());
        let entries: Vec<_> = walker.by_ref().collect();
        assert_eq!(
            offsets(&entries),
            vec![(0x10, 0), (0x20, 1), (0x40, 2), (0x30, 1)]
        );
        assert_eq!(
            walker.report().truncations,
            vec![Truncation {
                reason: TruncationReason::SharedNode {
                    from: Address::new(0x30),
                    to: Address::new(0x40)
                },
                visited: 4
            }]
        );
    }

    #[test]
    fn test_node_limit() {
        let tree = MemorySnapshot::builder()
            .vad(VadEntry::short_modern(0x10, 0x1000, 0x1fff).left(0x20))
            .vad(VadEntry::short_modern(0x20, 0x2000, 0x2fff).left(0x30))
            .vad(VadEntry::short_modern(0x30, 0x3000, 0x3fff))
            .build();
        let limits = WalkLimits {
            max_nodes: 2,
            max_depth: 128,
        };

        let mut walker = walk(1, Some(Address::new(0x10)), &tree, limits);
        assert_eq!(walker.by_ref().count(), 2);
        assert!(walker.next().is_none());
        assert_eq!(
            walker.report().truncations,
            vec![Truncation {
                reason: TruncationReason::NodeLimit { limit: 2 },
                visited: 2
            }]
        );
    }

    #[test]
    fn test_depth_limit() {
        let tree = MemorySnapshot::builder()
            .vad(VadEntry::short_modern(0x10, 0x1000, 0x1fff).left(0x20))
            .vad(VadEntry::short_modern(0x20, 0x2000, 0x2fff).left(0x30))
            .vad(VadEntry::short_modern(0x30, 0x3000, 0x3fff))
            .build();
        let limits = WalkLimits {
            max_nodes: 100,
            max_depth: 2,
        };

        let mut walker = walk(1, Some(Address::new(0x10)), &tree, limits);
        let entries: Vec<_> = walker.by_ref().collect();
        assert_eq!(offsets(&entries), vec![(0x10, 0), (0x20, 1)]);
        assert!(matches!(
            walker.report().truncations[0].reason,
            TruncationReason::DepthLimit { depth: 1, .. }
        ));
    }

    #[test]
    fn test_malformed_range_is_reported() {
        let tree = MemorySnapshot::builder()
            .vad(VadEntry::short_modern(0x10, 0x3000, 0x1fff))
            .build();

        let mut walker = walk(1, Some(Address::new(0x10)), &tree, WalkLimits::default());
        assert_eq!(walker.by_ref().count(), 1);
        assert_eq!(walker.report().malformed, vec![Address::new(0x10)]);
    }
}
