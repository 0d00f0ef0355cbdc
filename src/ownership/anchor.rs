//! Anchor graph - strong edges from a handle to the handles it depends on
//!
//! The graph is type-erased (`dyn AnchorNode`) because a view and its owner
//! usually wrap different payload types. Edges are only ever added, so
//! rejecting cycles at insertion keeps the whole graph a DAG.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::HashSet;
use std::sync::Arc;

use super::HandleId;

/// Most handles anchor zero or one owner
pub(crate) type AnchorSet = SmallVec<[Arc<dyn AnchorNode>; 2]>;

/// Serializes check-then-insert so two threads cannot close a cycle between
/// them. Node locks are only taken briefly underneath it, never the reverse.
pub(super) static INSERTION_LOCK: Mutex<()> = Mutex::new(());

/// A vertex of the anchor graph
pub(crate) trait AnchorNode: Send + Sync {
    fn id(&self) -> HandleId;

    /// Direct anchors, copied out so no lock is held while walking
    fn anchor_snapshot(&self) -> AnchorSet;

    fn set_dangling(&self, dangling: bool);
}

/// Whether `target` is reachable from `start` through anchor edges
/// (`start` itself excluded)
pub(super) fn reaches(start: &dyn AnchorNode, target: HandleId) -> bool {
    let mut visited = HashSet::new();
    let mut stack: Vec<Arc<dyn AnchorNode>> = start.anchor_snapshot().into_vec();

    while let Some(node) = stack.pop() {
        let id = node.id();
        if id == target {
            return true;
        }
        if visited.insert(id) {
            stack.extend(node.anchor_snapshot());
        }
    }

    false
}

/// Mark every node reachable from `start` as dangling. Shared anchors are
/// visited once.
pub(super) fn dangle_reachable(start: &dyn AnchorNode) -> usize {
    let mut visited = HashSet::new();
    let mut stack: Vec<Arc<dyn AnchorNode>> = start.anchor_snapshot().into_vec();

    while let Some(node) = stack.pop() {
        if visited.insert(node.id()) {
            node.set_dangling(true);
            stack.extend(node.anchor_snapshot());
        }
    }

    visited.len()
}

/// Identities of every node reachable from `start`
pub(super) fn reachable_ids(start: &dyn AnchorNode) -> Vec<HandleId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut stack: Vec<Arc<dyn AnchorNode>> = start.anchor_snapshot().into_vec();

    while let Some(node) = stack.pop() {
        let id = node.id();
        if visited.insert(id) {
            order.push(id);
            stack.extend(node.anchor_snapshot());
        }
    }

    order
}
