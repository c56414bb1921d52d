/*
 * This file is a part of the cp-profiler server
 * Copyright (c) 2024, contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! The tree façade: the single mutex-guarded entry point onto one search tree.
//!
//! Owns the node store, per-node status/label, [`NodeStats`], [`VisualFlags`] and
//! [`SolverData`], and publishes [`StructureEvent`]s for subscribers (the layout engine,
//! eventually a UI) to react to. Everything here is reached through one [`parking_lot::Mutex`];
//! concurrent structural mutation and query both go through it, matching the source's single
//! tree-wide lock.

pub mod events;
pub mod namemap;
pub mod node_id;
pub mod shape;
pub mod solver_data;
pub mod stats;
pub mod status;
pub mod store;
pub mod visual_flags;

pub use events::{EventBus, EventKind, StructureEvent};
pub use node_id::{NodeID, SolverUID};
pub use solver_data::{Nogood, SolverData, UserData};
pub use stats::NodeStats;
pub use status::NodeStatus;
pub use store::{NodeStore, StoreError};
pub use visual_flags::VisualFlags;

use parking_lot::Mutex;
use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum TreeError {
    Store(StoreError),
    /// The tree already has a root; `create_root` may only be called once.
    RootAlreadyExists,
}

impl From<StoreError> for TreeError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "{e}"),
            Self::RootAlreadyExists => write!(f, "tree already has a root"),
        }
    }
}

impl std::error::Error for TreeError {}

pub type TreeResult<T> = Result<T, TreeError>;

struct Inner {
    store: NodeStore,
    status: Vec<NodeStatus>,
    label: Vec<String>,
    /// Self-inclusive: true once `n` and every descendant of `n` is closed. A `Branch` node
    /// with declared arity 0 (a timed-out open branch) never becomes true -- there is no
    /// child to ever close it.
    self_closed: Vec<bool>,
    has_solved_descendants: Vec<bool>,
    stats: NodeStats,
    flags: VisualFlags,
    solver_data: SolverData,
}

impl Inner {
    fn new() -> Self {
        Self {
            store: NodeStore::new(),
            status: Vec::new(),
            label: Vec::new(),
            self_closed: Vec::new(),
            has_solved_descendants: Vec::new(),
            stats: NodeStats::new(),
            flags: VisualFlags::new(),
            solver_data: SolverData::new(),
        }
    }

    /// Appends a fresh per-node slot with `status` already recorded in [`NodeStats`]. Every
    /// `NodeStore` append (root, promotion child, extra child) must be paired with exactly
    /// one call to this so the parallel vectors and the stats counters stay in sync.
    fn push_slot(&mut self, status: NodeStatus) {
        self.status.push(status);
        self.label.push(String::new());
        self.self_closed.push(false);
        self.has_solved_descendants.push(false);
        self.stats.record(status);
    }

    fn set_node(&mut self, n: NodeID, status: NodeStatus, label: Option<String>) {
        let old = self.status[n.index()];
        self.stats.unrecord(old);
        self.status[n.index()] = status;
        self.stats.record(status);
        if let Some(label) = label {
            self.label[n.index()] = label;
        }
    }

    fn close_up(&mut self, from: NodeID, bus: &EventBus) {
        self.self_closed[from.index()] = true;
        let mut cur = from;
        loop {
            let parent = self.store.parent_of(cur);
            if parent.is_no_node() {
                break;
            }
            if self.self_closed[parent.index()] {
                break;
            }
            let all_closed = self
                .store
                .children(parent)
                .all(|c| self.self_closed[c.index()]);
            if !all_closed {
                break;
            }
            self.self_closed[parent.index()] = true;
            bus.publish(StructureEvent {
                node: parent,
                kind: EventKind::SubtreeClosed,
            });
            cur = parent;
        }
    }

    fn mark_solved_up(&mut self, from: NodeID) {
        self.has_solved_descendants[from.index()] = true;
        let mut p = self.store.parent_of(from);
        while !p.is_no_node() {
            if self.has_solved_descendants[p.index()] {
                break;
            }
            self.has_solved_descendants[p.index()] = true;
            p = self.store.parent_of(p);
        }
    }

    fn propagate_after_set(&mut self, n: NodeID, status: NodeStatus, bus: &EventBus) {
        if status.is_closing_leaf() {
            self.close_up(n, bus);
        }
        if matches!(status, NodeStatus::Solved) {
            self.mark_solved_up(n);
        }
        bus.publish(StructureEvent {
            node: n,
            kind: EventKind::StructureUpdated,
        });
    }

    fn depth_of(&self, mut n: NodeID) -> u32 {
        let mut depth = 1;
        while !self.store.parent_of(n).is_no_node() {
            n = self.store.parent_of(n);
            depth += 1;
        }
        depth
    }
}

/// One search tree: structure, status, labels, stats, visual flags and solver-ingestion
/// data, all behind a single mutex. See module docs.
pub struct Tree {
    inner: Mutex<Inner>,
    events: EventBus,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            events: EventBus::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> crossbeam_channel::Receiver<StructureEvent> {
        self.events.subscribe()
    }

    /// `create_root(k)`: the tree's very first node. Fails if a root already exists.
    pub fn create_root(&self, k: usize, status: NodeStatus, label: String) -> TreeResult<NodeID> {
        let mut inner = self.inner.lock();
        if inner.store.node_count() != 0 {
            return Err(TreeError::RootAlreadyExists);
        }
        let root = inner.store.create_root(k);
        inner.push_slot(NodeStatus::Undetermined);
        for _ in 0..k {
            inner.push_slot(NodeStatus::Undetermined);
        }
        inner.set_node(root, status, Some(label));
        inner.stats.observe_depth(inner.depth_of(root));
        inner.propagate_after_set(root, status, &self.events);
        if k > 0 {
            self.events.publish(StructureEvent {
                node: root,
                kind: EventKind::ChildrenStructureChanged,
            });
        }
        Ok(root)
    }

    /// The central ingest operation: promote the existing `UNDETERMINED` child at
    /// `(parent, alt)` to `status`, attaching `label` and, if `k>0`, `k` freshly allocated
    /// `UNDETERMINED` children.
    pub fn promote_node(
        &self,
        parent: NodeID,
        alt: usize,
        k: usize,
        status: NodeStatus,
        label: String,
    ) -> TreeResult<NodeID> {
        let mut inner = self.inner.lock();
        let child = inner.store.promote(parent, alt, k)?;
        for _ in 0..k {
            inner.push_slot(NodeStatus::Undetermined);
        }
        inner.set_node(child, status, Some(label));
        let depth = inner.depth_of(child);
        inner.stats.observe_depth(depth);
        inner.propagate_after_set(child, status, &self.events);
        if k > 0 {
            self.events.publish(StructureEvent {
                node: child,
                kind: EventKind::ChildrenStructureChanged,
            });
        }
        Ok(child)
    }

    /// Appends one more child slot to `parent`. Used for the implicit restart super-root
    /// and, row by row, by the offline persistence loader.
    pub fn add_extra_child(&self, parent: NodeID) -> NodeID {
        let mut inner = self.inner.lock();
        let child = inner.store.append_child(parent);
        inner.push_slot(NodeStatus::Undetermined);
        self.events.publish(StructureEvent {
            node: parent,
            kind: EventKind::ChildrenStructureChanged,
        });
        child
    }

    /// Offline root creation used by the persistence loader: unlike [`Tree::create_root`],
    /// no children are pre-allocated -- every row in the `Nodes` table explicitly creates
    /// one node.
    pub fn offline_create_root(&self, status: NodeStatus, label: String) -> NodeID {
        let mut inner = self.inner.lock();
        let root = inner.store.offline_create_root();
        inner.push_slot(status);
        inner.label[root.index()] = label;
        inner.stats.observe_depth(1);
        root
    }

    /// Offline add-child, paired with [`Tree::offline_create_root`]: appends one child of
    /// `parent` with its final status and label already known (no auto-allocation).
    pub fn offline_add_child(&self, parent: NodeID, status: NodeStatus, label: String) -> NodeID {
        let mut inner = self.inner.lock();
        let child = inner.store.append_child(parent);
        inner.push_slot(status);
        inner.label[child.index()] = label;
        let depth = inner.depth_of(child);
        inner.stats.observe_depth(depth);
        inner.propagate_after_set(child, status, &self.events);
        child
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().store.node_count()
    }

    pub fn parent_of(&self, n: NodeID) -> NodeID {
        self.inner.lock().store.parent_of(n)
    }

    pub fn alt_of(&self, n: NodeID) -> i32 {
        self.inner.lock().store.alt_of(n)
    }

    pub fn children_count(&self, n: NodeID) -> usize {
        self.inner.lock().store.children_count(n)
    }

    pub fn children_vec(&self, n: NodeID) -> Vec<NodeID> {
        self.inner.lock().store.children_vec(n)
    }

    pub fn get_child(&self, parent: NodeID, alt: usize) -> Result<NodeID, StoreError> {
        self.inner.lock().store.get_child(parent, alt)
    }

    pub fn status_of(&self, n: NodeID) -> NodeStatus {
        self.inner.lock().status[n.index()]
    }

    pub fn label_of(&self, n: NodeID) -> String {
        self.inner.lock().label[n.index()].clone()
    }

    pub fn has_solved_descendants(&self, n: NodeID) -> bool {
        self.inner.lock().has_solved_descendants[n.index()]
    }

    pub fn has_open_descendants(&self, n: NodeID) -> bool {
        let inner = self.inner.lock();
        inner.store.children(n).any(|c| !inner.self_closed[c.index()])
    }

    pub fn stats(&self) -> NodeStats {
        self.inner.lock().stats
    }

    // -- visual flags --

    pub fn is_hidden(&self, n: NodeID) -> bool {
        self.inner.lock().flags.is_hidden(n)
    }

    pub fn set_hidden(&self, n: NodeID, hidden: bool) {
        self.inner.lock().flags.set_hidden(n, hidden);
        self.notify_shape_change(n);
    }

    pub fn unhide_all(&self) {
        let mut inner = self.inner.lock();
        let touched: Vec<NodeID> = inner.flags.hidden_nodes().collect();
        inner.flags.unhide_all();
        drop(inner);
        for n in touched {
            self.notify_shape_change(n);
        }
    }

    pub fn is_highlighted(&self, n: NodeID) -> bool {
        self.inner.lock().flags.is_highlighted(n)
    }

    pub fn set_highlighted(&self, n: NodeID, highlighted: bool) {
        self.inner.lock().flags.set_highlighted(n, highlighted);
    }

    pub fn unhighlight_all(&self) {
        self.inner.lock().flags.unhighlight_all();
    }

    pub fn is_label_shown(&self, n: NodeID) -> bool {
        self.inner.lock().flags.is_label_shown(n)
    }

    pub fn set_label_shown(&self, n: NodeID, shown: bool) {
        self.inner.lock().flags.set_label_shown(n, shown);
        self.notify_shape_change(n);
    }

    pub fn lantern_size(&self, n: NodeID) -> Option<u8> {
        self.inner.lock().flags.lantern_size(n)
    }

    pub fn set_lantern_size(&self, n: NodeID, size: Option<u8>) {
        self.inner.lock().flags.set_lantern_size(n, size);
        self.notify_shape_change(n);
    }

    fn notify_shape_change(&self, n: NodeID) {
        self.events.publish(StructureEvent {
            node: n,
            kind: EventKind::VisualFlagChanged,
        });
    }

    // -- solver data, mutated by the builder while holding this same mutex --

    pub fn record_uid(&self, uid: SolverUID, nid: NodeID) {
        self.inner.lock().solver_data.record_uid(uid, nid);
    }

    pub fn nid_for_uid(&self, uid: SolverUID) -> Option<NodeID> {
        self.inner.lock().solver_data.nid_for_uid(uid)
    }

    pub fn set_nogood(&self, n: NodeID, original: String, renamed: Option<String>) {
        self.inner.lock().solver_data.set_nogood(n, original, renamed);
    }

    pub fn nogood(&self, n: NodeID) -> Option<Nogood> {
        self.inner.lock().solver_data.nogood(n).cloned()
    }

    pub fn set_info(&self, n: NodeID, info: String) {
        self.inner.lock().solver_data.set_info(n, info);
    }

    pub fn info(&self, n: NodeID) -> Option<String> {
        self.inner.lock().solver_data.info(n).map(str::to_owned)
    }

    /// Every recorded nogood's original text, for `--save_execution`. See
    /// [`SolverData::nogoods_vec`] for why the renamed variant isn't persisted separately.
    pub fn nogoods_vec(&self) -> Vec<(NodeID, String)> {
        self.inner.lock().solver_data.nogoods_vec()
    }

    pub fn info_vec(&self) -> Vec<(NodeID, String)> {
        self.inner.lock().solver_data.info_vec()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_failed_root_has_depth_one_and_one_failed() {
        let tree = Tree::new();
        let root = tree
            .create_root(0, NodeStatus::Failed, String::new())
            .unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.status_of(root), NodeStatus::Failed);
        let stats = tree.stats();
        assert_eq!(stats.max_depth, 1);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn binary_tree_depth_two_closes_root_exactly_once() {
        let tree = Tree::new();
        let rx = tree.subscribe();
        let root = tree
            .create_root(2, NodeStatus::Branch, String::new())
            .unwrap();
        tree.promote_node(root, 0, 0, NodeStatus::Failed, String::new())
            .unwrap();
        tree.promote_node(root, 1, 0, NodeStatus::Solved, String::new())
            .unwrap();

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.stats().max_depth, 2);
        assert!(tree.has_solved_descendants(root));
        assert!(!tree.has_open_descendants(root));

        let closed: Vec<_> = rx
            .try_iter()
            .filter(|e| e.kind == EventKind::SubtreeClosed)
            .collect();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].node, root);
    }

    #[test]
    fn zero_arity_branch_never_closes() {
        let tree = Tree::new();
        let root = tree
            .create_root(1, NodeStatus::Branch, String::new())
            .unwrap();
        let child = tree
            .promote_node(root, 0, 0, NodeStatus::Branch, String::new())
            .unwrap();
        // child is BRANCH with 0 kids: a timed-out open branch. It never closes, so
        // root.has_open_descendants must remain true forever.
        assert!(tree.has_open_descendants(root));
        let _ = child;
    }

    #[test]
    fn restart_super_root_grows_through_add_extra_child() {
        let tree = Tree::new();
        let super_root = tree
            .create_root(0, NodeStatus::Branch, String::new())
            .unwrap();
        let c0 = tree.add_extra_child(super_root);
        let c1 = tree.add_extra_child(super_root);
        tree.promote_node(super_root, 0, 0, NodeStatus::Failed, String::new())
            .unwrap();
        tree.promote_node(super_root, 1, 0, NodeStatus::Failed, String::new())
            .unwrap();
        assert_eq!(tree.children_vec(super_root), vec![c0, c1]);
        assert!(!tree.has_open_descendants(super_root));
    }

    #[test]
    fn duplicate_promotion_is_rejected_and_state_preserved() {
        let tree = Tree::new();
        let root = tree
            .create_root(1, NodeStatus::Branch, String::new())
            .unwrap();
        tree.promote_node(root, 0, 2, NodeStatus::Branch, String::new())
            .unwrap();
        let err = tree
            .promote_node(root, 0, 1, NodeStatus::Branch, String::new())
            .unwrap_err();
        assert!(matches!(err, TreeError::Store(StoreError::AlreadyPromoted(_))));
        assert_eq!(tree.node_count(), 4);
    }
}
