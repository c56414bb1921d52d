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

//! Arity-tagged parent/children storage over dense [`NodeID`]s.
//!
//! The source fits a node's children into the low bits of a tagged pointer. We don't have
//! (or want) raw pointer tagging in safe Rust, but the same idea -- avoid a `Vec<NodeID>`
//! allocation for the overwhelmingly common zero/one/two-child cases -- is expressed as an
//! enum. The invariant that matters, carried over unchanged: once a node is promoted to
//! arity k>0, the IDs of its k children never move again.

use super::node_id::NodeID;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Children {
    Leaf,
    One(NodeID),
    Two(NodeID, NodeID),
    Many(Vec<NodeID>),
}

impl Children {
    fn len(&self) -> usize {
        match self {
            Children::Leaf => 0,
            Children::One(_) => 1,
            Children::Two(..) => 2,
            Children::Many(v) => v.len(),
        }
    }

    fn get(&self, alt: usize) -> Option<NodeID> {
        match self {
            Children::Leaf => None,
            Children::One(a) => (alt == 0).then_some(*a),
            Children::Two(a, b) => match alt {
                0 => Some(*a),
                1 => Some(*b),
                _ => None,
            },
            Children::Many(v) => v.get(alt).copied(),
        }
    }

    fn push(&mut self, id: NodeID) {
        *self = match std::mem::replace(self, Children::Leaf) {
            Children::Leaf => Children::One(id),
            Children::One(a) => Children::Two(a, id),
            Children::Two(a, b) => Children::Many(vec![a, b, id]),
            Children::Many(mut v) => {
                v.push(id);
                Children::Many(v)
            }
        };
    }

    fn iter(&self) -> impl Iterator<Item = NodeID> + '_ {
        let slice: &[NodeID] = match self {
            Children::Leaf => &[],
            Children::One(a) => std::slice::from_ref(a),
            Children::Two(a, b) => {
                // SAFETY-free path: (a, b) aren't contiguous, so we materialize via a tiny
                // match-driven iterator instead of `from_ref` games.
                return ChildrenIter::Pair([*a, *b], 0);
            }
            Children::Many(v) => v.as_slice(),
        };
        ChildrenIter::Slice(slice.iter())
    }
}

enum ChildrenIter<'a> {
    Slice(std::slice::Iter<'a, NodeID>),
    Pair([NodeID; 2], usize),
}

impl<'a> Iterator for ChildrenIter<'a> {
    type Item = NodeID;
    fn next(&mut self) -> Option<NodeID> {
        match self {
            ChildrenIter::Slice(it) => it.next().copied(),
            ChildrenIter::Pair(arr, i) => {
                if *i < 2 {
                    let v = arr[*i];
                    *i += 1;
                    Some(v)
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct NodeRecord {
    parent: NodeID,
    alt: i32,
    children: Children,
}

#[derive(Debug, PartialEq, Eq)]
pub enum StoreError {
    /// `promote` was called on a child that already has nonzero arity.
    AlreadyPromoted(NodeID),
    /// A structural query referenced an ID outside the store.
    NoSuchNode(NodeID),
    /// `get_child` was asked for an `alt` beyond the node's declared arity.
    AltOutOfRange { parent: NodeID, alt: usize },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyPromoted(n) => write!(f, "node {n} was already promoted"),
            Self::NoSuchNode(n) => write!(f, "no such node: {n}"),
            Self::AltOutOfRange { parent, alt } => {
                write!(f, "alt {alt} out of range for node {parent}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// The structural half of a tree: parent pointers and arity-tagged children, nothing else.
/// Status, labels and stats live one layer up, in the tree façade, indexed by the same
/// [`NodeID`] space.
#[derive(Debug, Default)]
pub struct NodeStore {
    records: Vec<NodeRecord>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            records: Vec::with_capacity(cap),
        }
    }

    pub fn node_count(&self) -> usize {
        self.records.len()
    }

    fn push_record(&mut self, parent: NodeID, alt: i32) -> NodeID {
        let id = NodeID::from(self.records.len());
        self.records.push(NodeRecord {
            parent,
            alt,
            children: Children::Leaf,
        });
        id
    }

    /// Allocate `k` freshly-created `Leaf` children under `parent`, in order, returning
    /// their IDs. Does not touch `parent`'s own record -- the caller wires that up.
    fn alloc_slots(&mut self, parent: NodeID, k: usize) -> Vec<NodeID> {
        (0..k)
            .map(|alt| self.push_record(parent, alt as i32))
            .collect()
    }

    fn set_children(&mut self, n: NodeID, ids: Vec<NodeID>) {
        let children = match ids.len() {
            0 => Children::Leaf,
            1 => Children::One(ids[0]),
            2 => Children::Two(ids[0], ids[1]),
            _ => Children::Many(ids),
        };
        self.records[n.index()].children = children;
    }

    /// `create_root(k)`: appends the root (parent = NoNode, alt = -1) with `k` freshly
    /// allocated `Undetermined` child slots. Only valid as the very first call on a store.
    pub fn create_root(&mut self, k: usize) -> NodeID {
        debug_assert!(self.records.is_empty(), "create_root called on a non-empty store");
        let root = self.push_record(NodeID::NO_NODE, -1);
        let kids = self.alloc_slots(root, k);
        self.set_children(root, kids);
        root
    }

    /// Bare root creation with no pre-allocated children, used by the offline persistence
    /// loader, which explicitly creates every node (including children) as its own row.
    pub fn offline_create_root(&mut self) -> NodeID {
        debug_assert!(self.records.is_empty(), "offline_create_root on a non-empty store");
        self.push_record(NodeID::NO_NODE, -1)
    }

    /// `promote(parent, alt, k)`: returns the existing child at `(parent, alt)`, allocating
    /// `k` new `Undetermined` children for it. Fails if that child was already promoted.
    pub fn promote(&mut self, parent: NodeID, alt: usize, k: usize) -> StoreResult<NodeID> {
        let child = self.get_child(parent, alt)?;
        if self.records[child.index()].children.len() != 0 {
            return Err(StoreError::AlreadyPromoted(child));
        }
        if k > 0 {
            let kids = self.alloc_slots(child, k);
            self.set_children(child, kids);
        }
        Ok(child)
    }

    /// Appends one more child slot to `parent`, growing its arity class as needed. Used
    /// both for the implicit restart super-root (`add_extra_child`) and, row by row, by the
    /// offline persistence loader (`db_add_child`) -- both just want "one more child, in
    /// order", so they share this one operation.
    pub fn append_child(&mut self, parent: NodeID) -> NodeID {
        let child = self.push_record(parent, self.children_count(parent) as i32);
        self.records[parent.index()].children.push(child);
        child
    }

    pub fn get_child(&self, parent: NodeID, alt: usize) -> StoreResult<NodeID> {
        self.records
            .get(parent.index())
            .ok_or(StoreError::NoSuchNode(parent))?
            .children
            .get(alt)
            .ok_or(StoreError::AltOutOfRange { parent, alt })
    }

    pub fn parent_of(&self, n: NodeID) -> NodeID {
        self.records[n.index()].parent
    }

    pub fn alt_of(&self, n: NodeID) -> i32 {
        self.records[n.index()].alt
    }

    pub fn children_count(&self, n: NodeID) -> usize {
        self.records[n.index()].children.len()
    }

    pub fn children(&self, n: NodeID) -> impl Iterator<Item = NodeID> + '_ {
        self.records[n.index()].children.iter()
    }

    pub fn children_vec(&self, n: NodeID) -> Vec<NodeID> {
        self.children(n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_root_allocates_k_children() {
        let mut s = NodeStore::new();
        let root = s.create_root(3);
        assert_eq!(root, NodeID::from(0usize));
        assert_eq!(s.children_count(root), 3);
        for alt in 0..3 {
            let child = s.get_child(root, alt).unwrap();
            assert_eq!(s.parent_of(child), root);
            assert_eq!(s.alt_of(child), alt as i32);
            assert_eq!(s.children_count(child), 0);
        }
    }

    #[test]
    fn root_only_tree_has_zero_children() {
        let mut s = NodeStore::new();
        let root = s.create_root(0);
        assert_eq!(s.children_count(root), 0);
        assert_eq!(s.node_count(), 1);
    }

    #[test]
    fn promote_allocates_grandchildren_and_is_idempotent_guarded() {
        let mut s = NodeStore::new();
        let root = s.create_root(2);
        let c0 = s.get_child(root, 0).unwrap();
        let promoted = s.promote(root, 0, 2).unwrap();
        assert_eq!(promoted, c0);
        assert_eq!(s.children_count(c0), 2);
        // promoting again must fail: c0 already has nonzero arity
        assert_eq!(s.promote(root, 0, 1), Err(StoreError::AlreadyPromoted(c0)));
    }

    #[test]
    fn append_child_grows_through_every_arity_class() {
        let mut s = NodeStore::new();
        let root = s.create_root(0);
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(s.append_child(root));
        }
        assert_eq!(s.children_count(root), 5);
        assert_eq!(s.children_vec(root), ids);
        for (alt, id) in ids.iter().enumerate() {
            assert_eq!(s.alt_of(*id), alt as i32);
        }
    }

    #[test]
    fn offline_load_path_mirrors_append_child() {
        let mut s = NodeStore::new();
        let root = s.offline_create_root();
        assert_eq!(s.children_count(root), 0);
        let c0 = s.append_child(root);
        let c1 = s.append_child(root);
        assert_eq!(s.children_vec(root), vec![c0, c1]);
    }

    #[test]
    fn alt_out_of_range_is_reported() {
        let mut s = NodeStore::new();
        let root = s.create_root(1);
        assert_eq!(
            s.get_child(root, 5),
            Err(StoreError::AltOutOfRange { parent: root, alt: 5 })
        );
    }
}
