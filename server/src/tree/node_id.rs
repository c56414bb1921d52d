/*
 * This file is a part of the cp-profiler server
 * Copyright (c) 2020, Sayan Nandan <ohsayan@outlook.com>
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

//! Dense integer node handles, unique within one tree.

use std::fmt;

/// A dense integer handle into a single tree's node store.
///
/// IDs are assigned strictly in creation order, starting at 0 for the root. The reserved
/// sentinel [`NodeID::NO_NODE`] stands in for "no such node" (an absent parent, an
/// unset child slot) instead of `Option<NodeID>` so that node records stay a fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeID(i32);

impl NodeID {
    pub const NO_NODE: NodeID = NodeID(-1);

    #[inline]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn is_no_node(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn index(self) -> usize {
        debug_assert!(!self.is_no_node(), "index() called on NoNode");
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl Default for NodeID {
    fn default() -> Self {
        Self::NO_NODE
    }
}

impl From<usize> for NodeID {
    fn from(idx: usize) -> Self {
        Self(idx as i32)
    }
}

impl From<i32> for NodeID {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_no_node() {
            write!(f, "NoNode")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// The solver-supplied identifier triplet `(nid, rid, tid)`. Not unique across executions;
/// meaningful only during ingestion, where it is translated into a [`NodeID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SolverUID {
    pub nid: i32,
    pub rid: i32,
    pub tid: i32,
}

impl SolverUID {
    pub const fn new(nid: i32, rid: i32, tid: i32) -> Self {
        Self { nid, rid, tid }
    }

    /// The sentinel UID sent as a NODE message's `parent_uid` for a root node.
    #[inline]
    pub const fn is_sentinel(self) -> bool {
        self.nid == -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_node_is_negative() {
        assert!(NodeID::NO_NODE.is_no_node());
        assert!(!NodeID::from(0usize).is_no_node());
    }

    #[test]
    fn sentinel_uid_detected_by_nid_only() {
        assert!(SolverUID::new(-1, -1, -1).is_sentinel());
        assert!(SolverUID::new(-1, 4, 9).is_sentinel());
        assert!(!SolverUID::new(0, -1, -1).is_sentinel());
    }
}
