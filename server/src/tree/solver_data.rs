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

//! Ingestion-side data keyed by [`NodeID`], mutated only by the builder while it holds the
//! tree mutex: the solver UID map, per-node nogoods (original and name-substituted) and
//! per-node JSON info blobs.

use super::node_id::{NodeID, SolverUID};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Nogood {
    pub original: String,
    pub renamed: Option<String>,
}

#[derive(Debug, Default)]
pub struct SolverData {
    uid_to_nid: HashMap<SolverUID, NodeID>,
    nogoods: HashMap<NodeID, Nogood>,
    info: HashMap<NodeID, String>,
}

impl SolverData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_uid(&mut self, uid: SolverUID, nid: NodeID) {
        self.uid_to_nid.insert(uid, nid);
    }

    pub fn nid_for_uid(&self, uid: SolverUID) -> Option<NodeID> {
        self.uid_to_nid.get(&uid).copied()
    }

    pub fn set_nogood(&mut self, n: NodeID, original: String, renamed: Option<String>) {
        self.nogoods.insert(n, Nogood { original, renamed });
    }

    pub fn nogood(&self, n: NodeID) -> Option<&Nogood> {
        self.nogoods.get(&n)
    }

    pub fn set_info(&mut self, n: NodeID, info: String) {
        self.info.insert(n, info);
    }

    pub fn info(&self, n: NodeID) -> Option<&str> {
        self.info.get(&n).map(String::as_str)
    }

    /// Every recorded nogood's original text, for persistence. The renamed variant is a
    /// derived view (original + the name map in force at ingest time) and is not itself
    /// persisted -- reloading replays substitution against whatever name map is active then.
    pub fn nogoods_vec(&self) -> Vec<(NodeID, String)> {
        self.nogoods
            .iter()
            .map(|(&n, g)| (n, g.original.clone()))
            .collect()
    }

    pub fn info_vec(&self) -> Vec<(NodeID, String)> {
        self.info.iter().map(|(&n, s)| (n, s.clone())).collect()
    }
}

/// Currently selected node plus a sparse node -> bookmark-text mapping. Unlike
/// [`SolverData`], this is user-driven state and is not required to share the tree mutex.
#[derive(Debug, Default)]
pub struct UserData {
    selected: Option<NodeID>,
    bookmarks: HashMap<NodeID, String>,
}

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<NodeID> {
        self.selected
    }

    pub fn select(&mut self, n: Option<NodeID>) {
        self.selected = n;
    }

    pub fn set_bookmark(&mut self, n: NodeID, text: String) {
        self.bookmarks.insert(n, text);
    }

    pub fn clear_bookmark(&mut self, n: NodeID) {
        self.bookmarks.remove(&n);
    }

    pub fn bookmark(&self, n: NodeID) -> Option<&str> {
        self.bookmarks.get(&n).map(String::as_str)
    }

    pub fn bookmarks(&self) -> impl Iterator<Item = (NodeID, &str)> {
        self.bookmarks.iter().map(|(&n, s)| (n, s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_map_roundtrips() {
        let mut sd = SolverData::new();
        let uid = SolverUID::new(1, 0, 0);
        sd.record_uid(uid, NodeID::from(5usize));
        assert_eq!(sd.nid_for_uid(uid), Some(NodeID::from(5usize)));
        assert_eq!(sd.nid_for_uid(SolverUID::new(2, 0, 0)), None);
    }

    #[test]
    fn bookmarks_are_sparse() {
        let mut ud = UserData::new();
        let n = NodeID::from(1usize);
        assert_eq!(ud.bookmark(n), None);
        ud.set_bookmark(n, "checkpoint".into());
        assert_eq!(ud.bookmark(n), Some("checkpoint"));
        ud.clear_bookmark(n);
        assert_eq!(ud.bookmark(n), None);
    }
}
