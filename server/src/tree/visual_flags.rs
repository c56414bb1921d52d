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

//! Per-node hidden / highlighted / label-shown / lantern-size state.
//!
//! Flags live in dense bitsets so a per-node lookup is O(1); highlighted and hidden nodes
//! are additionally tracked in an ordered set so that "unhighlight all" / "unhide all" cost
//! is O(|flagged|) rather than O(|tree|).

use super::node_id::NodeID;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct VisualFlags {
    hidden: Vec<bool>,
    highlighted: Vec<bool>,
    label_shown: Vec<bool>,
    lantern_size: Vec<Option<u8>>,
    hidden_set: BTreeSet<NodeID>,
    highlighted_set: BTreeSet<NodeID>,
}

impl VisualFlags {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_len(v: &mut Vec<bool>, n: NodeID) {
        if v.len() <= n.index() {
            v.resize(n.index() + 1, false);
        }
    }

    pub fn is_hidden(&self, n: NodeID) -> bool {
        self.hidden.get(n.index()).copied().unwrap_or(false)
    }

    pub fn set_hidden(&mut self, n: NodeID, hidden: bool) {
        Self::ensure_len(&mut self.hidden, n);
        self.hidden[n.index()] = hidden;
        if hidden {
            self.hidden_set.insert(n);
        } else {
            self.hidden_set.remove(&n);
        }
    }

    pub fn unhide_all(&mut self) {
        for n in std::mem::take(&mut self.hidden_set) {
            self.hidden[n.index()] = false;
        }
    }

    pub fn is_highlighted(&self, n: NodeID) -> bool {
        self.highlighted.get(n.index()).copied().unwrap_or(false)
    }

    pub fn set_highlighted(&mut self, n: NodeID, highlighted: bool) {
        Self::ensure_len(&mut self.highlighted, n);
        self.highlighted[n.index()] = highlighted;
        if highlighted {
            self.highlighted_set.insert(n);
        } else {
            self.highlighted_set.remove(&n);
        }
    }

    pub fn unhighlight_all(&mut self) {
        for n in std::mem::take(&mut self.highlighted_set) {
            self.highlighted[n.index()] = false;
        }
    }

    pub fn is_label_shown(&self, n: NodeID) -> bool {
        self.label_shown.get(n.index()).copied().unwrap_or(false)
    }

    pub fn set_label_shown(&mut self, n: NodeID, shown: bool) {
        Self::ensure_len(&mut self.label_shown, n);
        self.label_shown[n.index()] = shown;
    }

    pub fn lantern_size(&self, n: NodeID) -> Option<u8> {
        self.lantern_size.get(n.index()).copied().flatten()
    }

    pub fn set_lantern_size(&mut self, n: NodeID, size: Option<u8>) {
        if self.lantern_size.len() <= n.index() {
            self.lantern_size.resize(n.index() + 1, None);
        }
        self.lantern_size[n.index()] = size;
    }

    pub fn reset_lantern_sizes(&mut self) {
        self.lantern_size.clear();
    }

    pub fn hidden_nodes(&self) -> impl Iterator<Item = NodeID> + '_ {
        self.hidden_set.iter().copied()
    }

    pub fn highlighted_nodes(&self) -> impl Iterator<Item = NodeID> + '_ {
        self.highlighted_set.iter().copied()
    }
}
