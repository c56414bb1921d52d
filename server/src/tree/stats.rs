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

//! Running counts of each status class plus the max observed depth.

use super::status::NodeStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub solved: u64,
    pub failed: u64,
    pub branch: u64,
    pub skipped: u64,
    pub undetermined: u64,
    pub merged: u64,
    pub max_depth: u32,
}

impl NodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, status: NodeStatus) {
        match status {
            NodeStatus::Solved => self.solved += 1,
            NodeStatus::Failed => self.failed += 1,
            NodeStatus::Branch => self.branch += 1,
            NodeStatus::Skipped => self.skipped += 1,
            NodeStatus::Undetermined => self.undetermined += 1,
            NodeStatus::Merged => self.merged += 1,
        }
    }

    pub fn unrecord(&mut self, status: NodeStatus) {
        match status {
            NodeStatus::Solved => self.solved -= 1,
            NodeStatus::Failed => self.failed -= 1,
            NodeStatus::Branch => self.branch -= 1,
            NodeStatus::Skipped => self.skipped -= 1,
            NodeStatus::Undetermined => self.undetermined -= 1,
            NodeStatus::Merged => self.merged -= 1,
        }
    }

    pub fn observe_depth(&mut self, depth: u32) {
        self.max_depth = self.max_depth.max(depth);
    }

    pub fn total(&self) -> u64 {
        self.solved + self.failed + self.branch + self.skipped + self.undetermined + self.merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_only_tree_has_depth_one() {
        let mut s = NodeStats::new();
        s.record(NodeStatus::Failed);
        s.observe_depth(1);
        assert_eq!(s.max_depth, 1);
        assert_eq!(s.failed, 1);
        assert_eq!(s.total(), 1);
    }

    #[test]
    fn promote_replaces_undetermined_with_final_status() {
        let mut s = NodeStats::new();
        s.record(NodeStatus::Undetermined);
        s.unrecord(NodeStatus::Undetermined);
        s.record(NodeStatus::Solved);
        assert_eq!(s.undetermined, 0);
        assert_eq!(s.solved, 1);
    }
}
