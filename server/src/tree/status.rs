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

//! Node status classification, shared by the wire codec, the tree façade and persistence.

/// The status of a node as understood by the tree façade. `Undetermined` is the initial
/// status of a pre-allocated child slot; `Merged` is produced only by the merge engine
/// and never arrives over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeStatus {
    Solved = 0,
    Failed = 1,
    Branch = 2,
    Skipped = 3,
    Undetermined = 4,
    Merged = 5,
}

impl NodeStatus {
    /// Decode the one-byte wire representation. The wire never carries `Undetermined` or
    /// `Merged` (those are local-only statuses), but decoding is total over `u8` so that a
    /// malformed byte becomes a `MalformedFrame` at the call site rather than a panic here.
    pub fn from_wire(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Solved),
            1 => Some(Self::Failed),
            2 => Some(Self::Branch),
            3 => Some(Self::Skipped),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// A node is closed once it is known never to gain more open descendants: it is a
    /// leaf with a terminal status, or (checked separately, by the façade) all of its
    /// children are closed.
    #[inline]
    pub fn is_closing_leaf(self) -> bool {
        matches!(self, Self::Solved | Self::Failed | Self::Skipped)
    }

    #[inline]
    pub fn is_leaf_status(self) -> bool {
        matches!(
            self,
            Self::Solved | Self::Failed | Self::Skipped | Self::Undetermined
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip_for_defined_statuses() {
        for s in [
            NodeStatus::Solved,
            NodeStatus::Failed,
            NodeStatus::Branch,
            NodeStatus::Skipped,
        ] {
            assert_eq!(NodeStatus::from_wire(s.to_wire()), Some(s));
        }
    }

    #[test]
    fn undetermined_and_merged_never_appear_on_wire() {
        assert_eq!(NodeStatus::from_wire(4), None);
        assert_eq!(NodeStatus::from_wire(5), None);
    }
}
