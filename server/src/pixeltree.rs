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

//! `--save_pixel_tree`: a compressed overview image of a completed tree, using only the
//! layout-independent data the pixel/icicle canvases need (node creation order, depth,
//! status) -- the canvases themselves, and everything about how they're painted, are out
//! of this core's scope.
//!
//! One column per `compression` creation-order-consecutive nodes, one row per depth. A
//! compressed cell holds the "most interesting" status among the nodes it summarizes, by
//! the priority `SOLVED > FAILED > BRANCH > SKIPPED > MERGED > UNDETERMINED` -- a solved
//! node anywhere in a compressed bucket should never be hidden behind an open branch next
//! to it.

use crate::tree::node_id::NodeID;
use crate::tree::status::NodeStatus;
use crate::tree::Tree;
use std::io::{self, Write};

fn priority(status: NodeStatus) -> u8 {
    match status {
        NodeStatus::Solved => 5,
        NodeStatus::Failed => 4,
        NodeStatus::Branch => 3,
        NodeStatus::Skipped => 2,
        NodeStatus::Merged => 1,
        NodeStatus::Undetermined => 0,
    }
}

fn depth_of(tree: &Tree, mut n: NodeID) -> usize {
    let mut depth = 0;
    loop {
        let p = tree.parent_of(n);
        if p.is_no_node() {
            return depth;
        }
        n = p;
        depth += 1;
    }
}

/// Render `tree` into a `width x height` grid of status-priority bytes, `compression`
/// creation-order nodes per column, and write it as a tiny self-describing binary blob:
/// 4-byte big-endian `width`, `height`, `compression`, then `width * height` status bytes
/// in row-major order (row 0 = the root's depth).
pub fn write_pixel_tree<W: Write>(out: &mut W, tree: &Tree, compression: u32) -> io::Result<()> {
    let compression = compression.max(1) as usize;
    let node_count = tree.node_count();
    if node_count == 0 {
        return write_header(out, 0, 0, compression as u32);
    }

    let depths: Vec<usize> = (0..node_count)
        .map(|raw| depth_of(tree, NodeID::from(raw)))
        .collect();
    let height = depths.iter().max().copied().unwrap_or(0) + 1;
    let width = (node_count + compression - 1) / compression;

    let mut grid = vec![0u8; width * height];
    for raw in 0..node_count {
        let n = NodeID::from(raw);
        let col = raw / compression;
        let row = depths[raw];
        let p = priority(tree.status_of(n));
        let cell = &mut grid[row * width + col];
        if p > *cell {
            *cell = p;
        }
    }

    write_header(out, width as u32, height as u32, compression as u32)?;
    out.write_all(&grid)
}

fn write_header<W: Write>(out: &mut W, width: u32, height: u32, compression: u32) -> io::Result<()> {
    out.write_all(&width.to_be_bytes())?;
    out.write_all(&height.to_be_bytes())?;
    out.write_all(&compression.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(buf: &[u8]) -> (u32, u32, u32) {
        (
            u32::from_be_bytes(buf[0..4].try_into().unwrap()),
            u32::from_be_bytes(buf[4..8].try_into().unwrap()),
            u32::from_be_bytes(buf[8..12].try_into().unwrap()),
        )
    }

    #[test]
    fn empty_tree_writes_zero_sized_header_only() {
        let tree = Tree::new();
        let mut buf = Vec::new();
        write_pixel_tree(&mut buf, &tree, 2).unwrap();
        assert_eq!(header(&buf), (0, 0, 2));
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn single_node_tree_is_a_one_by_one_grid() {
        let tree = Tree::new();
        tree.create_root(0, NodeStatus::Solved, String::new()).unwrap();
        let mut buf = Vec::new();
        write_pixel_tree(&mut buf, &tree, 4).unwrap();
        let (w, h, c) = header(&buf);
        assert_eq!((w, h, c), (1, 1, 4));
        assert_eq!(buf[12], priority(NodeStatus::Solved));
    }

    #[test]
    fn solved_wins_priority_within_a_compressed_column() {
        let tree = Tree::new();
        let root = tree.create_root(2, NodeStatus::Branch, String::new()).unwrap();
        tree.promote_node(root, 0, 0, NodeStatus::Failed, String::new()).unwrap();
        tree.promote_node(root, 1, 0, NodeStatus::Solved, String::new()).unwrap();

        let mut buf = Vec::new();
        // compress all 3 nodes into one column so the two leaves share a cell with root.
        write_pixel_tree(&mut buf, &tree, 3).unwrap();
        let (w, h, _) = header(&buf);
        assert_eq!((w, h), (1, 2));
        let grid = &buf[12..];
        // row 1 holds both leaves compressed into column 0: SOLVED must win over FAILED.
        assert_eq!(grid[1 * w as usize], priority(NodeStatus::Solved));
    }

    #[test]
    fn zero_compression_factor_is_treated_as_one() {
        let tree = Tree::new();
        tree.create_root(0, NodeStatus::Failed, String::new()).unwrap();
        let mut buf = Vec::new();
        write_pixel_tree(&mut buf, &tree, 0).unwrap();
        let (_, _, c) = header(&buf);
        assert_eq!(c, 1);
    }
}
