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

//! `--save_search`: a write-only textual export of a tree, distinct from the relational
//! database format. One line per non-skipped, non-undetermined node, pre-order:
//!
//! ```text
//! <node_id> <children_count_logged>[ stop][ <child_id> <child_label>]*
//! ```
//!
//! `stop` marks a `BRANCH` node with zero actual children (a timed-out open branch).
//! `SKIPPED`/`UNDETERMINED` children are omitted entirely and do not count toward
//! `children_count_logged`. Nothing reads this format back; it is consumed by external
//! tooling only.

use crate::tree::node_id::NodeID;
use crate::tree::status::NodeStatus;
use crate::tree::Tree;
use std::io::{self, Write};

fn loggable_children(tree: &Tree, n: NodeID) -> Vec<NodeID> {
    tree.children_vec(n)
        .into_iter()
        .filter(|&c| !matches!(tree.status_of(c), NodeStatus::Skipped | NodeStatus::Undetermined))
        .collect()
}

fn write_node<W: Write>(out: &mut W, tree: &Tree, n: NodeID) -> io::Result<()> {
    let status = tree.status_of(n);
    if matches!(status, NodeStatus::Skipped | NodeStatus::Undetermined) {
        return Ok(());
    }
    let children = loggable_children(tree, n);
    write!(out, "{} {}", n.raw(), children.len())?;
    if status == NodeStatus::Branch && children.is_empty() {
        write!(out, " stop")?;
    }
    for &c in &children {
        write!(out, " {} {}", c.raw(), tree.label_of(c))?;
    }
    writeln!(out)?;
    for &c in &children {
        write_node(out, tree, c)?;
    }
    Ok(())
}

/// Write `tree`'s search log to `out`, pre-order from the root. A no-op (produces no
/// output) if the tree is empty.
pub fn write_search_log<W: Write>(out: &mut W, tree: &Tree) -> io::Result<()> {
    if tree.node_count() == 0 {
        return Ok(());
    }
    write_node(out, tree, NodeID::from(0usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_only_tree_logs_zero_children() {
        let tree = Tree::new();
        tree.create_root(0, NodeStatus::Failed, String::new()).unwrap();
        let mut buf = Vec::new();
        write_search_log(&mut buf, &tree).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "0 0\n");
    }

    #[test]
    fn open_branch_with_zero_kids_is_marked_stop() {
        let tree = Tree::new();
        tree.create_root(0, NodeStatus::Branch, String::new()).unwrap();
        let mut buf = Vec::new();
        write_search_log(&mut buf, &tree).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "0 0 stop\n");
    }

    #[test]
    fn skipped_and_undetermined_children_are_omitted_and_not_counted() {
        let tree = Tree::new();
        let root = tree.create_root(3, NodeStatus::Branch, String::new()).unwrap();
        tree.promote_node(root, 0, 0, NodeStatus::Failed, "a".into()).unwrap();
        tree.promote_node(root, 1, 0, NodeStatus::Skipped, "b".into()).unwrap();
        // alt 2 stays UNDETERMINED

        let mut buf = Vec::new();
        write_search_log(&mut buf, &tree).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        let root_line = lines.next().unwrap();
        assert_eq!(root_line, "0 1 1 a");
        assert_eq!(lines.next(), Some("1 0"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn binary_tree_pre_order_matches_the_documented_grammar() {
        let tree = Tree::new();
        let root = tree.create_root(2, NodeStatus::Branch, String::new()).unwrap();
        tree.promote_node(root, 0, 0, NodeStatus::Failed, "L".into()).unwrap();
        tree.promote_node(root, 1, 0, NodeStatus::Solved, "R".into()).unwrap();

        let mut buf = Vec::new();
        write_search_log(&mut buf, &tree).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("0 2 1 L 2 R"));
        assert_eq!(lines.next(), Some("1 0"));
        assert_eq!(lines.next(), Some("2 0"));
        assert_eq!(lines.next(), None);
    }
}
