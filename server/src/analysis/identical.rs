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

//! Identical-subtree detection by partition refinement: groups of nodes whose subtrees are
//! structurally identical, ignoring labels.
//!
//! Starts with one group per leaf status plus one group holding every branch node, then
//! repeatedly splits groups by "does your alt-`a` child belong to this now-settled group of
//! height `h`", moving a group to `processed` once every member has reached height `h+1`.

use crate::tree::node_id::NodeID;
use crate::tree::status::NodeStatus;
use crate::tree::Tree;
use std::collections::HashMap;

/// One identical-subtree class: every member's subtree is structurally indistinguishable
/// from every other member's, ignoring labels.
#[derive(Debug, Clone)]
pub struct IdenticalClass {
    pub height: u32,
    pub members: Vec<NodeID>,
}

impl IdenticalClass {
    pub fn is_repeated(&self) -> bool {
        self.members.len() >= 2
    }
}

/// Height of the subtree rooted at each node (leaves are height 1), computed bottom-up.
/// Relies on the tree's id-ordering invariant: `id(parent) < id(child)` always, so a single
/// descending scan is already a valid post-order.
fn subtree_heights(tree: &Tree, node_count: usize) -> Vec<u32> {
    let mut heights = vec![1u32; node_count];
    for idx in (0..node_count).rev() {
        let n = NodeID::from(idx);
        let max_child = tree
            .children_vec(n)
            .iter()
            .map(|c| heights[c.index()])
            .max();
        if let Some(h) = max_child {
            heights[idx] = h + 1;
        }
    }
    heights
}

pub fn identical_subtrees(tree: &Tree) -> Vec<IdenticalClass> {
    let node_count = tree.node_count();
    if node_count == 0 {
        return Vec::new();
    }
    let heights = subtree_heights(tree, node_count);
    let max_height = *heights.iter().max().unwrap_or(&1);

    let mut processed: Vec<Vec<NodeID>> = Vec::new();
    let mut remaining: Vec<Vec<NodeID>> = Vec::new();

    let mut failed = Vec::new();
    let mut solved = Vec::new();
    let mut branches = Vec::new();
    for idx in 0..node_count {
        let n = NodeID::from(idx);
        match tree.status_of(n) {
            NodeStatus::Failed => failed.push(n),
            NodeStatus::Solved => solved.push(n),
            _ => branches.push(n),
        }
    }
    if !failed.is_empty() {
        processed.push(failed);
    }
    if !solved.is_empty() {
        processed.push(solved);
    }
    if !branches.is_empty() {
        remaining.push(branches);
    }

    for h in 1..=max_height {
        let settled_at_h: Vec<&Vec<NodeID>> = processed.iter().filter(|g| {
            g.first().map(|&n| heights[n.index()] == h).unwrap_or(false)
        }).collect();

        for group in settled_at_h {
            let max_arity = group
                .iter()
                .filter_map(|&n| {
                    let p = tree.parent_of(n);
                    (!p.is_no_node()).then(|| tree.children_count(p))
                })
                .max()
                .unwrap_or(0);
            for a in 0..max_arity {
                let marked_parents: std::collections::HashSet<NodeID> = group
                    .iter()
                    .filter_map(|&n| {
                        let p = tree.parent_of(n);
                        if p.is_no_node() {
                            return None;
                        }
                        (tree.alt_of(n) as usize == a).then_some(p)
                    })
                    .collect();

                let mut next_remaining = Vec::new();
                for grp in remaining.drain(..) {
                    let (marked, unmarked): (Vec<NodeID>, Vec<NodeID>) =
                        grp.into_iter().partition(|&n| {
                            let p = tree.parent_of(n);
                            !p.is_no_node() && marked_parents.contains(&p)
                        });
                    if !marked.is_empty() {
                        next_remaining.push(marked);
                    }
                    if !unmarked.is_empty() {
                        next_remaining.push(unmarked);
                    }
                }
                remaining = next_remaining;
            }
        }

        let mut still_remaining = Vec::new();
        for grp in remaining.drain(..) {
            if grp.iter().all(|&n| heights[n.index()] == h + 1) {
                processed.push(grp);
            } else {
                still_remaining.push(grp);
            }
        }
        remaining = still_remaining;
    }

    processed.extend(remaining);

    // Group-by-height ordering is not load-bearing for correctness, only for readable
    // output; sort classes by (height, first member) for deterministic iteration order.
    let mut by_height: HashMap<u32, Vec<IdenticalClass>> = HashMap::new();
    for members in processed {
        if let Some(&first) = members.first() {
            let height = heights[first.index()];
            by_height.entry(height).or_default().push(IdenticalClass { height, members });
        }
    }
    let mut classes: Vec<IdenticalClass> = by_height.into_values().flatten().collect();
    classes.sort_by_key(|c| (c.height, c.members.first().copied().unwrap_or(NodeID::NO_NODE)));
    classes
}
