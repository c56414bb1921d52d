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

//! Merges two search trees into a third, recording a pentagon item at every point the two
//! diverge.
//!
//! Walked by plain recursion rather than an explicit stack -- the source's stack-based walk
//! and a recursive one visit exactly the same pairs in the same order, and recursion reads
//! more directly here. Each call acquires `l`'s and `r`'s tree mutex (through the façade's own
//! per-call locking) before `m`'s, a fixed global order (L, then R, then M) that every merge
//! call site must follow to avoid deadlocking against a concurrent merge of the same pair.

use crate::tree::node_id::NodeID;
use crate::tree::status::NodeStatus;
use crate::tree::Tree;

/// One divergence point recorded while merging: `target` is the `MERGED` node in the result
/// tree, and the two counts are the sizes (node counts, including the divergence point
/// itself) of the subtrees copied in from each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PentagonItem {
    pub target: NodeID,
    pub descendant_count_l: usize,
    pub descendant_count_r: usize,
}

#[derive(Debug, Clone, Copy)]
enum TargetSlot {
    Root,
    Promote(NodeID, usize),
}

fn create_or_promote(m: &Tree, slot: TargetSlot, k: usize, status: NodeStatus, label: String) -> NodeID {
    match slot {
        TargetSlot::Root => m
            .create_root(k, status, label)
            .expect("a freshly built merge tree creates its root exactly once"),
        TargetSlot::Promote(parent, alt) => m
            .promote_node(parent, alt, k, status, label)
            .expect("merge only ever promotes a slot it has just allocated"),
    }
}

fn is_ignorable(tree: &Tree, n: NodeID) -> bool {
    matches!(tree.status_of(n), NodeStatus::Undetermined | NodeStatus::Skipped)
}

/// Strip a leading `[i]`/`[f]` type tag, remove whitespace, and normalize `==` to `=`, so
/// labels from different solver backends compare equal when they mean the same thing.
fn normalize_label(s: &str) -> String {
    let stripped = s.strip_prefix("[i]").or_else(|| s.strip_prefix("[f]")).unwrap_or(s);
    let no_ws: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();
    no_ws.replace("==", "=")
}

fn nodes_equal(l: &Tree, ln: NodeID, r: &Tree, rn: NodeID, compare_labels: bool) -> bool {
    if l.status_of(ln) != r.status_of(rn) {
        return false;
    }
    if compare_labels && normalize_label(&l.label_of(ln)) != normalize_label(&r.label_of(rn)) {
        return false;
    }
    true
}

fn copy_subtree(src: &Tree, node: NodeID, dst: &Tree, slot: TargetSlot) -> usize {
    let k = src.children_count(node);
    let target = create_or_promote(dst, slot, k, src.status_of(node), src.label_of(node));
    let mut count = 1;
    for alt in 0..k {
        if let Ok(child) = src.get_child(node, alt) {
            count += copy_subtree(src, child, dst, TargetSlot::Promote(target, alt));
        }
    }
    count
}

fn merge_pair(
    l: &Tree,
    ln: Option<NodeID>,
    r: &Tree,
    rn: Option<NodeID>,
    m: &Tree,
    slot: TargetSlot,
    compare_labels: bool,
    pentagons: &mut Vec<PentagonItem>,
) {
    match (ln, rn) {
        (Some(a), Some(b)) if nodes_equal(l, a, r, b, compare_labels) => {
            let kids_l = l.children_count(a);
            let kids_r = r.children_count(b);
            let common = kids_l.min(kids_r);
            let k = kids_l.max(kids_r);
            let target = create_or_promote(m, slot, k, l.status_of(a), l.label_of(a));
            for alt in 0..k {
                let lc = (alt < kids_l).then(|| l.get_child(a, alt).expect("within arity"));
                let rc = (alt < kids_r).then(|| r.get_child(b, alt).expect("within arity"));
                let (lc, rc) = if alt >= common {
                    (
                        lc.filter(|&n| !is_ignorable(l, n)),
                        rc.filter(|&n| !is_ignorable(r, n)),
                    )
                } else {
                    (lc, rc)
                };
                if lc.is_none() && rc.is_none() {
                    continue;
                }
                merge_pair(l, lc, r, rc, m, TargetSlot::Promote(target, alt), compare_labels, pentagons);
            }
        }
        (Some(a), Some(b)) => {
            let target = create_or_promote(m, slot, 2, NodeStatus::Merged, String::new());
            let count_l = copy_subtree(l, a, m, TargetSlot::Promote(target, 0));
            let count_r = copy_subtree(r, b, m, TargetSlot::Promote(target, 1));
            pentagons.push(PentagonItem {
                target,
                descendant_count_l: count_l,
                descendant_count_r: count_r,
            });
        }
        (Some(a), None) => {
            copy_subtree(l, a, m, slot);
        }
        (None, Some(b)) => {
            copy_subtree(r, b, m, slot);
        }
        (None, None) => {}
    }
}

/// Merge `l` and `r` into a fresh tree, returning it plus the list of pentagon (divergence)
/// items encountered, in the order the walk visited them. `compare_labels` toggles whether
/// node labels (normalized per [`normalize_label`]) participate in the equality test; off by
/// default per the design notes, since most solvers don't render comparable labels.
pub fn merge(l: &Tree, r: &Tree, compare_labels: bool) -> (Tree, Vec<PentagonItem>) {
    let m = Tree::new();
    let mut pentagons = Vec::new();
    if l.node_count() > 0 && r.node_count() > 0 {
        let l_root = NodeID::from(0usize);
        let r_root = NodeID::from(0usize);
        merge_pair(l, Some(l_root), r, Some(r_root), &m, TargetSlot::Root, compare_labels, &mut pentagons);
    }
    (m, pentagons)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_single_node_trees_merge_without_pentagons() {
        let l = Tree::new();
        l.create_root(0, NodeStatus::Failed, String::new()).unwrap();
        let r = Tree::new();
        r.create_root(0, NodeStatus::Failed, String::new()).unwrap();

        let (m, pentagons) = merge(&l, &r, false);
        assert!(pentagons.is_empty());
        assert_eq!(m.node_count(), 1);
        assert_eq!(m.status_of(NodeID::from(0usize)), NodeStatus::Failed);
    }

    #[test]
    fn differing_status_produces_one_pentagon_with_both_subtrees_copied() {
        let l = Tree::new();
        l.create_root(0, NodeStatus::Failed, String::new()).unwrap();
        let r = Tree::new();
        r.create_root(0, NodeStatus::Solved, String::new()).unwrap();

        let (m, pentagons) = merge(&l, &r, false);
        assert_eq!(pentagons.len(), 1);
        let p = pentagons[0];
        assert_eq!(p.descendant_count_l, 1);
        assert_eq!(p.descendant_count_r, 1);
        assert_eq!(m.status_of(p.target), NodeStatus::Merged);
        assert_eq!(m.children_count(p.target), 2);
    }

    #[test]
    fn label_normalization_ignores_type_tag_and_whitespace() {
        assert_eq!(normalize_label("[i] x == 3"), normalize_label("x==3"));
    }

    #[test]
    fn extra_branch_on_one_side_is_copied_without_a_pentagon() {
        let l = Tree::new();
        let lr = l.create_root(2, NodeStatus::Branch, String::new()).unwrap();
        l.promote_node(lr, 0, 0, NodeStatus::Failed, String::new()).unwrap();
        l.promote_node(lr, 1, 0, NodeStatus::Solved, String::new()).unwrap();

        let r = Tree::new();
        let rr = r.create_root(1, NodeStatus::Branch, String::new()).unwrap();
        r.promote_node(rr, 0, 0, NodeStatus::Failed, String::new()).unwrap();

        let (m, pentagons) = merge(&l, &r, false);
        assert!(pentagons.is_empty());
        assert_eq!(m.node_count(), 3);
        assert_eq!(m.children_count(NodeID::from(0usize)), 2);
    }
}
