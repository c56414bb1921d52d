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

//! Similar-shape clustering: nodes grouped by shape equality under a total order where the
//! shorter shape always sorts less, and same-height shapes compare row by row.

use crate::layout::LayoutEngine;
use crate::tree::node_id::NodeID;
use crate::tree::shape::Shape;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct ShapeClass {
    pub height: usize,
    pub members: Vec<NodeID>,
}

/// The total order from the design notes: height first (shorter is less), then row by row
/// `(l, r)` with `l` ascending and `r` descending -- i.e. a row with a smaller left extent or
/// a larger right extent sorts its shape as greater.
pub fn compare_shapes(a: &Shape, b: &Shape) -> Ordering {
    if a.height() != b.height() {
        return a.height().cmp(&b.height());
    }
    for i in 0..a.height() {
        let ra = a.row(i).unwrap();
        let rb = b.row(i).unwrap();
        if ra.l != rb.l {
            // a smaller left extent means a wider (greater) shape.
            return rb.l.cmp(&ra.l);
        }
        if ra.r != rb.r {
            return ra.r.cmp(&rb.r);
        }
    }
    Ordering::Equal
}

fn shapes_equal(a: &Shape, b: &Shape) -> bool {
    compare_shapes(a, b) == Ordering::Equal
}

/// Cluster every node with a completed layout into shape-equivalence classes, sorted by
/// height and then by the total order within each height.
pub fn similar_shapes(layout: &LayoutEngine, nodes: &[NodeID]) -> Vec<ShapeClass> {
    let mut entries: Vec<(NodeID, Shape)> = nodes
        .iter()
        .filter_map(|&n| layout.shape_of(n).map(|s| (n, s)))
        .collect();
    entries.sort_by(|(_, a), (_, b)| compare_shapes(a, b));

    let mut classes: Vec<ShapeClass> = Vec::new();
    for (n, shape) in entries {
        match classes.last_mut() {
            Some(class) if shapes_equal(&class_shape(layout, class), &shape) => {
                class.members.push(n);
            }
            _ => classes.push(ShapeClass {
                height: shape.height(),
                members: vec![n],
            }),
        }
    }
    classes
}

fn class_shape(layout: &LayoutEngine, class: &ShapeClass) -> Shape {
    layout
        .shape_of(class.members[0])
        .expect("class member always has a completed shape")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::shape::{BoundingBox, Extent};
    use crate::tree::status::NodeStatus;
    use crate::tree::Tree;

    #[test]
    fn shorter_shape_always_sorts_less() {
        let short = Shape::single_row(Extent::new(-11, 11));
        let tall = Shape::new(
            vec![Extent::new(-11, 11), Extent::new(-19, 19)],
            BoundingBox::new(-19, 19),
        );
        assert_eq!(compare_shapes(&short, &tall), Ordering::Less);
    }

    #[test]
    fn wider_left_extent_sorts_greater() {
        let narrow = Shape::single_row(Extent::new(-5, 5));
        let wide = Shape::single_row(Extent::new(-10, 5));
        assert_eq!(compare_shapes(&wide, &narrow), Ordering::Greater);
    }

    #[test]
    fn two_structurally_equal_leaves_land_in_one_class() {
        let tree = Tree::new();
        let root = tree.create_root(2, NodeStatus::Branch, String::new()).unwrap();
        tree.promote_node(root, 0, 0, NodeStatus::Failed, String::new()).unwrap();
        tree.promote_node(root, 1, 0, NodeStatus::Failed, String::new()).unwrap();

        let layout = LayoutEngine::new();
        layout.mark_dirty_up(&tree, root);
        layout.recompute(&tree);

        let c0 = tree.get_child(root, 0).unwrap();
        let c1 = tree.get_child(root, 1).unwrap();
        let classes = similar_shapes(&layout, &[c0, c1]);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].members.len(), 2);
    }
}
