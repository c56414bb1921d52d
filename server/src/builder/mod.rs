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

//! Translates incoming wire messages into tree mutations.
//!
//! Tree inconsistencies (duplicate root, already-promoted child, unknown parent UID) are
//! logged and the offending message is dropped; the tree state is otherwise preserved, per
//! the error-handling design's "tree inconsistency" class. Nothing here panics.

use crate::execution::Execution;
use crate::tree::node_id::NodeID;
use crate::wire::message::{Message, NodeHeader, OptionalFields};
use std::sync::Arc;

/// Apply one message to `exec`. Returns `false` if the message was out-of-stream (the
/// execution already saw DONE) or was dropped as a tree inconsistency; callers generally
/// don't need to act on this beyond metrics/logging.
pub fn ingest(exec: &Arc<Execution>, msg: &Message) -> bool {
    if exec.is_done() {
        if !matches!(msg, Message::Done(_)) {
            log::warn!(
                "execution {} received a message after DONE; dropping",
                exec.id
            );
        }
        return false;
    }
    match msg {
        Message::Node(header, opt) => ingest_node(exec, header, opt),
        Message::Done(_) => {
            exec.mark_done();
            true
        }
        Message::Restart(opt) => {
            ingest_restart(exec, opt);
            true
        }
        Message::Start(_) => {
            log::warn!("execution {} received a second START; ignoring", exec.id);
            false
        }
    }
}

fn ingest_restart(exec: &Arc<Execution>, opt: &OptionalFields) {
    if let Some(info) = &opt.info {
        match serde_json::from_str::<serde_json::Value>(info) {
            Ok(v) => {
                let restart_id = v.get("restart_id").and_then(|x| x.as_i64());
                log::debug!("execution {}: restart marker {:?}", exec.id, restart_id);
            }
            Err(e) => log::warn!("execution {}: malformed RESTART info: {}", exec.id, e),
        }
    }
}

fn ingest_node(exec: &Arc<Execution>, header: &NodeHeader, opt: &OptionalFields) -> bool {
    let label = opt.label.clone().unwrap_or_default();
    let kids = header.kids.max(0) as usize;

    let nid = if header.parent_uid.is_sentinel() {
        if exec.has_restarts {
            let (super_root, alt) = exec.super_root_slot();
            exec.tree
                .add_extra_child(super_root);
            match exec.tree.promote_node(super_root, alt, kids, header.status, label) {
                Ok(nid) => nid,
                Err(e) => {
                    log::warn!("execution {}: dropping restart-root NODE: {}", exec.id, e);
                    return false;
                }
            }
        } else if exec.claim_single_root().is_ok() {
            match exec.tree.create_root(kids, header.status, label) {
                Ok(nid) => nid,
                Err(e) => {
                    log::warn!("execution {}: dropping root NODE: {}", exec.id, e);
                    return false;
                }
            }
        } else {
            log::warn!(
                "execution {}: a second root NODE arrived on a non-restart execution; dropping",
                exec.id
            );
            return false;
        }
    } else {
        let parent_nid = match exec.tree.nid_for_uid(header.parent_uid) {
            Some(nid) => nid,
            None => {
                log::warn!(
                    "execution {}: NODE referenced unknown parent UID {:?}; dropping",
                    exec.id,
                    header.parent_uid
                );
                return false;
            }
        };
        let alt = header.alt.max(0) as usize;
        match exec
            .tree
            .promote_node(parent_nid, alt, kids, header.status, label)
        {
            Ok(nid) => nid,
            Err(e) => {
                log::warn!("execution {}: dropping NODE: {}", exec.id, e);
                return false;
            }
        }
    };

    exec.tree.record_uid(header.uid, nid);
    apply_nogood(exec, nid, opt);
    apply_info(exec, nid, opt);
    true
}

fn apply_nogood(exec: &Arc<Execution>, nid: NodeID, opt: &OptionalFields) {
    let Some(nogood) = &opt.nogood else { return };
    let renamed = {
        let map = exec.name_map.read();
        (!map.is_empty()).then(|| map.substitute(nogood))
    };
    exec.tree.set_nogood(nid, nogood.clone(), renamed);
}

fn apply_info(exec: &Arc<Execution>, nid: NodeID, opt: &OptionalFields) {
    let Some(info) = &opt.info else { return };
    if let Err(e) = serde_json::from_str::<serde_json::Value>(info) {
        log::warn!("execution {}: node {} carries malformed info JSON: {}", exec.id, nid, e);
    }
    exec.tree.set_info(nid, info.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node_id::SolverUID;
    use crate::tree::status::NodeStatus;

    fn node(uid: SolverUID, parent: SolverUID, alt: i32, kids: i32, status: NodeStatus) -> Message {
        Message::Node(
            NodeHeader {
                uid,
                parent_uid: parent,
                alt,
                kids,
                status,
            },
            OptionalFields::default(),
        )
    }

    #[test]
    fn start_single_failure_scenario() {
        let exec = Arc::new(Execution::new(1, "t".into(), false));
        let msg = node(
            SolverUID::new(0, 0, 0),
            SolverUID::new(-1, -1, -1),
            -1,
            0,
            NodeStatus::Failed,
        );
        assert!(ingest(&exec, &msg));
        assert_eq!(exec.tree.node_count(), 1);
        assert_eq!(exec.tree.stats().failed, 1);
        assert_eq!(exec.tree.stats().max_depth, 1);
    }

    #[test]
    fn binary_tree_depth_two_scenario() {
        let exec = Arc::new(Execution::new(1, "t".into(), false));
        let root_uid = SolverUID::new(0, 0, 0);
        ingest(
            &exec,
            &node(root_uid, SolverUID::new(-1, -1, -1), -1, 2, NodeStatus::Branch),
        );
        ingest(
            &exec,
            &node(SolverUID::new(1, 0, 0), root_uid, 0, 0, NodeStatus::Failed),
        );
        ingest(
            &exec,
            &node(SolverUID::new(2, 0, 0), root_uid, 1, 0, NodeStatus::Solved),
        );
        assert_eq!(exec.tree.node_count(), 3);
        assert_eq!(exec.tree.stats().max_depth, 2);
    }

    #[test]
    fn restart_execution_scenario() {
        let exec = Arc::new(Execution::new(1, "t".into(), true));
        ingest(
            &exec,
            &node(SolverUID::new(0, 0, 0), SolverUID::new(-1, -1, -1), -1, 0, NodeStatus::Failed),
        );
        ingest(
            &exec,
            &node(SolverUID::new(0, 1, 0), SolverUID::new(-1, -1, -1), -1, 0, NodeStatus::Failed),
        );
        assert_eq!(exec.restart_count(), 2);
        // super-root + two restart roots
        assert_eq!(exec.tree.node_count(), 3);
    }

    #[test]
    fn messages_after_done_are_dropped() {
        let exec = Arc::new(Execution::new(1, "t".into(), false));
        ingest(&exec, &Message::Done(OptionalFields::default()));
        let accepted = ingest(
            &exec,
            &node(SolverUID::new(0, 0, 0), SolverUID::new(-1, -1, -1), -1, 0, NodeStatus::Failed),
        );
        assert!(!accepted);
        assert_eq!(exec.tree.node_count(), 0);
    }

    #[test]
    fn nogood_is_renamed_via_name_map() {
        let exec = Arc::new(Execution::new(1, "t".into(), false));
        exec.name_map.write().insert("X1".into(), "queens[0]".into());
        let mut opt = OptionalFields::default();
        opt.nogood = Some("X1 != 3".into());
        let msg = Message::Node(
            NodeHeader {
                uid: SolverUID::new(0, 0, 0),
                parent_uid: SolverUID::new(-1, -1, -1),
                alt: -1,
                kids: 0,
                status: NodeStatus::Failed,
            },
            opt,
        );
        ingest(&exec, &msg);
        let nogood = exec.tree.nogood(NodeID::from(0usize)).unwrap();
        assert_eq!(nogood.original, "X1 != 3");
        assert_eq!(nogood.renamed.as_deref(), Some("queens[0] != 3"));
    }
}
