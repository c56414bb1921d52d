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

//! One execution: a tree plus the ingest-time state the builder needs (restart bookkeeping,
//! the name map, whether a root has been seen yet) and the registry of live executions,
//! keyed by the id a START message either supplies or is assigned.

use crate::tree::namemap::NameMap;
use crate::tree::solver_data::UserData;
use crate::tree::{NodeID, NodeStatus, Tree};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Ingest-time bookkeeping for one execution, separate from the tree itself so the
/// builder can hold this without contending on the tree mutex for bookkeeping reads.
#[derive(Debug)]
struct BuilderState {
    /// Set once the (non-restart) execution's single root has been created.
    root_created: bool,
    /// The implicit super-root's NodeID, for restart-enabled executions. `NoNode` until
    /// the first restart-root NODE message arrives.
    super_root: NodeID,
    restart_count: u32,
}

impl BuilderState {
    fn new() -> Self {
        Self {
            root_created: false,
            super_root: NodeID::NO_NODE,
            restart_count: 0,
        }
    }
}

pub struct Execution {
    pub id: i64,
    pub name: String,
    pub has_restarts: bool,
    pub tree: Arc<Tree>,
    pub name_map: RwLock<NameMap>,
    pub user_data: Mutex<UserData>,
    state: Mutex<BuilderState>,
    /// Set by the receiver on DONE; further NODE messages on this execution are dropped.
    done: std::sync::atomic::AtomicBool,
}

impl Execution {
    pub fn new(id: i64, name: String, has_restarts: bool) -> Self {
        Self {
            id,
            name,
            has_restarts,
            tree: Arc::new(Tree::new()),
            name_map: RwLock::new(NameMap::new()),
            user_data: Mutex::new(UserData::new()),
            state: Mutex::new(BuilderState::new()),
            done: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn restart_count(&self) -> u32 {
        self.state.lock().restart_count
    }

    /// Resolve or lazily create the super-root that restart roots attach to; returns its
    /// `NodeID` and the `alt` this restart root should be promoted at, advancing the
    /// restart counter.
    pub(crate) fn super_root_slot(&self) -> (NodeID, usize) {
        let mut state = self.state.lock();
        if state.super_root.is_no_node() {
            state.super_root = self
                .tree
                .create_root(0, NodeStatus::Branch, String::new())
                .expect("super-root created exactly once per execution");
        }
        let alt = state.restart_count as usize;
        state.restart_count += 1;
        (state.super_root, alt)
    }

    /// Returns `Ok(())` if this is the first (and only valid) non-restart root creation,
    /// `Err(())` if a root already exists (a protocol violation the caller should log and
    /// drop, per the tree-inconsistency error class).
    pub(crate) fn claim_single_root(&self) -> Result<(), ()> {
        let mut state = self.state.lock();
        if state.root_created {
            return Err(());
        }
        state.root_created = true;
        Ok(())
    }
}

/// The set of live executions, keyed by execution id. A START without an `execution_id`
/// registers a new execution under a freshly generated id.
#[derive(Default)]
pub struct ExecutionRegistry {
    executions: RwLock<HashMap<i64, Arc<Execution>>>,
    next_id: AtomicI64,
    /// Seeded onto every newly registered execution's `name_map`, typically loaded once
    /// at startup from `--paths`. Per-execution maps are independent after registration --
    /// there is no live update path back to in-flight executions.
    default_name_map: RwLock<NameMap>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self {
            executions: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            default_name_map: RwLock::new(NameMap::new()),
        }
    }

    pub fn set_default_name_map(&self, map: NameMap) {
        *self.default_name_map.write() = map;
    }

    /// Register a new execution, assigning a fresh id if `requested_id` is `None`.
    pub fn register(&self, requested_id: Option<i64>, name: String, has_restarts: bool) -> Arc<Execution> {
        let id = requested_id.unwrap_or_else(|| self.next_id.fetch_add(1, Ordering::Relaxed));
        let exec = Arc::new(Execution::new(id, name, has_restarts));
        *exec.name_map.write() = self.default_name_map.read().clone();
        self.executions.write().insert(id, exec.clone());
        exec
    }

    pub fn get(&self, id: i64) -> Option<Arc<Execution>> {
        self.executions.read().get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<Execution>> {
        self.executions.read().values().cloned().collect()
    }

    pub fn remove(&self, id: i64) -> Option<Arc<Execution>> {
        self.executions.write().remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_assigns_fresh_ids_when_unrequested() {
        let reg = ExecutionRegistry::new();
        let a = reg.register(None, "a".into(), false);
        let b = reg.register(None, "b".into(), false);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn registry_honors_requested_id() {
        let reg = ExecutionRegistry::new();
        let exec = reg.register(Some(42), "a".into(), false);
        assert_eq!(exec.id, 42);
        assert!(reg.get(42).is_some());
    }

    #[test]
    fn new_executions_inherit_the_default_name_map() {
        let reg = ExecutionRegistry::new();
        reg.set_default_name_map(NameMap::from_pairs([("X1".to_string(), "queens[0]".to_string())]));
        let exec = reg.register(None, "a".into(), false);
        assert_eq!(exec.name_map.read().substitute("X1 != 3"), "queens[0] != 3");
    }

    #[test]
    fn single_root_claim_rejects_second_attempt() {
        let exec = Execution::new(1, "t".into(), false);
        assert!(exec.claim_single_root().is_ok());
        assert!(exec.claim_single_root().is_err());
    }

    #[test]
    fn super_root_slot_advances_restart_count() {
        let exec = Execution::new(1, "t".into(), true);
        let (root_a, alt_a) = exec.super_root_slot();
        let (root_b, alt_b) = exec.super_root_slot();
        assert_eq!(root_a, root_b);
        assert_eq!(alt_a, 0);
        assert_eq!(alt_b, 1);
        assert_eq!(exec.restart_count(), 2);
    }
}
