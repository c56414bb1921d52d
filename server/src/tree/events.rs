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

//! The tree's change notifications: `StructureEvent`s, broadcast to whoever subscribes.
//!
//! The layout engine subscribes to mark ancestors dirty; a UI-facing collaborator would
//! subscribe to schedule redraws. Delivery happens on the mutating thread (the builder, or
//! whichever thread called into the tree façade) -- subscribers are expected to enqueue
//! work rather than do it synchronously, per the design notes on threaded notifications.

use super::node_id::NodeID;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A node gained a batch of children (root creation, promotion, restart super-root).
    ChildrenStructureChanged,
    /// Any structural or status mutation touching this node.
    StructureUpdated,
    /// `node`'s last open descendant just closed. Fires at most once per node.
    SubtreeClosed,
    /// A visual flag that affects `node`'s rendered extents changed (hidden, label-shown,
    /// lantern-size). Highlighting does not affect shape and is not reported here.
    VisualFlagChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureEvent {
    pub node: NodeID,
    pub kind: EventKind,
}

/// A fan-out broadcast of [`StructureEvent`]s. Cloning a `Receiver` per subscriber keeps
/// slow or absent subscribers from blocking the publisher: channels are unbounded, so a
/// `send` never stalls the tree mutex holder.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<StructureEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<StructureEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: StructureEvent) {
        let mut subs = self.subscribers.lock();
        subs.retain(|tx| tx.send(event).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_receives_published_events() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let n = NodeID::from(0usize);
        bus.publish(StructureEvent {
            node: n,
            kind: EventKind::ChildrenStructureChanged,
        });
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.node, n);
        assert_eq!(ev.kind, EventKind::ChildrenStructureChanged);
    }

    #[test]
    fn dropped_subscriber_is_pruned_on_next_publish() {
        let bus = EventBus::new();
        {
            let _rx = bus.subscribe();
        }
        bus.publish(StructureEvent {
            node: NodeID::from(0usize),
            kind: EventKind::StructureUpdated,
        });
        assert_eq!(bus.subscribers.lock().len(), 0);
    }
}
