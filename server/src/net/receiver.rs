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

//! Drives one connection: reads bytes, frames them, parses messages and dispatches them to
//! the builder. Runs on its own thread per the concurrency model -- blocking reads, no async.
//!
//! Fatal per-connection errors (`MalformedFrame`, `UnknownMsgKind`, a socket read error) are
//! logged, a synthetic DONE is delivered to the builder so the rest of the profiler sees a
//! clean end-of-stream, and the connection is closed. Nothing escapes this function.

use crate::builder;
use crate::execution::{Execution, ExecutionRegistry};
use crate::net::framing::FrameDecoder;
use crate::wire::message::{self, Message, OptionalFields};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

const READ_CHUNK: usize = 64 * 1024;

#[derive(serde::Deserialize)]
struct StartInfo {
    name: String,
    has_restarts: bool,
    execution_id: Option<i64>,
}

/// Drive one connection to completion. `artificial_delay`, when set, is slept once per
/// dispatched message -- a deterministic knob for testing backpressure, not used in
/// production.
pub fn run_connection<R: Read>(
    mut stream: R,
    registry: &ExecutionRegistry,
    artificial_delay: Option<Duration>,
) {
    let mut decoder = FrameDecoder::new();
    let mut exec: Option<Arc<Execution>> = None;
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        while let Some(payload) = decoder.try_next() {
            match message::parse(&payload) {
                Ok(msg) => {
                    if let Some(delay) = artificial_delay {
                        std::thread::sleep(delay);
                    }
                    if !dispatch(&msg, registry, &mut exec) {
                        finish(&exec);
                        return;
                    }
                }
                Err(e) => {
                    log::error!("connection error: {e}; closing");
                    finish(&exec);
                    return;
                }
            }
        }
        match stream.read(&mut chunk) {
            Ok(0) => {
                finish(&exec);
                return;
            }
            Ok(n) => decoder.feed(&chunk[..n]),
            Err(e) => {
                log::error!("socket read error: {e}; closing connection");
                finish(&exec);
                return;
            }
        }
    }
}

/// Returns `false` when the connection should be torn down (DONE was seen).
fn dispatch(msg: &Message, registry: &ExecutionRegistry, exec: &mut Option<Arc<Execution>>) -> bool {
    match msg {
        Message::Start(opt) => {
            *exec = Some(register_from_start(opt, registry));
            true
        }
        Message::Node(..) | Message::Restart(_) => {
            match exec {
                Some(e) => {
                    builder::ingest(e, msg);
                }
                None => log::warn!("NODE/RESTART before START; dropping"),
            }
            true
        }
        Message::Done(_) => {
            if let Some(e) = exec {
                builder::ingest(e, msg);
            }
            false
        }
    }
}

fn register_from_start(opt: &OptionalFields, registry: &ExecutionRegistry) -> Arc<Execution> {
    let info = opt.info.as_deref().unwrap_or("{}");
    match serde_json::from_str::<StartInfo>(info) {
        Ok(parsed) => {
            if let Some(v) = opt.version {
                if v != message::PROTOCOL_VERSION {
                    log::warn!(
                        "peer reports protocol version {v}, profiler expects {}",
                        message::PROTOCOL_VERSION
                    );
                }
            }
            registry.register(parsed.execution_id, parsed.name, parsed.has_restarts)
        }
        Err(e) => {
            log::warn!("malformed START info ({e}); registering an unnamed execution");
            registry.register(None, String::from("(unnamed)"), false)
        }
    }
}

/// Emit a synthetic DONE so the builder sees end-of-stream even on an abrupt/fatal close.
fn finish(exec: &Option<Arc<Execution>>) {
    if let Some(e) = exec {
        if !e.is_done() {
            builder::ingest(e, &Message::Done(OptionalFields::default()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node_id::SolverUID;
    use crate::tree::status::NodeStatus;
    use crate::wire::message::{frame, NodeHeader};
    use std::io::Cursor;

    fn framed_node(
        uid: SolverUID,
        parent: SolverUID,
        alt: i32,
        kids: i32,
        status: NodeStatus,
    ) -> Vec<u8> {
        let msg = Message::Node(
            NodeHeader {
                uid,
                parent_uid: parent,
                alt,
                kids,
                status,
            },
            OptionalFields::default(),
        );
        frame(&message::encode(&msg))
    }

    fn framed_start(name: &str, has_restarts: bool) -> Vec<u8> {
        let info = format!(r#"{{"name":"{name}","has_restarts":{has_restarts}}}"#);
        let msg = Message::Start(OptionalFields {
            version: Some(message::PROTOCOL_VERSION),
            info: Some(info),
            ..Default::default()
        });
        frame(&message::encode(&msg))
    }

    fn framed_done() -> Vec<u8> {
        frame(&message::encode(&Message::Done(OptionalFields::default())))
    }

    #[test]
    fn start_single_failure_end_to_end() {
        let mut bytes = framed_start("t", false);
        bytes.extend(framed_node(
            SolverUID::new(0, 0, 0),
            SolverUID::new(-1, -1, -1),
            -1,
            0,
            NodeStatus::Failed,
        ));
        bytes.extend(framed_done());

        let registry = ExecutionRegistry::new();
        run_connection(Cursor::new(bytes), &registry, None);

        let execs = registry.all();
        assert_eq!(execs.len(), 1);
        assert_eq!(execs[0].tree.node_count(), 1);
        assert!(execs[0].is_done());
    }

    #[test]
    fn abrupt_close_synthesizes_done() {
        let mut bytes = framed_start("t", false);
        bytes.extend(framed_node(
            SolverUID::new(0, 0, 0),
            SolverUID::new(-1, -1, -1),
            -1,
            0,
            NodeStatus::Failed,
        ));
        // stream ends with no DONE frame
        let registry = ExecutionRegistry::new();
        run_connection(Cursor::new(bytes), &registry, None);
        assert!(registry.all()[0].is_done());
    }

    #[test]
    fn node_before_start_is_dropped_not_panicking() {
        let bytes = framed_node(
            SolverUID::new(0, 0, 0),
            SolverUID::new(-1, -1, -1),
            -1,
            0,
            NodeStatus::Failed,
        );
        let registry = ExecutionRegistry::new();
        run_connection(Cursor::new(bytes), &registry, None);
        assert!(registry.all().is_empty());
    }
}
