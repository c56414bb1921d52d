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

//! The listening endpoint: one thread accepts connections, one more thread per accepted
//! connection runs the receiver loop against the shared [`ExecutionRegistry`].

pub mod framing;
pub mod receiver;

use crate::execution::{Execution, ExecutionRegistry};
use std::net::{IpAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 6565;

/// Bind the listening socket at `(bind, port)`. If `port` is busy, falls back to an
/// ephemeral port and logs the one actually bound -- this is the documented fallback for
/// `DEFAULT_PORT`, but applies equally to any explicitly configured port.
pub fn bind_listener(bind: IpAddr, port: u16) -> std::io::Result<TcpListener> {
    match TcpListener::bind((bind, port)) {
        Ok(l) => {
            log::info!("listening on {bind}:{port}");
            Ok(l)
        }
        Err(e) => {
            log::warn!("port {port} unavailable ({e}); binding an ephemeral port");
            let l = TcpListener::bind((bind, 0))?;
            log::info!("listening on {}", l.local_addr()?);
            Ok(l)
        }
    }
}

/// Accept exactly one connection and drive it to completion on the calling thread, for the
/// one-shot `--save_search` / `--save_execution` / `--save_pixel_tree` CLI paths: those ingest
/// a single execution then exit, rather than serving indefinitely.
pub fn accept_one(
    listener: &TcpListener,
    registry: &ExecutionRegistry,
    artificial_delay: Option<Duration>,
) -> std::io::Result<()> {
    let (stream, addr) = listener.accept()?;
    log::info!("accepted one-shot connection from {addr}");
    receiver::run_connection(stream, registry, artificial_delay);
    Ok(())
}

/// The single execution a one-shot run ingested, if any (a connection that closed before a
/// single NODE/START arrived registers nothing).
pub fn sole_execution(registry: &ExecutionRegistry) -> Option<Arc<Execution>> {
    registry.all().into_iter().next()
}

/// Accept connections forever, handing each to its own thread. Returns only on a listener
/// error (the socket itself failed, not an individual connection).
pub fn serve(
    listener: TcpListener,
    registry: Arc<ExecutionRegistry>,
    artificial_delay: Option<Duration>,
) -> std::io::Result<()> {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                log::error!("accept() failed: {e}");
                continue;
            }
        };
        let registry = registry.clone();
        std::thread::spawn(move || {
            receiver::run_connection(stream, &registry, artificial_delay);
        });
    }
    Ok(())
}
