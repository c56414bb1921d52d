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

//! Start-up orchestration: binds the listener, then either serves connections forever or,
//! in one-shot export mode, ingests exactly one execution and writes the requested
//! artifacts before returning. Everything here runs on blocking threads; there are no
//! async suspension points anywhere in this core.

use crate::config::Config;
use crate::execution::ExecutionRegistry;
use crate::net;
use crate::{persistence, pixeltree, searchlog};
use std::fs::File;
use std::io;
use std::net::TcpListener;
use std::sync::Arc;

/// Bind the listener and run the server to whichever completion `cfg` calls for: the
/// one-shot export path if any `--save_*` flag was given, the indefinite serve loop
/// otherwise.
pub fn run(cfg: Config, registry: Arc<ExecutionRegistry>) -> io::Result<()> {
    if let Some(path) = &cfg.paths_file {
        match std::fs::read_to_string(path) {
            Ok(text) => registry.set_default_name_map(crate::tree::namemap::NameMap::load_paths_file(&text)),
            Err(e) => log::error!("failed to read --paths file {:?}: {}", path, e),
        }
    }
    if cfg.mzn_file.is_some() {
        log::info!("--mzn accepted for compatibility; this core does not itself resolve source locations from it");
    }

    let listener = net::bind_listener(cfg.bind, cfg.port)?;

    if cfg.is_one_shot() {
        run_one_shot(&cfg, &listener, &registry)
    } else {
        net::serve(listener, registry, None)
    }
}

/// Ingest exactly one connection to completion (DONE, or an abrupt close that synthesizes
/// one), then write whichever of `--save_search` / `--save_execution` / `--save_pixel_tree`
/// were given. A connection that produced no execution logs a warning and writes nothing.
fn run_one_shot(cfg: &Config, listener: &TcpListener, registry: &ExecutionRegistry) -> io::Result<()> {
    net::accept_one(listener, registry, None)?;

    let Some(exec) = net::sole_execution(registry) else {
        log::warn!("one-shot run closed with no execution ingested; nothing to export");
        return Ok(());
    };

    if let Some(path) = &cfg.save_search {
        let mut f = File::create(path)?;
        searchlog::write_search_log(&mut f, &exec.tree)?;
        log::info!("wrote search log to {:?}", path);
    }

    if let Some(path) = &cfg.save_execution {
        let bookmarks = exec
            .user_data
            .lock()
            .bookmarks()
            .map(|(n, s)| (n, s.to_owned()))
            .collect();
        let data = persistence::SaveData {
            tree: &exec.tree,
            bookmarks,
            nogoods: exec.tree.nogoods_vec(),
            info: exec.tree.info_vec(),
        };
        persistence::save(path, &data).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        log::info!("wrote execution database to {:?}", path);
    }

    if let Some(path) = &cfg.save_pixel_tree {
        let mut f = File::create(path)?;
        pixeltree::write_pixel_tree(&mut f, &exec.tree, cfg.pixel_tree_compression)?;
        log::info!("wrote pixel tree to {:?}", path);
    }

    Ok(())
}
