/*
 * Created on Thu Jul 02 2020
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2020, Sayan Nandan <ohsayan@outlook.com>
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

//! # cpprofilerd
//!
//! A standalone profiler server for constraint-programming solvers: it speaks the framed
//! wire protocol a solver writes its search tree over, builds and maintains the tree
//! incrementally as messages arrive, and exports it in the formats downstream tooling
//! consumes. See the individual modules for the respective documentation.

use clap::Parser;
use env_logger::Builder;
use libsky::util::terminal;
use libsky::{URL, VERSION};
use std::env;
use std::sync::Arc;

mod analysis;
mod arbiter;
mod builder;
mod cli;
mod config;
mod execution;
mod layout;
mod net;
mod persistence;
mod pixeltree;
mod searchlog;
mod tree;
mod wire;

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
/// The default memory allocator on every platform but msvc.
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
    Builder::new()
        .parse_filters(&env::var("CPPROFILER_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();

    let cli = cli::Cli::parse();
    let cfg = match config::Config::resolve(cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("configuration error: {e}");
            std::process::exit(0x100);
        }
    };

    println!("cpprofiler v{} | {}", VERSION, URL);
    log::info!("binding to {}:{}", cfg.bind, cfg.port);

    let registry = Arc::new(execution::ExecutionRegistry::new());

    if let Err(e) = arbiter::run(cfg, registry) {
        log::error!("server exited with error: {e}");
        std::process::exit(0x100);
    }

    let _ = terminal::write_info("Goodbye :)\n");
}
