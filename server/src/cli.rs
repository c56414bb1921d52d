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

//! Command-line surface. Parsed eagerly in `main`, then folded into a [`crate::config::Config`]
//! alongside the config-file and environment layers.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cpprofilerd", about = "Search-tree profiler server for constraint-programming solvers")]
pub struct Cli {
    /// Address to bind the TCP listener to.
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Port to bind the TCP listener to.
    #[arg(long)]
    pub port: Option<u16>,

    /// Path to a YAML config file layered beneath environment variables and these flags.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to a `--paths`-style identifier-to-nice-name map, applied to nogood text.
    #[arg(long)]
    pub paths: Option<PathBuf>,

    /// Path to the MiniZinc model the solver was run against. Accepted for compatibility
    /// with existing invocations; this core does not itself resolve source locations from it.
    #[arg(long)]
    pub mzn: Option<PathBuf>,

    /// Ingest a single execution then write its search log to this path and exit.
    #[arg(long)]
    pub save_search: Option<PathBuf>,

    /// Ingest a single execution then write its full state (nodes, bookmarks, nogoods,
    /// info) to this SQLite file and exit.
    #[arg(long)]
    pub save_execution: Option<PathBuf>,

    /// Ingest a single execution then write a compressed pixel-tree overview to this path
    /// and exit.
    #[arg(long)]
    pub save_pixel_tree: Option<PathBuf>,

    /// Nodes-per-column compression factor for `--save_pixel_tree`.
    #[arg(long)]
    pub pixel_tree_compression: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_has_no_overrides() {
        let cli = Cli::parse_from(["cpprofilerd"]);
        assert!(cli.bind.is_none());
        assert!(cli.port.is_none());
        assert!(cli.save_search.is_none());
    }

    #[test]
    fn flags_parse_into_their_fields() {
        let cli = Cli::parse_from([
            "cpprofilerd",
            "--bind",
            "0.0.0.0",
            "--port",
            "6566",
            "--save-execution",
            "out.db",
        ]);
        assert_eq!(cli.bind, Some("0.0.0.0".parse().unwrap()));
        assert_eq!(cli.port, Some(6566));
        assert_eq!(cli.save_execution, Some(PathBuf::from("out.db")));
    }
}
