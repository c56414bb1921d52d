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

//! Configuration layering: built-in defaults, overridden by an optional YAML file,
//! overridden by environment variables, overridden by CLI flags. Each layer only touches
//! the fields it actually sets, so an absent file or env var is never an error -- only a
//! present-but-malformed one is.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
pub const DEFAULT_PORT: u16 = 6565;
pub const DEFAULT_PIXEL_TREE_COMPRESSION: u32 = 2;

const ENV_BIND: &str = "CPPROFILER_BIND";
const ENV_PORT: &str = "CPPROFILER_PORT";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    InvalidEnvValue { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {e}"),
            Self::Parse(e) => write!(f, "failed to parse config file: {e}"),
            Self::InvalidEnvValue { var, value } => write!(f, "invalid value in {var}: {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::InvalidEnvValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e)
    }
}

/// The subset of configuration sensible to place in a YAML file: the bind address and
/// port, i.e. the settings a deployment tends to hold fixed across many invocations.
/// Every field is optional so a file may set only the ones it cares about.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
}

impl FileConfig {
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_str(&fs::read_to_string(path)?)
    }
}

/// Environment-variable overrides: `CPPROFILER_BIND`, `CPPROFILER_PORT`. `CPPROFILER_LOG`
/// is read directly by `env_logger` at startup and has no corresponding field here.
#[derive(Debug, Default)]
pub struct EnvConfig {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind = match std::env::var(ENV_BIND) {
            Ok(v) => Some(v.parse::<IpAddr>().map_err(|_| ConfigError::InvalidEnvValue {
                var: ENV_BIND,
                value: v,
            })?),
            Err(_) => None,
        };
        let port = match std::env::var(ENV_PORT) {
            Ok(v) => Some(v.parse::<u16>().map_err(|_| ConfigError::InvalidEnvValue {
                var: ENV_PORT,
                value: v,
            })?),
            Err(_) => None,
        };
        Ok(Self { bind, port })
    }
}

/// The fully-resolved, ready-to-use configuration: defaults folded with the file, env and
/// CLI layers in that order, each later layer winning where it sets a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    pub config_file: Option<PathBuf>,
    pub paths_file: Option<PathBuf>,
    pub mzn_file: Option<PathBuf>,
    pub save_search: Option<PathBuf>,
    pub save_execution: Option<PathBuf>,
    pub save_pixel_tree: Option<PathBuf>,
    pub pixel_tree_compression: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            port: DEFAULT_PORT,
            config_file: None,
            paths_file: None,
            mzn_file: None,
            save_search: None,
            save_execution: None,
            save_pixel_tree: None,
            pixel_tree_compression: DEFAULT_PIXEL_TREE_COMPRESSION,
        }
    }
}

impl Config {
    /// Whether any one-shot export flag was given; when true, the server accepts a single
    /// connection, ingests it to completion, writes the requested artifacts and exits
    /// instead of serving indefinitely.
    pub fn is_one_shot(&self) -> bool {
        self.save_search.is_some() || self.save_execution.is_some() || self.save_pixel_tree.is_some()
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(bind) = file.bind {
            self.bind = bind;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
    }

    fn apply_env(&mut self, env: EnvConfig) {
        if let Some(bind) = env.bind {
            self.bind = bind;
        }
        if let Some(port) = env.port {
            self.port = port;
        }
    }

    /// Fold defaults, an optional config file, environment variables and CLI flags (in
    /// that priority order, later wins) into a resolved `Config`.
    pub fn resolve(cli: crate::cli::Cli) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(path) = &cli.config {
            cfg.apply_file(FileConfig::load(path)?);
            cfg.config_file = Some(path.clone());
        }

        cfg.apply_env(EnvConfig::from_env()?);

        if let Some(bind) = cli.bind {
            cfg.bind = bind;
        }
        if let Some(port) = cli.port {
            cfg.port = port;
        }
        cfg.paths_file = cli.paths;
        cfg.mzn_file = cli.mzn;
        cfg.save_search = cli.save_search;
        cfg.save_execution = cli.save_execution;
        cfg.save_pixel_tree = cli.save_pixel_tree;
        if let Some(compression) = cli.pixel_tree_compression {
            cfg.pixel_tree_compression = compression;
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["cpprofilerd"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn defaults_apply_with_no_overrides() {
        let cfg = Config::resolve(cli(&[])).unwrap();
        assert_eq!(cfg.bind, DEFAULT_BIND);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(!cfg.is_one_shot());
    }

    #[test]
    fn cli_port_overrides_default() {
        let cfg = Config::resolve(cli(&["--port", "7000"])).unwrap();
        assert_eq!(cfg.port, 7000);
    }

    #[test]
    fn file_config_parses_partial_yaml() {
        let file = FileConfig::from_str("port: 9000\n").unwrap();
        assert_eq!(file.port, Some(9000));
        assert_eq!(file.bind, None);
    }

    #[test]
    fn one_shot_export_flag_is_detected() {
        let cfg = Config::resolve(cli(&["--save-search", "out.log"])).unwrap();
        assert!(cfg.is_one_shot());
        assert_eq!(cfg.save_search.as_deref(), Some(Path::new("out.log")));
    }

    #[test]
    fn pixel_tree_compression_defaults_when_flag_absent() {
        let cfg = Config::resolve(cli(&["--save-pixel-tree", "out.pix"])).unwrap();
        assert_eq!(cfg.pixel_tree_compression, DEFAULT_PIXEL_TREE_COMPRESSION);
    }
}
