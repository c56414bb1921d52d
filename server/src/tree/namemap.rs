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

//! Identifier-to-nice-name substitution for nogood text, driven by a `--paths`-supplied
//! name map. Pure and side-effect-free: whitespace and punctuation between identifiers
//! are preserved verbatim, and unknown identifiers are left unchanged.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref IDENT: Regex = Regex::new(r"[A-Za-z][A-Za-z0-9_]*").unwrap();
}

#[derive(Debug, Clone, Default)]
pub struct NameMap {
    table: HashMap<String, String>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        Self {
            table: pairs.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, identifier: String, nice_name: String) {
        self.table.insert(identifier, nice_name);
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Load a name map from a `--paths`-style file: one `identifier<whitespace>nice_name`
    /// pair per non-empty, non-`#`-comment line. This is a deliberately narrow stand-in for
    /// the original MiniZinc path-decomposition format (which additionally cross-references
    /// a `--mzn` model file to recover source locations) -- mapping solver identifiers to
    /// human-readable names beyond straight substitution is explicitly out of this core's
    /// scope, so a `--mzn` file is accepted on the command line but not parsed here.
    pub fn load_paths_file(contents: &str) -> Self {
        let mut map = Self::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((ident, nice)) = line.split_once(char::is_whitespace) {
                map.insert(ident.trim().to_string(), nice.trim().to_string());
            }
        }
        map
    }

    /// Replace every maximal `[A-Za-z][A-Za-z0-9_]*` run that appears in the map; runs not
    /// present in the map, and everything between runs, are copied through unchanged.
    pub fn substitute(&self, nogood: &str) -> String {
        let mut out = String::with_capacity(nogood.len());
        let mut last = 0;
        for m in IDENT.find_iter(nogood) {
            out.push_str(&nogood[last..m.start()]);
            match self.table.get(m.as_str()) {
                Some(nice) => out.push_str(nice),
                None => out.push_str(m.as_str()),
            }
            last = m.end();
        }
        out.push_str(&nogood[last..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_identifiers_are_left_unchanged() {
        let map = NameMap::new();
        assert_eq!(map.substitute("x != y"), "x != y");
    }

    #[test]
    fn known_identifiers_are_substituted_verbatim_elsewhere() {
        let map = NameMap::from_pairs([("X1".to_string(), "queens[0]".to_string())]);
        assert_eq!(map.substitute("X1 != X2"), "queens[0] != X2");
    }

    #[test]
    fn punctuation_and_whitespace_are_preserved() {
        let map = NameMap::from_pairs([
            ("A".to_string(), "alpha".to_string()),
            ("B".to_string(), "beta".to_string()),
        ]);
        assert_eq!(map.substitute("(A + B) <= 3"), "(alpha + beta) <= 3");
    }

    #[test]
    fn leading_digit_runs_are_not_identifiers() {
        let map = NameMap::from_pairs([("x1".to_string(), "Q1".to_string())]);
        // "1x1" starts with a digit, so the identifier regex only matches from "x1" onward.
        assert_eq!(map.substitute("1x1"), "1Q1");
    }

    #[test]
    fn paths_file_parses_whitespace_separated_pairs() {
        let map = NameMap::load_paths_file("X1 queens[0]\nX2   queens[1]\n");
        assert_eq!(map.len(), 2);
        assert_eq!(map.substitute("X1 != X2"), "queens[0] != queens[1]");
    }

    #[test]
    fn paths_file_skips_blank_lines_and_comments() {
        let map = NameMap::load_paths_file("# comment\n\nX1 queens[0]\n   \n");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn paths_file_keeps_remainder_of_line_as_nice_name() {
        // the nice name itself may contain whitespace; only the first run is the identifier.
        let map = NameMap::load_paths_file("X1 queens[0] = 3\n");
        assert_eq!(map.substitute("X1"), "queens[0] = 3");
    }
}
