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

//! Relational save/restore of one execution's tree, bookmarks, nogoods and info, over a
//! single-file embedded SQL database (`rusqlite`, bundled SQLite).
//!
//! `save` never leaves a part-old, part-new file behind: any pre-existing file at the
//! target path is removed before the database is opened. `Nodes` rows are written in
//! pre-order, batched into transactions of [`BATCH_SIZE`] rows so a multi-million-node tree
//! doesn't hold one giant transaction open. The other three tables are written unconditionally
//! afterward, skipping rows whose text is empty.

use crate::tree::node_id::NodeID;
use crate::tree::status::NodeStatus;
use crate::tree::Tree;
use rusqlite::{params, Connection, OptionalExtension};
use std::fmt;
use std::path::Path;

const BATCH_SIZE: usize = 50_000;

#[derive(Debug)]
pub enum PersistError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    /// The `Nodes` table had no row with `ParentID = NoNode`: not a valid saved execution.
    MissingRoot,
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{e}"),
            Self::Sql(e) => write!(f, "{e}"),
            Self::MissingRoot => write!(f, "execution database has no root node"),
        }
    }
}

impl std::error::Error for PersistError {}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<rusqlite::Error> for PersistError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sql(e)
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

fn status_code(s: NodeStatus) -> i64 {
    s.to_wire() as i64
}

fn status_from_code(code: i64) -> NodeStatus {
    // Nodes table only ever holds statuses a live or merged tree can reach; MERGED nodes
    // round-trip too, since a saved merge result is a perfectly ordinary tree on reload.
    match code {
        0 => NodeStatus::Solved,
        1 => NodeStatus::Failed,
        2 => NodeStatus::Branch,
        3 => NodeStatus::Skipped,
        4 => NodeStatus::Undetermined,
        _ => NodeStatus::Merged,
    }
}

fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS Nodes (
            NodeID INTEGER PRIMARY KEY,
            ParentID INTEGER NOT NULL,
            Alternative INTEGER NOT NULL,
            NKids INTEGER NOT NULL,
            Status INTEGER NOT NULL,
            Label TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS Bookmarks (
            NodeID INTEGER PRIMARY KEY,
            Bookmark TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS Nogoods (
            NodeID INTEGER PRIMARY KEY,
            Nogood TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS Info (
            NodeID INTEGER PRIMARY KEY,
            Info TEXT NOT NULL
        );",
    )
}

/// Everything a save needs beyond the tree itself: bookmarks and solver-ingestion data,
/// which live on [`crate::execution::Execution`] rather than on [`Tree`].
pub struct SaveData<'a> {
    pub tree: &'a Tree,
    pub bookmarks: Vec<(NodeID, String)>,
    pub nogoods: Vec<(NodeID, String)>,
    pub info: Vec<(NodeID, String)>,
}

/// Save one execution to `path`. Any pre-existing file at `path` is deleted first so a
/// failed or partial save can never be mistaken for a valid one.
pub fn save(path: &Path, data: &SaveData<'_>) -> PersistResult<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let mut conn = Connection::open(path)?;
    create_schema(&conn)?;

    let node_count = data.tree.node_count();
    let mut idx = 0;
    while idx < node_count {
        let end = (idx + BATCH_SIZE).min(node_count);
        let txn = conn.transaction()?;
        {
            let mut stmt = txn.prepare(
                "INSERT INTO Nodes (NodeID, ParentID, Alternative, NKids, Status, Label)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for raw in idx..end {
                let n = NodeID::from(raw);
                let parent = data.tree.parent_of(n);
                stmt.execute(params![
                    n.raw(),
                    parent.raw(),
                    data.tree.alt_of(n),
                    data.tree.children_count(n) as i64,
                    status_code(data.tree.status_of(n)),
                    data.tree.label_of(n),
                ])?;
            }
        }
        txn.commit()?;
        idx = end;
    }

    {
        let txn = conn.transaction()?;
        {
            let mut stmt = txn.prepare(
                "INSERT INTO Bookmarks (NodeID, Bookmark) VALUES (?1, ?2)",
            )?;
            for (n, text) in &data.bookmarks {
                if !text.is_empty() {
                    stmt.execute(params![n.raw(), text])?;
                }
            }
        }
        {
            let mut stmt = txn.prepare(
                "INSERT INTO Nogoods (NodeID, Nogood) VALUES (?1, ?2)",
            )?;
            for (n, text) in &data.nogoods {
                if !text.is_empty() {
                    stmt.execute(params![n.raw(), text])?;
                }
            }
        }
        {
            let mut stmt = txn.prepare("INSERT INTO Info (NodeID, Info) VALUES (?1, ?2)")?;
            for (n, text) in &data.info {
                if !text.is_empty() {
                    stmt.execute(params![n.raw(), text])?;
                }
            }
        }
        txn.commit()?;
    }
    Ok(())
}

/// The result of [`load`]: a freshly materialized tree plus the side tables, keyed by the
/// *new* tree's `NodeID`s (which are identical to the saved `NodeID`s, since load replays
/// rows in the same pre-order the save wrote them in).
pub struct LoadedExecution {
    pub tree: Tree,
    pub bookmarks: Vec<(NodeID, String)>,
    pub nogoods: Vec<(NodeID, String)>,
    pub info: Vec<(NodeID, String)>,
}

/// Load an execution from `path`. Children are *not* auto-allocated here the way live
/// ingest does it: every row in `Nodes` explicitly creates exactly one node, via
/// [`Tree::offline_create_root`] for the row with `ParentID = NoNode` and
/// [`Tree::offline_add_child`] for every other row, visited in `NodeID` order so a parent
/// row is always replayed before its children (the same invariant the live tree relies on).
pub fn load(path: &Path) -> PersistResult<LoadedExecution> {
    let conn = Connection::open(path)?;
    let row_count: i64 = conn.query_row("SELECT COUNT(*) FROM Nodes", [], |r| r.get(0))?;

    let tree = Tree::new();
    {
        let mut stmt = conn.prepare(
            "SELECT NodeID, ParentID, Alternative, Status, Label FROM Nodes ORDER BY NodeID",
        )?;
        let mut rows = stmt.query([])?;
        let mut root_seen = false;
        while let Some(row) = rows.next()? {
            let node_id: i64 = row.get(0)?;
            let parent_id: i64 = row.get(1)?;
            let status = status_from_code(row.get(3)?);
            let label: String = row.get(4)?;
            let parent = NodeID::from(parent_id as i32);
            if parent.is_no_node() {
                if root_seen {
                    // A second root row would violate the "exactly one root" invariant;
                    // treat it the way the rest of the façade treats tree inconsistencies.
                    log::warn!("execution database at {:?} has more than one root row", path);
                    continue;
                }
                root_seen = true;
                let created = tree.offline_create_root(status, label);
                debug_assert_eq!(created.raw() as i64, node_id);
            } else {
                let created = tree.offline_add_child(parent, status, label);
                debug_assert_eq!(created.raw() as i64, node_id);
            }
        }
        if !root_seen && row_count > 0 {
            return Err(PersistError::MissingRoot);
        }
    }

    let bookmarks = load_text_table(&conn, "Bookmarks", "Bookmark")?;
    let nogoods = load_text_table(&conn, "Nogoods", "Nogood")?;
    let info = load_text_table(&conn, "Info", "Info")?;

    Ok(LoadedExecution {
        tree,
        bookmarks,
        nogoods,
        info,
    })
}

fn load_text_table(
    conn: &Connection,
    table: &str,
    column: &str,
) -> PersistResult<Vec<(NodeID, String)>> {
    let exists: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
            params![table],
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Ok(Vec::new());
    }
    let sql = format!("SELECT NodeID, {column} FROM {table}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |r| {
            let id: i64 = r.get(0)?;
            let text: String = r.get(1)?;
            Ok((NodeID::from(id as i32), text))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_tree() -> Tree {
        let tree = Tree::new();
        let root = tree.create_root(2, NodeStatus::Branch, "root".into()).unwrap();
        tree.promote_node(root, 0, 0, NodeStatus::Failed, "left".into()).unwrap();
        tree.promote_node(root, 1, 0, NodeStatus::Solved, "right".into()).unwrap();
        tree
    }

    #[test]
    fn round_trips_structure_status_and_labels() {
        let tree = sample_tree();
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        // NamedTempFile already creates the file; save() should happily remove and recreate it.
        save(
            &path,
            &SaveData {
                tree: &tree,
                bookmarks: vec![],
                nogoods: vec![],
                info: vec![],
            },
        )
        .unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.tree.node_count(), tree.node_count());
        for raw in 0..tree.node_count() {
            let n = NodeID::from(raw);
            assert_eq!(loaded.tree.status_of(n), tree.status_of(n));
            assert_eq!(loaded.tree.label_of(n), tree.label_of(n));
            assert_eq!(loaded.tree.parent_of(n), tree.parent_of(n));
        }
    }

    #[test]
    fn round_trips_bookmarks_nogoods_and_info() {
        let tree = sample_tree();
        let root = NodeID::from(0usize);
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        save(
            &path,
            &SaveData {
                tree: &tree,
                bookmarks: vec![(root, "checkpoint".into())],
                nogoods: vec![(root, "x != 1".into())],
                info: vec![(root, "{\"a\":1}".into())],
            },
        )
        .unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.bookmarks, vec![(root, "checkpoint".to_string())]);
        assert_eq!(loaded.nogoods, vec![(root, "x != 1".to_string())]);
        assert_eq!(loaded.info, vec![(root, "{\"a\":1}".to_string())]);
    }

    #[test]
    fn empty_text_rows_are_skipped_on_save() {
        let tree = sample_tree();
        let root = NodeID::from(0usize);
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        save(
            &path,
            &SaveData {
                tree: &tree,
                bookmarks: vec![(root, String::new())],
                nogoods: vec![],
                info: vec![],
            },
        )
        .unwrap();
        let loaded = load(&path).unwrap();
        assert!(loaded.bookmarks.is_empty());
    }

    #[test]
    fn save_deletes_preexisting_file_first() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        std::fs::write(&path, b"not a real database").unwrap();

        let tree = sample_tree();
        save(
            &path,
            &SaveData {
                tree: &tree,
                bookmarks: vec![],
                nogoods: vec![],
                info: vec![],
            },
        )
        .unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.tree.node_count(), tree.node_count());
    }

    #[test]
    fn root_only_tree_round_trips() {
        let tree = Tree::new();
        tree.create_root(0, NodeStatus::Failed, String::new()).unwrap();
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        save(
            &path,
            &SaveData {
                tree: &tree,
                bookmarks: vec![],
                nogoods: vec![],
                info: vec![],
            },
        )
        .unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.tree.node_count(), 1);
        assert_eq!(loaded.tree.stats().max_depth, 1);
    }
}
