#![forbid(unsafe_code)]

mod backlinks;
mod blocks;
mod error;
mod links;
mod pages;
mod requests;
mod search;
mod types;

pub use error::StoreError;
pub use requests::*;
pub use search::{DEFAULT_SEARCH_LIMIT, SECTION_PATH_MAX_DEPTH, SNIPPET_MAX_CHARS};
pub use types::*;

use lb_core::model::{BlockType, PageType};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE: &str = "lorebook.db";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub(in crate::store) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(in crate::store) fn transaction(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self.conn.transaction()?)
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          name TEXT PRIMARY KEY,
          value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pages (
          id TEXT PRIMARY KEY,
          title TEXT NOT NULL,
          type TEXT NOT NULL,
          slug TEXT NOT NULL UNIQUE,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS blocks (
          id TEXT PRIMARY KEY,
          page_id TEXT NOT NULL REFERENCES pages(id),
          parent_id TEXT,
          sort INTEGER NOT NULL,
          type TEXT NOT NULL,
          props_json TEXT NOT NULL DEFAULT '{}',
          content_json TEXT NOT NULL DEFAULT '{}',
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_blocks_group ON blocks(page_id, parent_id, sort);
        CREATE INDEX IF NOT EXISTS idx_pages_title ON pages(title);
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", "v1"],
    )?;
    Ok(())
}

pub(in crate::store) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub(in crate::store) fn next_counter_tx(tx: &Transaction<'_>, name: &str) -> Result<i64, StoreError> {
    let current: i64 = tx
        .query_row(
            "SELECT value FROM counters WHERE name=?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let next = current + 1;
    tx.execute(
        r#"
        INSERT INTO counters(name, value) VALUES (?1, ?2)
        ON CONFLICT(name) DO UPDATE SET value=excluded.value
        "#,
        params![name, next],
    )?;
    Ok(next)
}

pub(in crate::store) fn mint_page_id_tx(tx: &Transaction<'_>) -> Result<String, StoreError> {
    let seq = next_counter_tx(tx, "page_seq")?;
    Ok(format!("pg_{seq:012}"))
}

pub(in crate::store) fn mint_block_id_tx(tx: &Transaction<'_>) -> Result<String, StoreError> {
    let seq = next_counter_tx(tx, "block_seq")?;
    Ok(format!("bk_{seq:012}"))
}

pub(in crate::store) fn page_exists_tx(tx: &Transaction<'_>, page_id: &str) -> Result<bool, StoreError> {
    Ok(tx
        .query_row("SELECT 1 FROM pages WHERE id=?1", params![page_id], |_| Ok(()))
        .optional()?
        .is_some())
}

pub(in crate::store) fn touch_page_tx(
    tx: &Transaction<'_>,
    page_id: &str,
    now_ms: i64,
) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE pages SET updated_at_ms=?2 WHERE id=?1",
        params![page_id, now_ms],
    )?;
    Ok(())
}

/// Reassign dense `0..n` sort values within one `(page_id, parent_id)`
/// sibling group, ordered by `(sort, created_at_ms, id)`. Runs inside the
/// mutating transaction; only rows whose sort changed are written.
pub(in crate::store) fn normalize_sibling_group_tx(
    tx: &Transaction<'_>,
    page_id: &str,
    parent_id: Option<&str>,
) -> Result<usize, StoreError> {
    let mut stmt = tx.prepare(
        r#"
        SELECT id, sort
        FROM blocks
        WHERE page_id=?1 AND parent_id IS ?2
        ORDER BY sort ASC, created_at_ms ASC, id ASC
        "#,
    )?;
    let members = stmt
        .query_map(params![page_id, parent_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    let mut rewritten = 0usize;
    for (index, (id, sort)) in members.into_iter().enumerate() {
        let expected = index as i64;
        if sort != expected {
            tx.execute(
                "UPDATE blocks SET sort=?2 WHERE id=?1",
                params![id, expected],
            )?;
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

pub(in crate::store) fn map_page_row(row: &Row<'_>) -> rusqlite::Result<PageRow> {
    let type_raw: String = row.get(2)?;
    Ok(PageRow {
        id: row.get(0)?,
        title: row.get(1)?,
        // unknown stored type degrades instead of failing the page load
        page_type: PageType::parse(&type_raw).unwrap_or(PageType::Note),
        slug: row.get(3)?,
        created_at_ms: row.get(4)?,
        updated_at_ms: row.get(5)?,
    })
}

pub(in crate::store) const PAGE_COLUMNS: &str =
    "id, title, type, slug, created_at_ms, updated_at_ms";

pub(in crate::store) fn map_block_row(row: &Row<'_>) -> rusqlite::Result<BlockRow> {
    let type_raw: String = row.get(4)?;
    Ok(BlockRow {
        id: row.get(0)?,
        page_id: row.get(1)?,
        parent_id: row.get(2)?,
        sort: row.get(3)?,
        block_type: BlockType::parse(&type_raw).unwrap_or(BlockType::Paragraph),
        props_json: row.get(5)?,
        content_json: row.get(6)?,
        created_at_ms: row.get(7)?,
        updated_at_ms: row.get(8)?,
    })
}

pub(in crate::store) const BLOCK_COLUMNS: &str =
    "id, page_id, parent_id, sort, type, props_json, content_json, created_at_ms, updated_at_ms";

pub(in crate::store) fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
