#![forbid(unsafe_code)]

use super::{
    BLOCK_COLUMNS, BlockMove, BlockRow, CreateBlockRequest, PageWithBlocks, PatchBlockRequest,
    ReorderOutcome, SqliteStore, StoreError, map_block_row, mint_block_id_tx,
    normalize_sibling_group_tx, now_ms, page_exists_tx, touch_page_tx,
};
use rusqlite::{OptionalExtension, Transaction, params};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

impl SqliteStore {
    pub fn create_block(&mut self, request: CreateBlockRequest) -> Result<BlockRow, StoreError> {
        if request.sort < 0 {
            return Err(StoreError::InvalidInput("sort must be >= 0"));
        }

        let now = now_ms();
        let tx = self.transaction()?;

        if !page_exists_tx(&tx, &request.page_id)? {
            return Err(StoreError::UnknownPage);
        }
        if let Some(parent_id) = request.parent_id.as_deref() {
            ensure_same_page_parent_tx(&tx, &request.page_id, parent_id)?;
        }

        let id = mint_block_id_tx(&tx)?;
        tx.execute(
            r#"
            INSERT INTO blocks(id, page_id, parent_id, sort, type, props_json, content_json, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                id,
                request.page_id,
                request.parent_id,
                request.sort,
                request.block_type.as_str(),
                request.props_json,
                request.content_json,
                now,
                now
            ],
        )?;

        normalize_sibling_group_tx(&tx, &request.page_id, request.parent_id.as_deref())?;
        touch_page_tx(&tx, &request.page_id, now)?;

        // re-read: normalization settles the final sort value
        let row = get_block_tx(&tx, &id)?.ok_or(StoreError::UnknownBlock)?;
        tx.commit()?;
        Ok(row)
    }

    /// Merge the provided fields into the block. When the parent or sort
    /// changes, both the origin and destination sibling groups are
    /// renormalized in the same transaction.
    pub fn patch_block(
        &mut self,
        id: &str,
        request: PatchBlockRequest,
    ) -> Result<BlockRow, StoreError> {
        let now = now_ms();
        let tx = self.transaction()?;

        let Some(current) = get_block_tx(&tx, id)? else {
            return Err(StoreError::UnknownBlock);
        };

        let parent_id = match request.parent_id {
            Some(parent_id) => parent_id,
            None => current.parent_id.clone(),
        };
        if parent_id != current.parent_id {
            if let Some(parent) = parent_id.as_deref() {
                if parent == id {
                    return Err(StoreError::InvalidInput("block cannot be its own parent"));
                }
                ensure_same_page_parent_tx(&tx, &current.page_id, parent)?;
            }
        }

        let sort = request.sort.unwrap_or(current.sort);
        if sort < 0 {
            return Err(StoreError::InvalidInput("sort must be >= 0"));
        }
        let block_type = request.block_type.unwrap_or(current.block_type);
        let props_json = request.props_json.unwrap_or(current.props_json);
        let content_json = request.content_json.unwrap_or(current.content_json);

        tx.execute(
            r#"
            UPDATE blocks
            SET parent_id=?2, sort=?3, type=?4, props_json=?5, content_json=?6, updated_at_ms=?7
            WHERE id=?1
            "#,
            params![
                id,
                parent_id,
                sort,
                block_type.as_str(),
                props_json,
                content_json,
                now
            ],
        )?;

        let parent_changed = parent_id != current.parent_id;
        if parent_changed {
            normalize_sibling_group_tx(&tx, &current.page_id, current.parent_id.as_deref())?;
            normalize_sibling_group_tx(&tx, &current.page_id, parent_id.as_deref())?;
        } else if sort != current.sort {
            normalize_sibling_group_tx(&tx, &current.page_id, parent_id.as_deref())?;
        }
        touch_page_tx(&tx, &current.page_id, now)?;

        let row = get_block_tx(&tx, id)?.ok_or(StoreError::UnknownBlock)?;
        tx.commit()?;
        Ok(row)
    }

    /// Deletes the block and its whole subtree. Descendants are collected
    /// breadth-first with a visited set so a corrupted (cyclic) parent
    /// chain cannot loop the collector. Returns the number of deleted
    /// blocks.
    pub fn delete_block(&mut self, id: &str) -> Result<usize, StoreError> {
        let now = now_ms();
        let tx = self.transaction()?;

        let Some(root) = get_block_tx(&tx, id)? else {
            return Err(StoreError::UnknownBlock);
        };

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        {
            let mut stmt =
                tx.prepare("SELECT id, parent_id FROM blocks WHERE page_id=?1")?;
            let rows = stmt.query_map(params![root.page_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?;
            for row in rows {
                let (block_id, parent_id) = row?;
                if let Some(parent_id) = parent_id {
                    children.entry(parent_id).or_default().push(block_id);
                }
            }
        }

        let mut doomed: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(root.id.clone());
        while let Some(block_id) = queue.pop_front() {
            if !visited.insert(block_id.clone()) {
                continue;
            }
            if let Some(block_children) = children.get(&block_id) {
                queue.extend(block_children.iter().cloned());
            }
            doomed.push(block_id);
        }

        for block_id in &doomed {
            tx.execute("DELETE FROM blocks WHERE id=?1", params![block_id])?;
        }

        normalize_sibling_group_tx(&tx, &root.page_id, root.parent_id.as_deref())?;
        touch_page_tx(&tx, &root.page_id, now)?;

        tx.commit()?;
        Ok(doomed.len())
    }

    /// Best-effort batch move. Entries whose block does not belong to
    /// `page_id`, or whose destination parent is not a same-page block,
    /// are silently skipped. Normalization runs once per distinct sibling
    /// group touched (origins included); the page is touched once.
    pub fn reorder_blocks(
        &mut self,
        page_id: &str,
        moves: &[BlockMove],
    ) -> Result<ReorderOutcome, StoreError> {
        let now = now_ms();
        let tx = self.transaction()?;

        if !page_exists_tx(&tx, page_id)? {
            return Err(StoreError::UnknownPage);
        }
        if moves.is_empty() {
            return Ok(ReorderOutcome::default());
        }

        let mut block_parents: HashMap<String, Option<String>> = HashMap::new();
        {
            let mut stmt =
                tx.prepare("SELECT id, parent_id FROM blocks WHERE page_id=?1")?;
            let rows = stmt.query_map(params![page_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?;
            for row in rows {
                let (block_id, parent_id) = row?;
                block_parents.insert(block_id, parent_id);
            }
        }

        let mut outcome = ReorderOutcome::default();
        let mut touched: BTreeSet<Option<String>> = BTreeSet::new();
        for block_move in moves {
            let Some(origin_parent) = block_parents.get(&block_move.id) else {
                // foreign or unknown block
                outcome.skipped += 1;
                continue;
            };
            if block_move.sort < 0 {
                outcome.skipped += 1;
                continue;
            }
            if let Some(parent) = block_move.parent_id.as_deref() {
                if parent == block_move.id || !block_parents.contains_key(parent) {
                    outcome.skipped += 1;
                    continue;
                }
            }

            tx.execute(
                "UPDATE blocks SET parent_id=?2, sort=?3 WHERE id=?1 AND page_id=?4",
                params![block_move.id, block_move.parent_id, block_move.sort, page_id],
            )?;
            touched.insert(origin_parent.clone());
            touched.insert(block_move.parent_id.clone());
            outcome.applied += 1;
        }

        for parent_id in &touched {
            normalize_sibling_group_tx(&tx, page_id, parent_id.as_deref())?;
        }
        if outcome.applied > 0 {
            touch_page_tx(&tx, page_id, now)?;
        }

        tx.commit()?;
        Ok(outcome)
    }

    pub fn get_block(&self, id: &str) -> Result<Option<BlockRow>, StoreError> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id=?1"),
                params![id],
                map_block_row,
            )
            .optional()?)
    }

    /// The page plus all its blocks: top-level first, then each parent's
    /// children grouped together in sort order.
    pub fn get_page_with_blocks(&self, page_id: &str) -> Result<PageWithBlocks, StoreError> {
        let page = self.get_page(page_id)?.ok_or(StoreError::UnknownPage)?;

        let mut stmt = self.conn().prepare(&format!(
            r#"
            SELECT {BLOCK_COLUMNS}
            FROM blocks
            WHERE page_id=?1
            ORDER BY (parent_id IS NOT NULL) ASC, parent_id ASC, sort ASC, created_at_ms ASC
            "#
        ))?;
        let blocks = stmt
            .query_map(params![page_id], map_block_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageWithBlocks { page, blocks })
    }
}

pub(in crate::store) fn get_block_tx(
    tx: &Transaction<'_>,
    id: &str,
) -> Result<Option<BlockRow>, StoreError> {
    Ok(tx
        .query_row(
            &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id=?1"),
            params![id],
            map_block_row,
        )
        .optional()?)
}

fn ensure_same_page_parent_tx(
    tx: &Transaction<'_>,
    page_id: &str,
    parent_id: &str,
) -> Result<(), StoreError> {
    let parent_page: Option<String> = tx
        .query_row(
            "SELECT page_id FROM blocks WHERE id=?1",
            params![parent_id],
            |row| row.get(0),
        )
        .optional()?;
    match parent_page {
        Some(parent_page) if parent_page == page_id => Ok(()),
        _ => Err(StoreError::InvalidInput(
            "parent must be a block on the same page",
        )),
    }
}
