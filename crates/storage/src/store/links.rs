#![forbid(unsafe_code)]

use super::{
    LinkScope, LinkUpdateSummary, LinkifyRequest, LinkifySummary, ResolveLinksRequest,
    SqliteStore, StoreError, now_ms, page_exists_tx, touch_page_tx,
};
use lb_core::content::parse_object;
use lb_core::links::{linkify, normalize_nested_tokens, resolve_literal};
use rusqlite::{Transaction, params};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

struct ScopedBlock {
    id: String,
    page_id: String,
    props_json: String,
    content_json: String,
}

impl SqliteStore {
    /// Upgrade every literal `[[label]]` occurrence in scope to a
    /// resolved token pointing at `target_page_id`, collapsing any
    /// doubly-wrapped tokens produced along the way. One transaction;
    /// each updated page is touched once.
    pub fn resolve_links(
        &mut self,
        request: ResolveLinksRequest,
    ) -> Result<LinkUpdateSummary, StoreError> {
        let label = request.label.trim().to_string();
        if label.is_empty() {
            return Err(StoreError::InvalidInput("label must not be empty"));
        }
        if request.target_page_id.is_empty() {
            return Err(StoreError::InvalidInput("target page id must not be empty"));
        }

        let now = now_ms();
        let tx = self.transaction()?;
        if !page_exists_tx(&tx, &request.target_page_id)? {
            return Err(StoreError::UnknownPage);
        }

        let mut updated_blocks = 0usize;
        let mut updated_pages: BTreeSet<String> = BTreeSet::new();
        for block in scoped_blocks_tx(&tx, &request.scope)? {
            let mut rewrite = |text: &str| {
                normalize_nested_tokens(&resolve_literal(text, &label, &request.target_page_id))
            };
            if apply_rewrite_tx(&tx, &block, now, &mut rewrite)? {
                updated_blocks += 1;
                updated_pages.insert(block.page_id);
            }
        }

        for page_id in &updated_pages {
            touch_page_tx(&tx, page_id, now)?;
        }
        tx.commit()?;

        Ok(LinkUpdateSummary {
            updated_pages: updated_pages.len(),
            updated_blocks,
        })
    }

    /// Rewrite standalone occurrences of `term` in scope into resolved
    /// tokens. Inline code and existing tokens are left alone (see
    /// `lb_core::links::linkify`).
    pub fn linkify_links(&mut self, request: LinkifyRequest) -> Result<LinkifySummary, StoreError> {
        let term = request.term.trim().to_string();
        if term.is_empty() {
            return Err(StoreError::InvalidInput("term must not be empty"));
        }
        if request.target_page_id.is_empty() {
            return Err(StoreError::InvalidInput("target page id must not be empty"));
        }

        let now = now_ms();
        let tx = self.transaction()?;
        if !page_exists_tx(&tx, &request.target_page_id)? {
            return Err(StoreError::UnknownPage);
        }

        let mut updated_blocks = 0usize;
        let mut linked_occurrences = 0usize;
        let mut updated_pages: BTreeSet<String> = BTreeSet::new();
        for block in scoped_blocks_tx(&tx, &request.scope)? {
            let mut rewrite = |text: &str| {
                let (out, replaced) = linkify(
                    text,
                    &term,
                    &request.target_page_id,
                    request.case_sensitive,
                );
                linked_occurrences += replaced;
                out
            };
            if apply_rewrite_tx(&tx, &block, now, &mut rewrite)? {
                updated_blocks += 1;
                updated_pages.insert(block.page_id);
            }
        }

        for page_id in &updated_pages {
            touch_page_tx(&tx, page_id, now)?;
        }
        tx.commit()?;

        Ok(LinkifySummary {
            updated_pages: updated_pages.len(),
            updated_blocks,
            linked_occurrences,
        })
    }
}

fn scoped_blocks_tx(
    tx: &Transaction<'_>,
    scope: &LinkScope,
) -> Result<Vec<ScopedBlock>, StoreError> {
    let mut stmt =
        tx.prepare("SELECT id, page_id, props_json, content_json FROM blocks ORDER BY id ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(ScopedBlock {
            id: row.get(0)?,
            page_id: row.get(1)?,
            props_json: row.get(2)?,
            content_json: row.get(3)?,
        })
    })?;

    let wanted: Option<HashSet<&str>> = match scope {
        LinkScope::All => None,
        LinkScope::Pages(ids) => Some(ids.iter().map(String::as_str).collect()),
    };

    let mut blocks = Vec::new();
    for row in rows {
        let block = row?;
        if wanted
            .as_ref()
            .is_none_or(|pages| pages.contains(block.page_id.as_str()))
        {
            blocks.push(block);
        }
    }
    Ok(blocks)
}

/// Apply a text rewrite to every string field of the block's props and
/// content JSON. Writes the row back only when something changed; a blob
/// that fails to parse degrades to `{}` and is left untouched unless a
/// rewrite actually fires.
fn apply_rewrite_tx(
    tx: &Transaction<'_>,
    block: &ScopedBlock,
    now_ms: i64,
    rewrite: &mut dyn FnMut(&str) -> String,
) -> Result<bool, StoreError> {
    let mut props = parse_object(&block.props_json);
    let mut content = parse_object(&block.content_json);

    let props_changed = rewrite_strings(&mut props, rewrite);
    let content_changed = rewrite_strings(&mut content, rewrite);
    if !props_changed && !content_changed {
        return Ok(false);
    }

    let props_json = if props_changed {
        props.to_string()
    } else {
        block.props_json.clone()
    };
    let content_json = if content_changed {
        content.to_string()
    } else {
        block.content_json.clone()
    };

    tx.execute(
        "UPDATE blocks SET props_json=?2, content_json=?3, updated_at_ms=?4 WHERE id=?1",
        params![block.id, props_json, content_json, now_ms],
    )?;
    Ok(true)
}

fn rewrite_strings(value: &mut Value, rewrite: &mut dyn FnMut(&str) -> String) -> bool {
    match value {
        Value::String(text) => {
            let out = rewrite(text);
            if out != *text {
                *text = out;
                true
            } else {
                false
            }
        }
        Value::Array(items) => {
            let mut changed = false;
            for item in items {
                if rewrite_strings(item, rewrite) {
                    changed = true;
                }
            }
            changed
        }
        Value::Object(map) => {
            let mut changed = false;
            for item in map.values_mut() {
                if rewrite_strings(item, rewrite) {
                    changed = true;
                }
            }
            changed
        }
        _ => false,
    }
}
