#![forbid(unsafe_code)]

use super::{
    CreatePageRequest, PAGE_COLUMNS, PageRow, PatchPageRequest, SqliteStore, StoreError,
    map_page_row, mint_page_id_tx, now_ms,
};
use lb_core::model::PageType;
use lb_core::slug::slugify;
use rusqlite::{OptionalExtension, Transaction, params};

const MAX_SLUG_PROBES: u32 = 100_000;

impl SqliteStore {
    pub fn create_page(&mut self, request: CreatePageRequest) -> Result<PageRow, StoreError> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(StoreError::InvalidInput("title must not be empty"));
        }

        let now = now_ms();
        let tx = self.transaction()?;
        let page = create_page_tx(&tx, &title, request.page_type, now)?;
        tx.commit()?;
        Ok(page)
    }

    /// Partial update. The slug is only recomputed when `regenerate_slug`
    /// is set; a title change alone never breaks an existing permalink.
    pub fn patch_page(&mut self, request: PatchPageRequest) -> Result<PageRow, StoreError> {
        if request.title.is_none() && request.page_type.is_none() && !request.regenerate_slug {
            return Err(StoreError::InvalidInput("no fields to patch"));
        }

        let now = now_ms();
        let tx = self.transaction()?;

        let Some(current) = get_page_tx(&tx, &request.id)? else {
            return Err(StoreError::UnknownPage);
        };

        let title = match request.title {
            Some(title) => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(StoreError::InvalidInput("title must not be empty"));
                }
                title
            }
            None => current.title,
        };
        let page_type = request.page_type.unwrap_or(current.page_type);
        let slug = if request.regenerate_slug {
            unique_slug_tx(&tx, &slugify(&title), Some(&request.id))?
        } else {
            current.slug
        };

        tx.execute(
            "UPDATE pages SET title=?2, type=?3, slug=?4, updated_at_ms=?5 WHERE id=?1",
            params![request.id, title, page_type.as_str(), slug, now],
        )?;
        tx.commit()?;

        Ok(PageRow {
            id: request.id,
            title,
            page_type,
            slug,
            created_at_ms: current.created_at_ms,
            updated_at_ms: now,
        })
    }

    /// Exact-title lookup first; creates the page only on a miss. The
    /// bool is true when a page was created.
    pub fn resolve_or_create_page(
        &mut self,
        title: &str,
        page_type: PageType,
    ) -> Result<(PageRow, bool), StoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::InvalidInput("title must not be empty"));
        }

        let now = now_ms();
        let tx = self.transaction()?;

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {PAGE_COLUMNS} FROM pages WHERE title=?1 ORDER BY created_at_ms ASC, id ASC LIMIT 1"
                ),
                params![title],
                map_page_row,
            )
            .optional()?;
        if let Some(page) = existing {
            return Ok((page, false));
        }

        let page = create_page_tx(&tx, title, page_type, now)?;
        tx.commit()?;
        Ok((page, true))
    }

    pub fn get_page(&self, id: &str) -> Result<Option<PageRow>, StoreError> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id=?1"),
                params![id],
                map_page_row,
            )
            .optional()?)
    }

    pub fn get_page_by_slug(&self, slug: &str) -> Result<PageRow, StoreError> {
        self.conn()
            .query_row(
                &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE slug=?1"),
                params![slug],
                map_page_row,
            )
            .optional()?
            .ok_or(StoreError::UnknownSlug)
    }

    pub fn list_pages(&self, limit: usize, offset: usize) -> Result<Vec<PageRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            &format!(
                "SELECT {PAGE_COLUMNS} FROM pages ORDER BY updated_at_ms DESC, id ASC LIMIT ?1 OFFSET ?2"
            ),
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], map_page_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Removes the page and every block it owns in one transaction.
    pub fn delete_page(&mut self, id: &str) -> Result<(), StoreError> {
        let tx = self.transaction()?;
        tx.execute("DELETE FROM blocks WHERE page_id=?1", params![id])?;
        let deleted = tx.execute("DELETE FROM pages WHERE id=?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::UnknownPage);
        }
        tx.commit()?;
        Ok(())
    }
}

pub(in crate::store) fn get_page_tx(
    tx: &Transaction<'_>,
    id: &str,
) -> Result<Option<PageRow>, StoreError> {
    Ok(tx
        .query_row(
            &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id=?1"),
            params![id],
            map_page_row,
        )
        .optional()?)
}

pub(in crate::store) fn create_page_tx(
    tx: &Transaction<'_>,
    title: &str,
    page_type: PageType,
    now_ms: i64,
) -> Result<PageRow, StoreError> {
    let id = mint_page_id_tx(tx)?;
    let slug = unique_slug_tx(tx, &slugify(title), None)?;
    tx.execute(
        r#"
        INSERT INTO pages(id, title, type, slug, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![id, title, page_type.as_str(), slug, now_ms, now_ms],
    )?;
    Ok(PageRow {
        id,
        title: title.to_string(),
        page_type,
        slug,
        created_at_ms: now_ms,
        updated_at_ms: now_ms,
    })
}

fn slug_taken_tx(
    tx: &Transaction<'_>,
    slug: &str,
    exclude_id: Option<&str>,
) -> Result<bool, StoreError> {
    let hit = match exclude_id {
        Some(id) => tx
            .query_row(
                "SELECT 1 FROM pages WHERE slug=?1 AND id<>?2",
                params![slug, id],
                |_| Ok(()),
            )
            .optional()?,
        None => tx
            .query_row("SELECT 1 FROM pages WHERE slug=?1", params![slug], |_| Ok(()))
            .optional()?,
    };
    Ok(hit.is_some())
}

/// Probe `base`, `base-2`, `base-3`, ... for a free slug. The probe count
/// is bounded to guarantee termination; past it a time-derived suffix is
/// appended instead.
fn unique_slug_tx(
    tx: &Transaction<'_>,
    base: &str,
    exclude_id: Option<&str>,
) -> Result<String, StoreError> {
    if !slug_taken_tx(tx, base, exclude_id)? {
        return Ok(base.to_string());
    }
    for n in 2..=MAX_SLUG_PROBES {
        let candidate = format!("{base}-{n}");
        if !slug_taken_tx(tx, &candidate, exclude_id)? {
            return Ok(candidate);
        }
    }

    let mut nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    loop {
        let candidate = format!("{base}-{nonce:08x}");
        if !slug_taken_tx(tx, &candidate, exclude_id)? {
            return Ok(candidate);
        }
        nonce = nonce.wrapping_add(1);
    }
}
