#![forbid(unsafe_code)]

use super::{BacklinkRow, PageBacklinks, SqliteStore, StoreError};
use lb_core::content::BlockContent;
use lb_core::model::{BlockType, PageType};
use rusqlite::params;
use std::collections::HashMap;

struct Referrer {
    title: String,
    page_type: PageType,
    updated_at_ms: i64,
    count: i64,
    matched: bool,
}

impl SqliteStore {
    /// Derive "who links to this page" by scanning paragraph blocks on
    /// every other page for the literal `[[<title>]]` token or the
    /// resolved-token prefix `[[page:<id>`. Nothing is persisted.
    pub fn get_backlinks(&self, page_id: &str) -> Result<PageBacklinks, StoreError> {
        let page = self.get_page(page_id)?.ok_or(StoreError::UnknownPage)?;

        let title_needle = format!("[[{}]]", page.title);
        let id_needle = format!("[[page:{}", page.id);

        let mut referrers: HashMap<String, Referrer> = HashMap::new();
        let mut stmt = self.conn().prepare(
            r#"
            SELECT b.page_id, b.content_json, p.title, p.type, p.updated_at_ms
            FROM blocks b
            JOIN pages p ON p.id = b.page_id
            WHERE b.type='paragraph' AND b.page_id <> ?1 AND b.content_json LIKE '%[[%'
            "#,
        )?;
        let rows = stmt.query_map(params![page.id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        for row in rows {
            let (referrer_id, content_json, title, type_raw, updated_at_ms) = row?;
            let content = BlockContent::decode(BlockType::Paragraph, &content_json);
            let Some(text) = content.text() else {
                continue;
            };

            let count =
                count_occurrences(text, &title_needle) + count_occurrences(text, &id_needle);
            let matched = text.contains(&title_needle) || text.contains(&id_needle);
            if !matched && count == 0 {
                continue;
            }

            let entry = referrers.entry(referrer_id).or_insert_with(|| Referrer {
                title: title.clone(),
                page_type: PageType::parse(&type_raw).unwrap_or(PageType::Note),
                updated_at_ms,
                count: 0,
                matched: false,
            });
            entry.count += count;
            entry.matched |= matched;
        }

        let mut backlinks: Vec<(BacklinkRow, i64)> = referrers
            .into_iter()
            .map(|(id, referrer)| {
                // a match with a zero identity count still reports 1
                let count = if referrer.matched {
                    referrer.count.max(1)
                } else {
                    referrer.count
                };
                (
                    BacklinkRow {
                        id,
                        title: referrer.title,
                        page_type: referrer.page_type,
                        count,
                    },
                    referrer.updated_at_ms,
                )
            })
            .collect();
        backlinks.sort_by(|(a, a_updated), (b, b_updated)| {
            b.count
                .cmp(&a.count)
                .then(b_updated.cmp(a_updated))
                .then(a.id.cmp(&b.id))
        });

        Ok(PageBacklinks {
            page_id: page.id,
            title: page.title,
            backlinks: backlinks.into_iter().map(|(row, _)| row).collect(),
        })
    }
}

/// Occurrence count via the removal identity:
/// `(len(h) - len(h_without_needle)) / len(needle)`.
fn count_occurrences(haystack: &str, needle: &str) -> i64 {
    if needle.is_empty() {
        return 0;
    }
    ((haystack.len() - haystack.replace(needle, "").len()) / needle.len()) as i64
}
