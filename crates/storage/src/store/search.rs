#![forbid(unsafe_code)]

use super::{
    DetailedSearchHit, MatchField, PAGE_COLUMNS, PageRow, SearchHit, SearchMatch, SqliteStore,
    StoreError, escape_like, map_page_row,
};
use lb_core::content::BlockContent;
use lb_core::model::BlockType;
use rusqlite::params;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_SEARCH_LIMIT: usize = 30;
pub const SNIPPET_MAX_CHARS: usize = 140;
pub const SECTION_PATH_MAX_DEPTH: usize = 32;

const EXCERPT_BEFORE: usize = 60;
const EXCERPT_AFTER: usize = 80;

struct TextBlock {
    id: String,
    parent_id: Option<String>,
    block_type: BlockType,
    text: Option<String>,
}

impl SqliteStore {
    /// Case-insensitive substring search over page titles and paragraph
    /// text. One snippet per matching page, most recently updated first.
    pub fn search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let needle = query.to_lowercase();

        let mut hits = Vec::new();
        for page in self.candidate_pages(query, false)? {
            if hits.len() >= limit {
                break;
            }

            let paragraphs = self.page_paragraph_texts(&page.id)?;
            let title_matched = page.title.to_lowercase().contains(&needle);
            let matching = paragraphs
                .iter()
                .find(|text| text.to_lowercase().contains(&needle));
            if !title_matched && matching.is_none() {
                // LIKE prefilter hit something outside real text (a JSON
                // key, an escaped sequence); not a match
                continue;
            }

            let snippet = matching.or(paragraphs.first()).map(|text| snippet_of(text));
            hits.push(SearchHit {
                id: page.id,
                title: page.title,
                page_type: page.page_type,
                slug: page.slug,
                updated_at_ms: page.updated_at_ms,
                snippet,
            });
        }
        Ok(hits)
    }

    /// Detailed variant: per matching page, up to `per_page_match_limit`
    /// match locations (title first, then blocks in document order), each
    /// with its ancestor-section path and a context excerpt. The reported
    /// `match_count` is the total occurrence count, not the excerpt cap.
    pub fn search_with_matches(
        &self,
        query: &str,
        limit: Option<usize>,
        per_page_match_limit: usize,
    ) -> Result<Vec<DetailedSearchHit>, StoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

        let mut hits = Vec::new();
        for page in self.candidate_pages(query, true)? {
            if hits.len() >= limit {
                break;
            }

            let blocks = self.page_text_blocks(&page.id)?;
            let by_id: HashMap<&str, &TextBlock> = blocks
                .iter()
                .map(|block| (block.id.as_str(), block))
                .collect();

            let mut match_count = 0usize;
            let mut matches: Vec<SearchMatch> = Vec::new();

            let title_positions = find_all_ci(&page.title, query);
            match_count += title_positions.len();
            if let Some(&(index, len)) = title_positions.first() {
                matches.push(SearchMatch {
                    block_id: None,
                    field: MatchField::Title,
                    section_path: Vec::new(),
                    excerpt: excerpt_of(&page.title, index, len),
                });
            }

            for block in &blocks {
                let Some(text) = block.text.as_deref() else {
                    continue;
                };
                let field = match block.block_type {
                    BlockType::Paragraph => MatchField::Paragraph,
                    BlockType::Quote => MatchField::Quote,
                    BlockType::Heading => MatchField::Heading,
                    BlockType::Section => MatchField::SectionTitle,
                    BlockType::Divider | BlockType::Image => continue,
                };

                let positions = find_all_ci(text, query);
                match_count += positions.len();
                for (index, len) in positions {
                    if matches.len() >= per_page_match_limit {
                        break;
                    }
                    matches.push(SearchMatch {
                        block_id: Some(block.id.clone()),
                        field,
                        section_path: section_path(&by_id, block.parent_id.as_deref()),
                        excerpt: excerpt_of(text, index, len),
                    });
                }
            }

            if match_count == 0 {
                continue;
            }
            hits.push(DetailedSearchHit {
                id: page.id,
                title: page.title,
                page_type: page.page_type,
                slug: page.slug,
                updated_at_ms: page.updated_at_ms,
                match_count,
                matches,
            });
        }
        Ok(hits)
    }

    /// LIKE-prefiltered candidates, most recently updated first. The
    /// caller re-verifies matches in Rust.
    fn candidate_pages(
        &self,
        query: &str,
        include_structured_text: bool,
    ) -> Result<Vec<PageRow>, StoreError> {
        let like = format!("%{}%", escape_like(query));

        let mut pages: Vec<PageRow> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let mut stmt = self.conn().prepare(&format!(
            r"SELECT {PAGE_COLUMNS} FROM pages WHERE title LIKE ?1 ESCAPE '\'"
        ))?;
        for row in stmt.query_map(params![like], map_page_row)? {
            let page = row?;
            if seen.insert(page.id.clone()) {
                pages.push(page);
            }
        }

        let type_filter = if include_structured_text {
            "b.type IN ('paragraph', 'quote', 'heading', 'section')"
        } else {
            "b.type = 'paragraph'"
        };
        let mut stmt = self.conn().prepare(&format!(
            r"
            SELECT DISTINCT p.id, p.title, p.type, p.slug, p.created_at_ms, p.updated_at_ms
            FROM pages p
            JOIN blocks b ON b.page_id = p.id
            WHERE {type_filter} AND b.content_json LIKE ?1 ESCAPE '\'
            "
        ))?;
        for row in stmt.query_map(params![like], map_page_row)? {
            let page = row?;
            if seen.insert(page.id.clone()) {
                pages.push(page);
            }
        }

        pages.sort_by(|a, b| {
            b.updated_at_ms
                .cmp(&a.updated_at_ms)
                .then(a.id.cmp(&b.id))
        });
        Ok(pages)
    }

    fn page_paragraph_texts(&self, page_id: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT content_json
            FROM blocks
            WHERE page_id=?1 AND type='paragraph'
            ORDER BY (parent_id IS NOT NULL) ASC, parent_id ASC, sort ASC, created_at_ms ASC
            "#,
        )?;
        let rows = stmt.query_map(params![page_id], |row| row.get::<_, String>(0))?;

        let mut texts = Vec::new();
        for row in rows {
            let content = BlockContent::decode(BlockType::Paragraph, &row?);
            if let Some(text) = content.text() {
                if !text.is_empty() {
                    texts.push(text.to_string());
                }
            }
        }
        Ok(texts)
    }

    fn page_text_blocks(&self, page_id: &str) -> Result<Vec<TextBlock>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, parent_id, type, content_json
            FROM blocks
            WHERE page_id=?1
            ORDER BY (parent_id IS NOT NULL) ASC, parent_id ASC, sort ASC, created_at_ms ASC
            "#,
        )?;
        let rows = stmt.query_map(params![page_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut blocks = Vec::new();
        for row in rows {
            let (id, parent_id, type_raw, content_json) = row?;
            let block_type = BlockType::parse(&type_raw).unwrap_or(BlockType::Paragraph);
            let text = BlockContent::decode(block_type, &content_json)
                .text()
                .filter(|text| !text.is_empty())
                .map(str::to_string);
            blocks.push(TextBlock {
                id,
                parent_id,
                block_type,
                text,
            });
        }
        Ok(blocks)
    }
}

/// Ancestor section titles, outermost first. Bounded by a max depth and a
/// visited set: the stored tree does not guarantee acyclicity.
fn section_path<'a>(
    blocks_by_id: &HashMap<&str, &'a TextBlock>,
    mut parent: Option<&'a str>,
) -> Vec<String> {
    let mut path = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    for _ in 0..SECTION_PATH_MAX_DEPTH {
        let Some(parent_id) = parent else {
            break;
        };
        if !visited.insert(parent_id.to_string()) {
            break;
        }
        let Some(block) = blocks_by_id.get(parent_id) else {
            break;
        };
        if block.block_type == BlockType::Section {
            if let Some(title) = block.text.as_deref() {
                path.push(title.to_string());
            }
        }
        parent = block.parent_id.as_deref();
    }
    path.reverse();
    path
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn snippet_of(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    let mut out: String = collapsed.chars().take(SNIPPET_MAX_CHARS).collect();
    if collapsed.chars().count() > SNIPPET_MAX_CHARS {
        out.push('…');
    }
    out
}

/// Context window `[index-60, index+len+80]` clamped to char boundaries,
/// with ellipses marking truncation.
fn excerpt_of(text: &str, match_index: usize, match_len: usize) -> String {
    let mut start = match_index.saturating_sub(EXCERPT_BEFORE);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (match_index + match_len + EXCERPT_AFTER).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }

    let mut out = String::new();
    if start > 0 {
        out.push('…');
    }
    out.push_str(&collapse_whitespace(&text[start..end]));
    if end < text.len() {
        out.push('…');
    }
    out
}

/// Byte positions and lengths of case-insensitive, non-overlapping
/// occurrences of `query` in `text`. Case folding is char-wise
/// `to_lowercase`, so multi-char expansions (ß → ss) compare correctly.
fn find_all_ci(text: &str, query: &str) -> Vec<(usize, usize)> {
    let query_folded: Vec<char> = query.chars().flat_map(char::to_lowercase).collect();
    if query_folded.is_empty() {
        return Vec::new();
    }
    let indices: Vec<(usize, char)> = text.char_indices().collect();

    let mut out = Vec::new();
    let mut i = 0;
    while i < indices.len() {
        match match_at(&indices, i, &query_folded) {
            Some((len, next)) => {
                out.push((indices[i].0, len));
                i = next;
            }
            None => i += 1,
        }
    }
    out
}

fn match_at(
    indices: &[(usize, char)],
    start: usize,
    query_folded: &[char],
) -> Option<(usize, usize)> {
    let mut qi = 0usize;
    for (offset, &(byte_index, ch)) in indices[start..].iter().enumerate() {
        for folded in ch.to_lowercase() {
            if qi >= query_folded.len() {
                break;
            }
            if folded != query_folded[qi] {
                return None;
            }
            qi += 1;
        }
        if qi >= query_folded.len() {
            let end = byte_index + ch.len_utf8();
            return Some((end - indices[start].0, start + offset + 1));
        }
    }
    None
}
