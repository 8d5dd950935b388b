#![forbid(unsafe_code)]

use regex::Regex;
use std::collections::HashMap;


/// Lookup tables used when upgrading imported tokens to durable ids.
pub struct ResolveContext<'a> {
    /// Legacy href path -> page id.
    pub legacy_paths: &'a HashMap<String, String>,
    /// `normalize_title_key(title)` -> page id.
    pub titles_by_key: &'a HashMap<String, String>,
}

/// Case- and whitespace-insensitive key for title lookups.
pub fn normalize_title_key(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Produce the replacement for one imported token occurrence.
///
/// Resolution order encodes "prefer durable identity over text matching":
/// legacy-path map first, then normalized-title lookup, then an unresolved
/// `[[title]]` fallback, then the raw label.
pub fn resolve_token(
    ctx: &ResolveContext<'_>,
    href: Option<&str>,
    target_title: Option<&str>,
    label: &str,
) -> String {
    if let Some(href) = href {
        if let Some(page_id) = ctx.legacy_paths.get(href) {
            return format!("[[page:{page_id}|{label}]]");
        }
    }

    let title = target_title
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(label.trim());
    if !title.is_empty() {
        if let Some(page_id) = ctx.titles_by_key.get(&normalize_title_key(title)) {
            return format!("[[page:{page_id}|{label}]]");
        }
        return format!("[[{title}]]");
    }

    label.to_string()
}

/// Rewrite standalone occurrences of `term` into resolved link tokens.
///
/// Word-boundary aware when the term is plain `[A-Za-z0-9_-]+`, literal
/// substring otherwise. Text inside inline-code spans or existing
/// `[[...]]` tokens is never touched: the matcher only ever runs over
/// the segments between them. Returns the rewritten text and the number
/// of replacements (0 means no-op).
pub fn linkify(
    text: &str,
    term: &str,
    target_page_id: &str,
    case_sensitive: bool,
) -> (String, usize) {
    if term.is_empty() || target_page_id.is_empty() {
        return (text.to_string(), 0);
    }

    let word_like = term
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    let mut pattern = String::new();
    if !case_sensitive {
        pattern.push_str("(?i)");
    }
    if word_like {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(term));
    if word_like {
        pattern.push_str(r"\b");
    }
    let Ok(matcher) = Regex::new(&pattern) else {
        // regex::escape output always compiles
        return (text.to_string(), 0);
    };

    let mut replaced = 0usize;
    let mut out = String::with_capacity(text.len());
    for segment in segments(text) {
        match segment {
            Segment::Protected(span) => out.push_str(span),
            Segment::Plain(span) => {
                let rewritten = matcher.replace_all(span, |caps: &regex::Captures<'_>| {
                    replaced += 1;
                    format!("[[page:{target_page_id}|{}]]", &caps[0])
                });
                out.push_str(&rewritten);
            }
        }
    }

    if replaced == 0 {
        return (text.to_string(), 0);
    }
    (out, replaced)
}

/// Upgrade every literal `[[label]]` occurrence to a resolved token.
/// Already-resolved `[[page:...]]` tokens never match the literal form.
pub fn resolve_literal(text: &str, label: &str, target_page_id: &str) -> String {
    if label.is_empty() || target_page_id.is_empty() {
        return text.to_string();
    }
    let needle = format!("[[{label}]]");
    let replacement = format!("[[page:{target_page_id}|{label}]]");
    text.replace(&needle, &replacement)
}

/// Collapse doubly-wrapped tokens `[[page:ID|[[page:ID|Label]]]]` (same id
/// on both levels) to the single-wrapped form, repeating until a fixed
/// point. Each rewrite strictly shortens the string, so the input length
/// bounds the loop.
pub fn normalize_nested_tokens(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..text.len().max(1) {
        let next = collapse_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn collapse_once(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        if let Some((end, inner)) = collapse_at(text, i) {
            out.push_str(&inner);
            i = end;
            continue;
        }
        let Some(ch) = text[i..].chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// If `start` opens `[[page:ID|[[page:ID|...]]]]`, return the end of the
/// outer token and the inner token to keep in its place.
fn collapse_at(text: &str, start: usize) -> Option<(usize, String)> {
    let body = text[start..].strip_prefix("[[page:")?;
    let pipe = body.find('|')?;
    let id = &body[..pipe];
    if id.is_empty() || id.contains('[') || id.contains(']') {
        return None;
    }

    let inner_start = start + "[[page:".len() + pipe + 1;
    let inner_prefix = format!("[[page:{id}|");
    if !text[inner_start..].starts_with(&inner_prefix) {
        return None;
    }
    let inner_end = token_end(text, inner_start)?;
    if !text[inner_end..].starts_with("]]") {
        return None;
    }
    Some((inner_end + 2, text[inner_start..inner_end].to_string()))
}

/// End (exclusive) of the `[[...]]` token opening at `start`, counting
/// nested `[[`/`]]` pairs so defect tokens are spanned whole.
fn token_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with("[[") {
            depth += 1;
            i += 2;
        } else if rest.starts_with("]]") {
            depth = depth.checked_sub(1)?;
            i += 2;
            if depth == 0 {
                return Some(i);
            }
        } else {
            i += rest.chars().next()?.len_utf8();
        }
    }
    None
}

enum Segment<'a> {
    /// An inline-code span or a complete `[[...]]` token; copied through
    /// verbatim.
    Protected(&'a str),
    Plain(&'a str),
}

/// Split the text so inline-code spans and existing link tokens come out
/// as whole `Protected` segments and everything between them as `Plain`.
fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut plain_start = 0;
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        let protected_end = if rest.starts_with('`') {
            rest[1..].find('`').map(|close| i + 1 + close + 1)
        } else if rest.starts_with("[[") {
            token_end(text, i)
        } else {
            None
        };
        if let Some(end) = protected_end {
            if plain_start < i {
                out.push(Segment::Plain(&text[plain_start..i]));
            }
            out.push(Segment::Protected(&text[i..end]));
            i = end;
            plain_start = end;
            continue;
        }
        let Some(ch) = rest.chars().next() else {
            break;
        };
        i += ch.len_utf8();
    }
    if plain_start < text.len() {
        out.push(Segment::Plain(&text[plain_start..]));
    }
    out
}
