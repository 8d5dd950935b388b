#![forbid(unsafe_code)]

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

pub const SLUG_FALLBACK: &str = "page";

/// Letters that canonical decomposition cannot reduce to ASCII on its own.
fn transliterate(ch: char) -> Option<&'static str> {
    match ch {
        'Å' | 'å' | 'Ä' | 'ä' => Some("a"),
        'Ö' | 'ö' | 'Ø' | 'ø' => Some("o"),
        'Æ' | 'æ' => Some("ae"),
        'Œ' | 'œ' => Some("oe"),
        'ß' => Some("ss"),
        'Þ' | 'þ' => Some("th"),
        'Đ' | 'đ' | 'Ð' | 'ð' => Some("d"),
        'Ł' | 'ł' => Some("l"),
        _ => None,
    }
}

pub fn slugify(title: &str) -> String {
    let mut ascii_ish = String::with_capacity(title.len());
    for ch in title.chars() {
        match transliterate(ch) {
            Some(replacement) => ascii_ish.push_str(replacement),
            None => ascii_ish.push(ch),
        }
    }

    let decomposed = ascii_ish.nfd().filter(|ch| !is_combining_mark(*ch));

    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for ch in decomposed.flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        SLUG_FALLBACK.to_string()
    } else {
        slug
    }
}
