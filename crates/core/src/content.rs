#![forbid(unsafe_code)]

use crate::model::BlockType;
use serde_json::Value;

/// Typed view over a block's `content` payload. Decoding is lenient:
/// malformed or missing fields degrade to the type's default variant so a
/// page load never fails on partially-written data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockContent {
    Section { title: String },
    Heading { text: String },
    Paragraph { text: String },
    Quote { text: String },
    Divider,
    Image { src: String, alt: Option<String> },
}

impl BlockContent {
    pub fn default_for(block_type: BlockType) -> Self {
        match block_type {
            BlockType::Section => Self::Section { title: String::new() },
            BlockType::Heading => Self::Heading { text: String::new() },
            BlockType::Paragraph => Self::Paragraph { text: String::new() },
            BlockType::Quote => Self::Quote { text: String::new() },
            BlockType::Divider => Self::Divider,
            BlockType::Image => Self::Image {
                src: String::new(),
                alt: None,
            },
        }
    }

    pub fn decode(block_type: BlockType, raw: &str) -> Self {
        let value = parse_object(raw);
        match block_type {
            BlockType::Section => Self::Section {
                title: string_field(&value, "title"),
            },
            BlockType::Heading => Self::Heading {
                text: string_field(&value, "text"),
            },
            BlockType::Paragraph => Self::Paragraph {
                text: string_field(&value, "text"),
            },
            BlockType::Quote => Self::Quote {
                text: string_field(&value, "text"),
            },
            BlockType::Divider => Self::Divider,
            BlockType::Image => Self::Image {
                src: string_field(&value, "src"),
                alt: value
                    .get("alt")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
        }
    }

    /// The inline text the search and backlink scans operate on.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Section { title } => Some(title),
            Self::Heading { text } | Self::Paragraph { text } | Self::Quote { text } => Some(text),
            Self::Divider | Self::Image { .. } => None,
        }
    }
}

/// Typed view over a block's `props` payload, same lenient contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockProps {
    Section { collapsed: bool },
    Heading { level: u8 },
    Plain,
}

impl BlockProps {
    pub fn decode(block_type: BlockType, raw: &str) -> Self {
        let value = parse_object(raw);
        match block_type {
            BlockType::Section => Self::Section {
                collapsed: value
                    .get("collapsed")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            },
            BlockType::Heading => Self::Heading {
                level: value
                    .get("level")
                    .and_then(Value::as_u64)
                    .map(|level| level.clamp(1, 6) as u8)
                    .unwrap_or(1),
            },
            _ => Self::Plain,
        }
    }
}

/// Parse a stored JSON blob, degrading to `{}` on any failure.
pub fn parse_object(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(serde_json::Map::new()),
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
