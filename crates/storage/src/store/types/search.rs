#![forbid(unsafe_code)]

use lb_core::model::PageType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub page_type: PageType,
    pub slug: String,
    pub updated_at_ms: i64,
    pub snippet: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchField {
    Title,
    Paragraph,
    Quote,
    Heading,
    SectionTitle,
}

impl MatchField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Paragraph => "paragraph",
            Self::Quote => "quote",
            Self::Heading => "heading",
            Self::SectionTitle => "section_title",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchMatch {
    /// None for a title match.
    pub block_id: Option<String>,
    pub field: MatchField,
    /// Ancestor section titles, outermost first.
    pub section_path: Vec<String>,
    pub excerpt: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailedSearchHit {
    pub id: String,
    pub title: String,
    pub page_type: PageType,
    pub slug: String,
    pub updated_at_ms: i64,
    /// Total occurrence count, independent of the excerpt cap.
    pub match_count: usize,
    pub matches: Vec<SearchMatch>,
}
