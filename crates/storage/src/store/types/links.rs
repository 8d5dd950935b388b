#![forbid(unsafe_code)]

use lb_core::model::PageType;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkUpdateSummary {
    pub updated_pages: usize,
    pub updated_blocks: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkifySummary {
    pub updated_pages: usize,
    pub updated_blocks: usize,
    pub linked_occurrences: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacklinkRow {
    pub id: String,
    pub title: String,
    pub page_type: PageType,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageBacklinks {
    pub page_id: String,
    pub title: String,
    pub backlinks: Vec<BacklinkRow>,
}
