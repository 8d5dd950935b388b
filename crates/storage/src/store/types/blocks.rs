#![forbid(unsafe_code)]

use super::PageRow;
use lb_core::model::BlockType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockRow {
    pub id: String,
    pub page_id: String,
    pub parent_id: Option<String>,
    pub sort: i64,
    pub block_type: BlockType,
    pub props_json: String,
    pub content_json: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// A page with all its blocks: top-level blocks first, then each parent's
/// children grouped together in sort order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageWithBlocks {
    pub page: PageRow,
    pub blocks: Vec<BlockRow>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReorderOutcome {
    pub applied: usize,
    pub skipped: usize,
}
