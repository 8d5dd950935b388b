#![forbid(unsafe_code)]

use lb_core::model::{BlockType, PageType};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatePageRequest {
    pub title: String,
    pub page_type: PageType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchPageRequest {
    pub id: String,
    pub title: Option<String>,
    pub page_type: Option<PageType>,
    pub regenerate_slug: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateBlockRequest {
    pub page_id: String,
    pub parent_id: Option<String>,
    pub sort: i64,
    pub block_type: BlockType,
    pub props_json: String,
    pub content_json: String,
}

/// Partial block update. `parent_id` is doubly optional: the outer level
/// is "leave unchanged", the inner level is the new value (None moves the
/// block to the top level).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchBlockRequest {
    pub parent_id: Option<Option<String>>,
    pub sort: Option<i64>,
    pub block_type: Option<BlockType>,
    pub props_json: Option<String>,
    pub content_json: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockMove {
    pub id: String,
    pub parent_id: Option<String>,
    pub sort: i64,
}

/// Which pages a batch link rewrite applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkScope {
    All,
    Pages(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveLinksRequest {
    pub label: String,
    pub target_page_id: String,
    pub scope: LinkScope,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkifyRequest {
    pub term: String,
    pub target_page_id: String,
    pub scope: LinkScope,
    pub case_sensitive: bool,
}
