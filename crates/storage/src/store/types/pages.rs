#![forbid(unsafe_code)]

use lb_core::model::PageType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRow {
    pub id: String,
    pub title: String,
    pub page_type: PageType,
    pub slug: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}
