#![forbid(unsafe_code)]

use lb_core::model::{BlockType, PageType};
use lb_storage::{
    BlockMove, BlockRow, CreateBlockRequest, CreatePageRequest, PatchBlockRequest, SqliteStore,
    StoreError,
};
use std::collections::HashMap;
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("lb_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn open_store(test_name: &str) -> SqliteStore {
    SqliteStore::open(temp_dir(test_name)).expect("open store")
}

fn create_page(store: &mut SqliteStore, title: &str) -> String {
    store
        .create_page(CreatePageRequest {
            title: title.to_string(),
            page_type: PageType::Note,
        })
        .expect("create page")
        .id
}

fn add_block(
    store: &mut SqliteStore,
    page_id: &str,
    parent_id: Option<&str>,
    sort: i64,
    block_type: BlockType,
    content_json: &str,
) -> BlockRow {
    store
        .create_block(CreateBlockRequest {
            page_id: page_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            sort,
            block_type,
            props_json: "{}".to_string(),
            content_json: content_json.to_string(),
        })
        .expect("create block")
}

fn paragraph(store: &mut SqliteStore, page_id: &str, parent_id: Option<&str>, sort: i64) -> BlockRow {
    add_block(store, page_id, parent_id, sort, BlockType::Paragraph, r#"{"text":"p"}"#)
}

/// Every sibling group must hold exactly the sorts 0..n-1.
fn assert_dense(store: &SqliteStore, page_id: &str) {
    let page = store.get_page_with_blocks(page_id).expect("get page with blocks");
    let mut groups: HashMap<Option<String>, Vec<i64>> = HashMap::new();
    for block in &page.blocks {
        groups.entry(block.parent_id.clone()).or_default().push(block.sort);
    }
    for (parent_id, mut sorts) in groups {
        sorts.sort_unstable();
        let expected: Vec<i64> = (0..sorts.len() as i64).collect();
        assert_eq!(sorts, expected, "group {parent_id:?} is not dense");
    }
}

#[test]
fn create_normalizes_sibling_sorts() {
    let mut store = open_store("create_normalizes_sibling_sorts");
    let page_id = create_page(&mut store, "Page");

    paragraph(&mut store, &page_id, None, 5);
    paragraph(&mut store, &page_id, None, 0);
    let last = paragraph(&mut store, &page_id, None, 999);

    assert_dense(&store, &page_id);
    // a huge requested sort settles at the end of the group
    assert_eq!(last.sort, 2);
}

#[test]
fn density_holds_across_mixed_mutations() {
    let mut store = open_store("density_holds_across_mixed_mutations");
    let page_id = create_page(&mut store, "Page");

    let a = paragraph(&mut store, &page_id, None, 0);
    let b = paragraph(&mut store, &page_id, None, 1);
    let c = paragraph(&mut store, &page_id, None, 2);
    assert_dense(&store, &page_id);

    store
        .patch_block(&b.id, PatchBlockRequest {
            sort: Some(0),
            ..PatchBlockRequest::default()
        })
        .expect("patch sort");
    assert_dense(&store, &page_id);

    store.delete_block(&a.id).expect("delete block");
    assert_dense(&store, &page_id);

    store
        .reorder_blocks(&page_id, &[BlockMove {
            id: c.id.clone(),
            parent_id: None,
            sort: 0,
        }])
        .expect("reorder");
    assert_dense(&store, &page_id);
}

#[test]
fn reparent_renormalizes_both_groups() {
    let mut store = open_store("reparent_renormalizes_both_groups");
    let page_id = create_page(&mut store, "Page");

    let section = add_block(&mut store, &page_id, None, 0, BlockType::Section, r#"{"title":"S"}"#);
    let a = paragraph(&mut store, &page_id, Some(&section.id), 0);
    let b = paragraph(&mut store, &page_id, Some(&section.id), 1);
    let c = paragraph(&mut store, &page_id, Some(&section.id), 2);

    let moved = store
        .patch_block(&b.id, PatchBlockRequest {
            parent_id: Some(None),
            sort: Some(99),
            ..PatchBlockRequest::default()
        })
        .expect("reparent");
    assert_eq!(moved.parent_id, None);
    assert_dense(&store, &page_id);

    // origin group closed the gap b left behind
    let a_after = store.get_block(&a.id).expect("get a").expect("a exists");
    let c_after = store.get_block(&c.id).expect("get c").expect("c exists");
    assert_eq!(a_after.sort, 0);
    assert_eq!(c_after.sort, 1);
}

#[test]
fn delete_block_cascades_to_subtree() {
    let mut store = open_store("delete_block_cascades_to_subtree");
    let page_id = create_page(&mut store, "Page");

    let before = paragraph(&mut store, &page_id, None, 0);
    let section = add_block(&mut store, &page_id, None, 1, BlockType::Section, r#"{"title":"S"}"#);
    let child = paragraph(&mut store, &page_id, Some(&section.id), 0);
    let grandchild = paragraph(&mut store, &page_id, Some(&child.id), 0);
    let after = paragraph(&mut store, &page_id, None, 2);

    let deleted = store.delete_block(&section.id).expect("delete subtree");
    assert_eq!(deleted, 3);
    assert!(store.get_block(&section.id).expect("get").is_none());
    assert!(store.get_block(&child.id).expect("get").is_none());
    assert!(store.get_block(&grandchild.id).expect("get").is_none());
    assert!(store.get_block(&before.id).expect("get").is_some());
    assert!(store.get_block(&after.id).expect("get").is_some());
    assert_dense(&store, &page_id);
}

#[test]
fn delete_terminates_on_cyclic_parents() {
    let mut store = open_store("delete_terminates_on_cyclic_parents");
    let page_id = create_page(&mut store, "Page");

    let alpha = add_block(&mut store, &page_id, None, 0, BlockType::Section, r#"{"title":"Alpha"}"#);
    let beta = add_block(&mut store, &page_id, Some(&alpha.id), 0, BlockType::Section, r#"{"title":"Beta"}"#);
    let leaf = paragraph(&mut store, &page_id, Some(&beta.id), 0);
    let bystander = paragraph(&mut store, &page_id, None, 1);
    // close the loop: Alpha becomes Beta's child
    store
        .patch_block(&alpha.id, PatchBlockRequest {
            parent_id: Some(Some(beta.id.clone())),
            ..PatchBlockRequest::default()
        })
        .expect("patch parent");

    let deleted = store.delete_block(&alpha.id).expect("delete cycle member");
    assert_eq!(deleted, 3);
    assert!(store.get_block(&alpha.id).expect("get").is_none());
    assert!(store.get_block(&beta.id).expect("get").is_none());
    assert!(store.get_block(&leaf.id).expect("get").is_none());
    assert!(store.get_block(&bystander.id).expect("get").is_some());
}

#[test]
fn reorder_ignores_foreign_blocks() {
    let mut store = open_store("reorder_ignores_foreign_blocks");
    let page_id = create_page(&mut store, "Mine");
    let other_page_id = create_page(&mut store, "Theirs");

    paragraph(&mut store, &page_id, None, 0);
    let foreign = paragraph(&mut store, &other_page_id, None, 0);

    let outcome = store
        .reorder_blocks(&page_id, &[BlockMove {
            id: foreign.id.clone(),
            parent_id: None,
            sort: 7,
        }])
        .expect("reorder succeeds");
    assert_eq!(outcome.applied, 0);
    assert_eq!(outcome.skipped, 1);

    let untouched = store.get_block(&foreign.id).expect("get").expect("exists");
    assert_eq!(untouched.page_id, other_page_id);
    assert_eq!(untouched.sort, 0);
    assert_eq!(untouched.parent_id, None);
}

#[test]
fn reorder_empty_list_is_noop_success() {
    let mut store = open_store("reorder_empty_list_is_noop_success");
    let page_id = create_page(&mut store, "Page");
    let outcome = store.reorder_blocks(&page_id, &[]).expect("reorder");
    assert_eq!(outcome.applied, 0);
    assert_eq!(outcome.skipped, 0);
}

#[test]
fn reorder_normalizes_every_touched_group() {
    let mut store = open_store("reorder_normalizes_every_touched_group");
    let page_id = create_page(&mut store, "Page");

    let section_a = add_block(&mut store, &page_id, None, 0, BlockType::Section, r#"{"title":"A"}"#);
    let section_b = add_block(&mut store, &page_id, None, 1, BlockType::Section, r#"{"title":"B"}"#);
    let p1 = paragraph(&mut store, &page_id, Some(&section_a.id), 0);
    let p2 = paragraph(&mut store, &page_id, Some(&section_a.id), 1);
    let p3 = paragraph(&mut store, &page_id, Some(&section_b.id), 0);

    let outcome = store
        .reorder_blocks(&page_id, &[
            BlockMove { id: p1.id.clone(), parent_id: Some(section_b.id.clone()), sort: 0 },
            BlockMove { id: p3.id.clone(), parent_id: Some(section_a.id.clone()), sort: 5 },
        ])
        .expect("reorder");
    assert_eq!(outcome.applied, 2);
    assert_dense(&store, &page_id);

    let p2_after = store.get_block(&p2.id).expect("get").expect("exists");
    assert_eq!(p2_after.sort, 0);
}

#[test]
fn cross_page_parent_is_rejected() {
    let mut store = open_store("cross_page_parent_is_rejected");
    let page_id = create_page(&mut store, "Mine");
    let other_page_id = create_page(&mut store, "Theirs");
    let foreign = paragraph(&mut store, &other_page_id, None, 0);

    let result = store.create_block(CreateBlockRequest {
        page_id: page_id.clone(),
        parent_id: Some(foreign.id.clone()),
        sort: 0,
        block_type: BlockType::Paragraph,
        props_json: "{}".to_string(),
        content_json: "{}".to_string(),
    });
    assert!(matches!(result, Err(StoreError::InvalidInput(_))));

    let mine = paragraph(&mut store, &page_id, None, 0);
    let reparent = store.patch_block(&mine.id, PatchBlockRequest {
        parent_id: Some(Some(foreign.id)),
        ..PatchBlockRequest::default()
    });
    assert!(matches!(reparent, Err(StoreError::InvalidInput(_))));
}

#[test]
fn get_page_with_blocks_orders_top_level_first() {
    let mut store = open_store("get_page_with_blocks_orders_top_level_first");
    let page_id = create_page(&mut store, "Page");

    let section = add_block(&mut store, &page_id, None, 0, BlockType::Section, r#"{"title":"S"}"#);
    let nested = paragraph(&mut store, &page_id, Some(&section.id), 0);
    let top = paragraph(&mut store, &page_id, None, 1);

    let page = store.get_page_with_blocks(&page_id).expect("get page");
    let ids: Vec<&str> = page.blocks.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec![section.id.as_str(), top.id.as_str(), nested.id.as_str()]);

    let missing = store.get_page_with_blocks("pg_999999999999");
    assert!(matches!(missing, Err(StoreError::UnknownPage)));
}

#[test]
fn patch_merges_partial_fields() {
    let mut store = open_store("patch_merges_partial_fields");
    let page_id = create_page(&mut store, "Page");
    let block = paragraph(&mut store, &page_id, None, 0);

    let patched = store
        .patch_block(&block.id, PatchBlockRequest {
            content_json: Some(r#"{"text":"updated"}"#.to_string()),
            ..PatchBlockRequest::default()
        })
        .expect("patch");
    assert_eq!(patched.content_json, r#"{"text":"updated"}"#);
    assert_eq!(patched.parent_id, block.parent_id);
    assert_eq!(patched.sort, block.sort);
    assert_eq!(patched.block_type, block.block_type);
}

#[test]
fn block_mutations_touch_the_page() {
    let mut store = open_store("block_mutations_touch_the_page");
    let page_id = create_page(&mut store, "Page");
    let created = store.get_page(&page_id).expect("get").expect("exists");

    std::thread::sleep(std::time::Duration::from_millis(10));
    paragraph(&mut store, &page_id, None, 0);

    let touched = store.get_page(&page_id).expect("get").expect("exists");
    assert!(touched.updated_at_ms > created.updated_at_ms);
}

#[test]
fn unknown_ids_surface_typed_errors() {
    let mut store = open_store("unknown_ids_surface_typed_errors");
    let result = store.patch_block("bk_999999999999", PatchBlockRequest::default());
    assert!(matches!(result, Err(StoreError::UnknownBlock)));

    let result = store.delete_block("bk_999999999999");
    assert!(matches!(result, Err(StoreError::UnknownBlock)));

    let result = store.create_block(CreateBlockRequest {
        page_id: "pg_999999999999".to_string(),
        parent_id: None,
        sort: 0,
        block_type: BlockType::Paragraph,
        props_json: "{}".to_string(),
        content_json: "{}".to_string(),
    });
    assert!(matches!(result, Err(StoreError::UnknownPage)));

    let result = store.reorder_blocks("pg_999999999999", &[]);
    assert!(matches!(result, Err(StoreError::UnknownPage)));
}
