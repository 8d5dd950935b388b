#![forbid(unsafe_code)]

use lb_core::model::PageType;
use lb_storage::{CreatePageRequest, PatchPageRequest, SqliteStore, StoreError};
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

fn create_page(store: &mut SqliteStore, title: &str, page_type: PageType) -> lb_storage::PageRow {
    store
        .create_page(CreatePageRequest {
            title: title.to_string(),
            page_type,
        })
        .expect("create page")
}

fn is_kebab(slug: &str) -> bool {
    !slug.is_empty() && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[test]
fn create_page_assigns_kebab_slug() {
    let mut store = open_store("create_page_assigns_kebab_slug");
    let page = create_page(&mut store, "The Witchlight Carnival", PageType::Location);
    assert_eq!(page.slug, "the-witchlight-carnival");
    assert!(is_kebab(&page.slug));
}

#[test]
fn slug_transliterates_accented_titles() {
    let mut store = open_store("slug_transliterates_accented_titles");
    let page = create_page(&mut store, "ÅÄÖ Test", PageType::Note);
    assert!(!page.slug.contains(['å', 'ä', 'ö', 'Å', 'Ä', 'Ö']));
    assert!(is_kebab(&page.slug));
    assert_eq!(page.slug, "aao-test");
}

#[test]
fn duplicate_titles_probe_for_free_slug() {
    let mut store = open_store("duplicate_titles_probe_for_free_slug");
    let first = create_page(&mut store, "Hither", PageType::Location);
    let second = create_page(&mut store, "Hither!", PageType::Note);
    let third = create_page(&mut store, "hither", PageType::Note);
    assert_eq!(first.slug, "hither");
    assert_eq!(second.slug, "hither-2");
    assert_eq!(third.slug, "hither-3");
}

#[test]
fn patch_title_preserves_slug() {
    let mut store = open_store("patch_title_preserves_slug");
    let page = create_page(&mut store, "Old Title", PageType::Note);
    let patched = store
        .patch_page(PatchPageRequest {
            id: page.id.clone(),
            title: Some("Completely New Title".to_string()),
            page_type: None,
            regenerate_slug: false,
        })
        .expect("patch page");
    assert_eq!(patched.title, "Completely New Title");
    assert_eq!(patched.slug, "old-title");
}

#[test]
fn patch_with_regenerate_slug_recomputes() {
    let mut store = open_store("patch_with_regenerate_slug_recomputes");
    let page = create_page(&mut store, "Old Title", PageType::Note);
    let patched = store
        .patch_page(PatchPageRequest {
            id: page.id.clone(),
            title: Some("Completely New Title".to_string()),
            page_type: None,
            regenerate_slug: true,
        })
        .expect("patch page");
    assert_eq!(patched.slug, "completely-new-title");
    assert!(is_kebab(&patched.slug));
}

#[test]
fn regenerated_slug_stays_unique() {
    let mut store = open_store("regenerated_slug_stays_unique");
    let _taken = create_page(&mut store, "Taken", PageType::Note);
    let page = create_page(&mut store, "Something Else", PageType::Note);
    let patched = store
        .patch_page(PatchPageRequest {
            id: page.id.clone(),
            title: Some("Taken".to_string()),
            page_type: None,
            regenerate_slug: true,
        })
        .expect("patch page");
    assert_eq!(patched.slug, "taken-2");
}

#[test]
fn patch_unknown_page_fails() {
    let mut store = open_store("patch_unknown_page_fails");
    let result = store.patch_page(PatchPageRequest {
        id: "pg_999999999999".to_string(),
        title: Some("X".to_string()),
        page_type: None,
        regenerate_slug: false,
    });
    assert!(matches!(result, Err(StoreError::UnknownPage)));
}

#[test]
fn patch_without_fields_is_rejected() {
    let mut store = open_store("patch_without_fields_is_rejected");
    let page = create_page(&mut store, "A Page", PageType::Note);
    let result = store.patch_page(PatchPageRequest {
        id: page.id,
        title: None,
        page_type: None,
        regenerate_slug: false,
    });
    assert!(matches!(result, Err(StoreError::InvalidInput(_))));
}

#[test]
fn resolve_or_create_is_idempotent() {
    let mut store = open_store("resolve_or_create_is_idempotent");
    let (first, created_first) = store
        .resolve_or_create_page("Bavlorna Blightstraw", PageType::Npc)
        .expect("resolve or create");
    assert!(created_first);

    let (second, created_second) = store
        .resolve_or_create_page("Bavlorna Blightstraw", PageType::Note)
        .expect("resolve or create again");
    assert!(!created_second);
    assert_eq!(second.id, first.id);
    // existing page is returned unchanged, including its type
    assert_eq!(second.page_type, PageType::Npc);
}

#[test]
fn get_page_by_slug_round_trip() {
    let mut store = open_store("get_page_by_slug_round_trip");
    let page = create_page(&mut store, "Slug Target", PageType::Tool);
    let found = store.get_page_by_slug("slug-target").expect("get by slug");
    assert_eq!(found.id, page.id);

    let missing = store.get_page_by_slug("no-such-slug");
    assert!(matches!(missing, Err(StoreError::UnknownSlug)));
}

#[test]
fn delete_page_removes_its_blocks() {
    let mut store = open_store("delete_page_removes_its_blocks");
    let page = create_page(&mut store, "Doomed", PageType::Note);
    let block = store
        .create_block(lb_storage::CreateBlockRequest {
            page_id: page.id.clone(),
            parent_id: None,
            sort: 0,
            block_type: lb_core::model::BlockType::Paragraph,
            props_json: "{}".to_string(),
            content_json: r#"{"text":"gone soon"}"#.to_string(),
        })
        .expect("create block");

    store.delete_page(&page.id).expect("delete page");
    assert!(store.get_page(&page.id).expect("get page").is_none());
    assert!(store.get_block(&block.id).expect("get block").is_none());

    let again = store.delete_page(&page.id);
    assert!(matches!(again, Err(StoreError::UnknownPage)));
}

#[test]
fn empty_title_is_rejected() {
    let mut store = open_store("empty_title_is_rejected");
    let result = store.create_page(CreatePageRequest {
        title: "   ".to_string(),
        page_type: PageType::Note,
    });
    assert!(matches!(result, Err(StoreError::InvalidInput(_))));
}
