use super::*;
use shared::domain::{Anchor, BadgeSize};

fn key(url: &str) -> PageKey {
    PageKey::from_url(url).expect("page key")
}

fn item(id: i64) -> ScreenItem {
    let mut item = ScreenItem::new(
        ItemId(id),
        Anchor::new(format!("#item-{id}")),
        &BadgeDefaults::default(),
    );
    item.label = id as f64;
    item
}

#[tokio::test]
async fn missing_page_loads_default_state() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let state = storage
        .load_page_state(&key("https://example.com/"))
        .await
        .expect("load");
    assert_eq!(state, PersistedState::default());
    assert_eq!(state.next_id, INITIAL_NEXT_ID);
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("screen_badges_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn saves_and_overwrites_page_state() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let page = key("https://example.com/docs?tab=2");

    let mut state = PersistedState {
        items: vec![item(1), item(2)],
        next_id: 3,
        ..PersistedState::default()
    };
    storage.save_page_state(&page, &state).await.expect("save");

    state.items.pop();
    state.defaults.size = BadgeSize::Large;
    storage.save_page_state(&page, &state).await.expect("save");

    let loaded = storage.load_page_state(&page).await.expect("load");
    assert_eq!(loaded.items.len(), 1);
    assert_eq!(loaded.defaults.size, BadgeSize::Large);
    assert_eq!(loaded.next_id, 3);
}

#[tokio::test]
async fn pages_are_isolated_by_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = key("https://example.com/a");
    let second = key("https://example.com/b");
    storage
        .save_page_state(
            &first,
            &PersistedState {
                items: vec![item(1)],
                next_id: 2,
                ..PersistedState::default()
            },
        )
        .await
        .expect("save");

    let other = storage.load_page_state(&second).await.expect("load");
    assert!(other.items.is_empty());

    let pages = storage.list_pages().await.expect("list");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].page_key, first);
    assert_eq!(pages[0].item_count, 1);
    assert_eq!(pages[0].next_id, 2);
}

#[tokio::test]
async fn reserve_ids_advances_counter() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let page = key("https://example.com/");

    let first = storage.reserve_ids(&page, 2).await.expect("reserve");
    let second = storage.reserve_ids(&page, 1).await.expect("reserve");
    assert_eq!(first, vec![ItemId(1), ItemId(2)]);
    assert_eq!(second, vec![ItemId(3)]);
    assert_eq!(
        storage.load_page_state(&page).await.expect("load").next_id,
        4
    );
}

#[tokio::test]
async fn reserve_ids_never_reissues_stored_ids() {
    let store = MemoryStore::new()
        .with_page(
            key("https://example.com/"),
            PersistedState {
                items: vec![item(7)],
                next_id: 2,
                ..PersistedState::default()
            },
        )
        .await;

    let ids = store
        .reserve_ids(&key("https://example.com/"), 1)
        .await
        .expect("reserve");
    assert_eq!(ids, vec![ItemId(8)]);
}

#[tokio::test]
async fn corrupt_state_is_reported_with_page_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    sqlx::query("INSERT INTO page_state (page_key, state_json) VALUES (?1, ?2)")
        .bind("https://example.com/")
        .bind("{not json")
        .execute(storage.pool())
        .await
        .expect("insert");

    let err = storage
        .load_page_state(&key("https://example.com/"))
        .await
        .expect_err("must fail");
    assert!(err.to_string().contains("https://example.com/"));
}
