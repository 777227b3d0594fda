use super::{load_settings_from, normalize_database_url, prepare_database_url, Settings};

use std::{
    collections::HashMap,
    env, fs,
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

fn temp_root(label: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    env::temp_dir().join(format!("screen_badges_{label}_{suffix}"))
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn missing_file_and_env_yield_defaults() {
    let settings = load_settings_from(Path::new("/nonexistent/panel.toml"), env_from(&[]));
    assert_eq!(settings, Settings::default());
    assert_eq!(
        settings.controller_settings().ping_timeout,
        Duration::from_millis(500)
    );
}

#[test]
fn file_values_apply_and_env_wins() {
    let root = temp_root("config");
    fs::create_dir_all(&root).expect("temp root");
    let path = root.join("panel.toml");
    fs::write(
        &path,
        "database_url = \"sqlite://./file.db\"\npage_endpoint = \"http://file:1\"\nping_timeout_ms = 250\nlog_filter = \"debug\"\n",
    )
    .expect("write config");

    let from_file = load_settings_from(&path, env_from(&[]));
    assert_eq!(from_file.database_url, "sqlite://./file.db");
    assert_eq!(from_file.page_endpoint, "http://file:1");
    assert_eq!(from_file.ping_timeout_ms, 250);
    assert_eq!(from_file.log_filter, "debug");
    assert_eq!(from_file.request_timeout_ms, 3_000);

    let overridden = load_settings_from(
        &path,
        env_from(&[
            ("PANEL_DATABASE_URL", "sqlite://./panel.db"),
            ("APP__DATABASE_URL", "sqlite://./app.db"),
            ("PANEL_ENDPOINT", "ws://env:2"),
            ("APP__REQUEST_TIMEOUT_MS", "1200"),
            ("APP__PING_TIMEOUT_MS", "not-a-number"),
            ("RUST_LOG", "panel_core=trace"),
        ]),
    );
    assert_eq!(overridden.database_url, "sqlite://./app.db");
    assert_eq!(overridden.page_endpoint, "ws://env:2");
    assert_eq!(overridden.request_timeout_ms, 1_200);
    assert_eq!(overridden.ping_timeout_ms, 250);
    assert_eq!(overridden.log_filter, "panel_core=trace");

    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
    assert_eq!(
        normalize_database_url("C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
    assert_eq!(
        normalize_database_url("sqlite://C:/Users/alice/test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let root = temp_root("open");
    let db_path = root.join("nested").join("panel.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    assert!(root.join("nested").exists());
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );

    fs::remove_dir_all(root).expect("cleanup");
}
