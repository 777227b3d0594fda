use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::sync::Mutex;

use shared::domain::{BadgeDefaults, ItemId, PageKey, ScreenItem};

/// First id handed out on a page, and the value a cleared page resets to.
pub const INITIAL_NEXT_ID: i64 = 1;

fn initial_next_id() -> i64 {
    INITIAL_NEXT_ID
}

/// Everything remembered for one page key.
///
/// `next_id` is owned by the store: the panel model never tracks it, so
/// writers must load, merge and write back to keep it from regressing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub items: Vec<ScreenItem>,
    #[serde(default)]
    pub defaults: BadgeDefaults,
    #[serde(default = "initial_next_id")]
    pub next_id: i64,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            defaults: BadgeDefaults::default(),
            next_id: INITIAL_NEXT_ID,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredPageSummary {
    pub page_key: PageKey,
    pub item_count: usize,
    pub next_id: i64,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns the default state for pages that were never written.
    async fn load_page_state(&self, page_key: &PageKey) -> Result<PersistedState>;
    async fn save_page_state(&self, page_key: &PageKey, state: &PersistedState) -> Result<()>;

    /// Hands out `count` fresh ids for `page_key` and persists the advanced
    /// counter. Ids already present in the stored items are never reissued.
    async fn reserve_ids(&self, page_key: &PageKey, count: usize) -> Result<Vec<ItemId>> {
        let mut state = self.load_page_state(page_key).await?;
        let floor = state
            .items
            .iter()
            .map(|item| item.id.0 + 1)
            .max()
            .unwrap_or(INITIAL_NEXT_ID);
        let start = state.next_id.max(floor);
        let end = start + count as i64;
        state.next_id = end;
        self.save_page_state(page_key, &state).await?;
        Ok((start..end).map(ItemId).collect())
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every connection to an in-memory url opens its own database
        let max_connections = if database_url.starts_with("sqlite::memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_pages(&self) -> Result<Vec<StoredPageSummary>> {
        let rows = sqlx::query(
            "SELECT page_key, state_json, updated_at FROM page_state ORDER BY updated_at DESC, page_key",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list stored pages")?;

        let mut pages = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_key: String = row.try_get("page_key")?;
            let Some(page_key) = PageKey::from_url(&raw_key) else {
                tracing::warn!(page_key = %raw_key, "skipping stored page with invalid key");
                continue;
            };
            let state = decode_state(&raw_key, &row.try_get::<String, _>("state_json")?)?;
            pages.push(StoredPageSummary {
                page_key,
                item_count: state.items.len(),
                next_id: state.next_id,
                updated_at: row.try_get("updated_at")?,
            });
        }
        Ok(pages)
    }
}

fn decode_state(page_key: &str, raw: &str) -> Result<PersistedState> {
    serde_json::from_str(raw)
        .with_context(|| format!("corrupt persisted state for page '{page_key}'"))
}

#[async_trait]
impl StateStore for Storage {
    async fn load_page_state(&self, page_key: &PageKey) -> Result<PersistedState> {
        let row = sqlx::query("SELECT state_json FROM page_state WHERE page_key = ?1")
            .bind(page_key.as_str())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load state for page '{page_key}'"))?;

        match row {
            Some(row) => decode_state(page_key.as_str(), &row.try_get::<String, _>("state_json")?),
            None => Ok(PersistedState::default()),
        }
    }

    async fn save_page_state(&self, page_key: &PageKey, state: &PersistedState) -> Result<()> {
        let state_json = serde_json::to_string(state)?;
        sqlx::query(
            r#"
            INSERT INTO page_state (page_key, state_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(page_key) DO UPDATE SET
                state_json = excluded.state_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(page_key.as_str())
        .bind(state_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save state for page '{page_key}'"))?;
        Ok(())
    }
}

/// Process-local store for tests and for running without a database.
#[derive(Default)]
pub struct MemoryStore {
    pages: Mutex<HashMap<PageKey, PersistedState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_page(self, page_key: PageKey, state: PersistedState) -> Self {
        self.pages.lock().await.insert(page_key, state);
        self
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_page_state(&self, page_key: &PageKey) -> Result<PersistedState> {
        Ok(self
            .pages
            .lock()
            .await
            .get(page_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_page_state(&self, page_key: &PageKey, state: &PersistedState) -> Result<()> {
        self.pages
            .lock()
            .await
            .insert(page_key.clone(), state.clone());
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
