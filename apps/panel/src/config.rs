use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use panel_core::ControllerSettings;

pub const CONFIG_FILE: &str = "panel.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub page_endpoint: String,
    pub ping_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/panel.db".into(),
            page_endpoint: "http://127.0.0.1:8765".into(),
            ping_timeout_ms: 500,
            request_timeout_ms: 3_000,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            ping_timeout: Duration::from_millis(self.ping_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the flat `key = value` table in `path`, then environment.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(table) = toml::from_str::<toml::Table>(&raw) {
            if let Some(v) = file_value(&table, "database_url") {
                settings.database_url = v;
            }
            if let Some(v) = file_value(&table, "page_endpoint") {
                settings.page_endpoint = v;
            }
            if let Some(v) = file_value(&table, "ping_timeout_ms").and_then(|v| v.parse().ok()) {
                settings.ping_timeout_ms = v;
            }
            if let Some(v) = file_value(&table, "request_timeout_ms").and_then(|v| v.parse().ok())
            {
                settings.request_timeout_ms = v;
            }
            if let Some(v) = file_value(&table, "log_filter") {
                settings.log_filter = v;
            }
        }
    }

    if let Some(v) = env("PANEL_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("PANEL_ENDPOINT") {
        settings.page_endpoint = v;
    }
    if let Some(v) = env("APP__PAGE_ENDPOINT") {
        settings.page_endpoint = v;
    }

    if let Some(v) = env("APP__PING_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        settings.ping_timeout_ms = v;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_ms = v;
    }

    if let Some(v) = env("RUST_LOG") {
        settings.log_filter = v;
    }

    settings
}

fn file_value(table: &toml::Table, key: &str) -> Option<String> {
    match table.get(key)? {
        toml::Value::String(v) => Some(v.clone()),
        toml::Value::Integer(v) => Some(v.to_string()),
        _ => None,
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        if has_drive_letter(path) {
            return format!("sqlite:{}", path.replace('\\', "/"));
        }
        return raw_database_url.to_string();
    }

    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url)
        .replace('\\', "/");
    if has_drive_letter(&path) {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
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
#[path = "tests/config_tests.rs"]
mod tests;
