//! Collaborators the controller drives but does not implement.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{CaptureSettings, DownloadId, TabId, WindowId};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::{
    effect::{Notice, NoticeLevel},
    model::Model,
    page::is_restricted_url,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: TabId,
    pub window_id: WindowId,
    pub url: String,
}

#[async_trait]
pub trait TabResolver: Send + Sync {
    async fn active_tab(&self) -> Result<Option<Tab>>;

    fn is_restricted(&self, url: &str) -> bool {
        is_restricted_url(url)
    }
}

#[async_trait]
pub trait CaptureService: Send + Sync {
    async fn capture(&self, tab_id: TabId, settings: &CaptureSettings) -> Result<DownloadId>;
}

/// Presentation sink. Called synchronously after every dispatch.
pub trait PanelView: Send + Sync {
    fn render(&self, model: &Model);

    fn notify(&self, notice: &Notice);
}

/// Resolver whose answer is set from outside, e.g. by the CLI or a test.
#[derive(Default)]
pub struct StaticTabResolver {
    active: RwLock<Option<Tab>>,
}

impl StaticTabResolver {
    pub fn new(active: Option<Tab>) -> Self {
        Self {
            active: RwLock::new(active),
        }
    }

    pub async fn set_active(&self, tab: Option<Tab>) {
        *self.active.write().await = tab;
    }
}

#[async_trait]
impl TabResolver for StaticTabResolver {
    async fn active_tab(&self) -> Result<Option<Tab>> {
        Ok(self.active.read().await.clone())
    }
}

pub struct MissingCaptureService;

#[async_trait]
impl CaptureService for MissingCaptureService {
    async fn capture(&self, tab_id: TabId, _settings: &CaptureSettings) -> Result<DownloadId> {
        Err(anyhow!(
            "screenshot capture is not available in this build (tab {tab_id})"
        ))
    }
}

/// View that writes the panel state to the log.
pub struct LogView;

impl PanelView for LogView {
    fn render(&self, model: &Model) {
        info!(
            status = model.status.as_str(),
            page_key = model.page_key.as_ref().map(|key| key.as_str()),
            items = model.items.len(),
            selected = model.select_items.len(),
            missing = model.missing_ids.len(),
            selection_enabled = model.selection_enabled,
            "panel state"
        );
    }

    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info => info!(message = %notice.message, "panel notice"),
            NoticeLevel::Error => error!(message = %notice.message, "panel notice"),
        }
    }
}
