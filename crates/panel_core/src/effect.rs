//! Declarative I/O requests produced by the reducer.

use shared::domain::{BadgeDefaults, CaptureSettings, ItemId, PageKey, ScreenItem, TabId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    /// Overwrite items and defaults, keep the stored id counter.
    Merge,
    /// Same write path, but the id counter restarts.
    ResetCounter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RenderContent(Vec<ScreenItem>),
    ToggleSelectOnPage(bool),
    ClearContent,
    HoverContent(Option<ItemId>),
    Persist {
        page_key: PageKey,
        items: Vec<ScreenItem>,
        defaults: BadgeDefaults,
        mode: PersistMode,
    },
    Capture {
        tab_id: TabId,
        settings: CaptureSettings,
    },
    Notify(Notice),
}

impl Effect {
    /// Effects that talk to the page-side overlay and therefore need a live
    /// connection to the page they were computed for.
    pub fn requires_page(&self) -> bool {
        matches!(
            self,
            Self::RenderContent(_)
                | Self::ToggleSelectOnPage(_)
                | Self::ClearContent
                | Self::HoverContent(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RenderContent(_) => "render_content",
            Self::ToggleSelectOnPage(_) => "toggle_select_on_page",
            Self::ClearContent => "clear_content",
            Self::HoverContent(_) => "hover_content",
            Self::Persist { .. } => "persist",
            Self::Capture { .. } => "capture",
            Self::Notify(_) => "notify",
        }
    }
}
