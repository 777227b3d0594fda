use std::collections::HashSet;

use shared::domain::{BadgeDefaults, CaptureSettings, ItemId, PageKey, ScreenItem, TabId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// The active tab is a page the extension may not script.
    Restricted,
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restricted => "restricted",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptureState {
    pub settings: CaptureSettings,
    pub in_flight: bool,
}

/// The panel's view of one page's annotation session.
///
/// Replaced wholesale on every dispatch; never mutated in place while held
/// by the controller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub status: ConnectionStatus,
    pub tab_id: Option<TabId>,
    pub page_key: Option<PageKey>,
    pub items: Vec<ScreenItem>,
    pub selection_enabled: bool,
    pub select_items: HashSet<ItemId>,
    pub missing_ids: HashSet<ItemId>,
    pub defaults: BadgeDefaults,
    pub capture: CaptureState,
}

impl Model {
    pub fn item(&self, id: ItemId) -> Option<&ScreenItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains_anchor(&self, selector: &str) -> bool {
        self.items
            .iter()
            .any(|item| item.anchor.selector == selector)
    }

    pub fn is_selected(&self, id: ItemId) -> bool {
        self.select_items.contains(&id)
    }
}
