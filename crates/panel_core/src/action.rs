//! Everything that can happen to the panel: UI input, page messages and
//! completed I/O.

use shared::domain::{
    BadgeColor, BadgeDefaults, BadgePosition, BadgeShape, BadgeSize, CaptureArea, CaptureFormat,
    DownloadId, ItemId, PageKey, ScreenItem, TabId,
};

use crate::model::ConnectionStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionChange {
    /// Toggle one item.
    Item(ItemId),
    /// Toggle every item of a (trimmed) group; blank means ungrouped.
    Group(Option<String>),
    /// Select everything or clear the selection.
    All(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Init,
    Connected {
        tab_id: TabId,
        page_key: PageKey,
    },
    SetStatus(ConnectionStatus),
    RestoreState {
        items: Vec<ScreenItem>,
        defaults: BadgeDefaults,
    },
    ToggleSelect,
    SetBadgeSize(BadgeSize),
    SetBadgeColor(BadgeColor),
    SetBadgeShape(BadgeShape),
    SetBadgePosition(BadgePosition),
    BadgeDelete,
    BadgeClear,
    ReorderItems {
        from_id: ItemId,
        from_index: usize,
        to_index: usize,
    },
    SetGroup(String),
    ItemSelectionChanged(SelectionChange),
    /// Items built for freshly picked page elements, ids already allocated.
    ItemsPicked(Vec<ScreenItem>),
    SetComment {
        id: ItemId,
        comment: String,
    },
    MissingIdsReported(Vec<ItemId>),
    HoverItem(Option<ItemId>),
    CaptureRequested,
    CaptureSucceeded {
        download_id: DownloadId,
    },
    CaptureFailed {
        error: String,
    },
    SetCaptureFormat(CaptureFormat),
    SetCaptureArea(CaptureArea),
    SetCaptureQuality(u8),
    SetCaptureScale(f32),
    ToggleCapturePanel,
    PortDisconnected,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Connected { .. } => "CONNECTED",
            Self::SetStatus(_) => "SET_STATUS",
            Self::RestoreState { .. } => "RESTORE_STATE",
            Self::ToggleSelect => "TOGGLE_SELECT",
            Self::SetBadgeSize(_) => "SET_BADGE_SIZE",
            Self::SetBadgeColor(_) => "SET_BADGE_COLOR",
            Self::SetBadgeShape(_) => "SET_BADGE_SHAPE",
            Self::SetBadgePosition(_) => "SET_BADGE_POSITION",
            Self::BadgeDelete => "BADGE_DELETE",
            Self::BadgeClear => "BADGE_CLEAR",
            Self::ReorderItems { .. } => "REORDER_ITEMS",
            Self::SetGroup(_) => "SET_GROUP",
            Self::ItemSelectionChanged(_) => "ITEM_SELECTION_CHANGED",
            Self::ItemsPicked(_) => "ITEMS_PICKED",
            Self::SetComment { .. } => "SET_COMMENT",
            Self::MissingIdsReported(_) => "MISSING_IDS_REPORTED",
            Self::HoverItem(_) => "HOVER_ITEM",
            Self::CaptureRequested => "CAPTURE_REQUESTED",
            Self::CaptureSucceeded { .. } => "CAPTURE_SUCCEEDED",
            Self::CaptureFailed { .. } => "CAPTURE_FAILED",
            Self::SetCaptureFormat(_) => "SET_CAPTURE_FORMAT",
            Self::SetCaptureArea(_) => "SET_CAPTURE_AREA",
            Self::SetCaptureQuality(_) => "SET_CAPTURE_QUALITY",
            Self::SetCaptureScale(_) => "SET_CAPTURE_SCALE",
            Self::ToggleCapturePanel => "TOGGLE_CAPTURE_PANEL",
            Self::PortDisconnected => "PORT_DISCONNECTED",
        }
    }
}
