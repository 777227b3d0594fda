use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ItemId);
id_newtype!(TabId);
id_newtype!(WindowId);
id_newtype!(DownloadId);

/// Normalized page identity: origin, path and query. Fragments never take
/// part in the key, so in-page navigation keeps the same annotation set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageKey(String);

impl PageKey {
    pub fn from_url(raw: &str) -> Option<Self> {
        let parsed = Url::parse(raw.trim()).ok()?;
        if !parsed.has_host() {
            return None;
        }
        let origin = parsed.origin();
        if !origin.is_tuple() {
            return None;
        }

        let mut key = origin.ascii_serialization();
        key.push_str(parsed.path());
        if let Some(query) = parsed.query() {
            key.push('?');
            key.push_str(query);
        }
        Some(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const ANCHOR_VERSION: u32 = 1;

/// Page-side locator for an annotated element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    #[serde(default = "default_anchor_version")]
    pub version: u32,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

fn default_anchor_version() -> u32 {
    ANCHOR_VERSION
}

impl Anchor {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            version: ANCHOR_VERSION,
            selector: selector.into(),
            text: None,
        }
    }

    pub fn same_element(&self, other: &Anchor) -> bool {
        self.selector == other.selector
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeShape {
    #[default]
    Circle,
    Square,
    Rounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgePosition {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

pub const DEFAULT_BADGE_COLOR: &str = "#e11d48";

/// CSS color string applied to a badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeColor(pub String);

impl Default for BadgeColor {
    fn default() -> Self {
        Self(DEFAULT_BADGE_COLOR.to_string())
    }
}

/// Trims a user supplied group name; blank names mean "ungrouped".
pub fn normalize_group(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|group| !group.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenItem {
    pub id: ItemId,
    pub label: f64,
    pub anchor: Anchor,
    pub size: BadgeSize,
    pub color: BadgeColor,
    pub shape: BadgeShape,
    pub position: BadgePosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ScreenItem {
    pub fn new(id: ItemId, anchor: Anchor, defaults: &BadgeDefaults) -> Self {
        Self {
            id,
            label: 0.0,
            anchor,
            size: defaults.size,
            color: defaults.color.clone(),
            shape: defaults.shape,
            position: defaults.position,
            group: normalize_group(defaults.group.as_deref()),
            comment: None,
        }
    }

    /// Group key used by the ordering passes.
    pub fn group_key(&self) -> Option<&str> {
        self.group
            .as_deref()
            .map(str::trim)
            .filter(|group| !group.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDefaults {
    pub size: BadgeSize,
    pub color: BadgeColor,
    pub shape: BadgeShape,
    pub position: BadgePosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureArea {
    #[default]
    Viewport,
    FullPage,
}

pub const CAPTURE_QUALITY_RANGE: (u8, u8) = (1, 100);
pub const CAPTURE_SCALE_RANGE: (f32, f32) = (0.25, 4.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSettings {
    pub format: CaptureFormat,
    pub area: CaptureArea,
    pub quality: u8,
    pub scale: f32,
    pub expanded: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            format: CaptureFormat::Png,
            area: CaptureArea::Viewport,
            quality: 90,
            scale: 1.0,
            expanded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_key_drops_fragment_and_keeps_query() {
        let key = PageKey::from_url("https://Example.com:443/docs/a?b=1#section").expect("key");
        assert_eq!(key.as_str(), "https://example.com/docs/a?b=1");
    }

    #[test]
    fn page_key_rejects_hostless_urls() {
        assert!(PageKey::from_url("about:blank").is_none());
        assert!(PageKey::from_url("data:text/html,hi").is_none());
        assert!(PageKey::from_url("not a url").is_none());
    }

    #[test]
    fn blank_group_is_ungrouped() {
        assert_eq!(normalize_group(Some("  ")), None);
        assert_eq!(normalize_group(Some(" Nav ")), Some("Nav".to_string()));
        assert_eq!(normalize_group(None), None);
    }

    #[test]
    fn screen_item_serializes_camel_case_without_empty_optionals() {
        let item = ScreenItem::new(ItemId(3), Anchor::new("#main"), &BadgeDefaults::default());
        let value = serde_json::to_value(&item).expect("json");
        assert_eq!(value["id"], 3);
        assert_eq!(value["size"], "medium");
        assert_eq!(value["position"], "top_left");
        assert_eq!(value["anchor"]["version"], ANCHOR_VERSION);
        assert!(value.get("group").is_none());
    }
}
