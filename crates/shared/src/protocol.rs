use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::{Anchor, ItemId, ScreenItem, TabId, WindowId},
    error::ProtocolError,
};

pub const PORT_PROTOCOL: &str = "screen-badges";
pub const PORT_PROTOCOL_VERSION: u32 = 1;
pub const DISCONNECTED_ERROR: &str = "disconnected";

/// Name of the panel <-> page duplex port for the current protocol version.
pub fn port_name() -> String {
    format!("{PORT_PROTOCOL}/v{PORT_PROTOCOL_VERSION}")
}

/// Receiving side check: a port opened under another tag or version is
/// refused instead of being spoken to in a mismatched dialect.
pub fn check_port_name(name: &str) -> Result<(), ProtocolError> {
    let expected = port_name();
    if name == expected {
        Ok(())
    } else {
        Err(ProtocolError::PortNameMismatch {
            expected,
            actual: name.to_string(),
        })
    }
}

/// Commands the panel sends to the page-side overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageCommand {
    Render { items: Vec<ScreenItem> },
    ToggleSelect { enabled: bool },
    Clear,
    Hover { id: Option<ItemId> },
    Ping,
}

impl PageCommand {
    pub fn expects_reply(&self) -> bool {
        matches!(self, Self::Render { .. } | Self::Ping)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Render { .. } => "render",
            Self::ToggleSelect { .. } => "toggle_select",
            Self::Clear => "clear",
            Self::Hover { .. } => "hover",
            Self::Ping => "ping",
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    #[serde(rename = "expectReply", default, skip_serializing_if = "is_false")]
    pub expect_reply: bool,
    #[serde(flatten)]
    pub command: PageCommand,
}

impl Request {
    pub fn new(command: PageCommand) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            expect_reply: command.expects_reply(),
            command,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(id: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            id: id.into(),
            ok: true,
            data,
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn disconnected(id: impl Into<String>) -> Self {
        Self::failure(id, DISCONNECTED_ERROR)
    }

    pub fn is_disconnected(&self) -> bool {
        !self.ok && self.error.as_deref() == Some(DISCONNECTED_ERROR)
    }

    /// Structural reply check: only messages with a string `id` and a boolean
    /// `ok` are replies. Everything else is left for event routing.
    pub fn looks_like_reply(message: &Value) -> bool {
        message.get("id").is_some_and(Value::is_string)
            && message.get("ok").is_some_and(Value::is_boolean)
    }

    pub fn from_value(message: Value) -> Result<Self, ProtocolError> {
        serde_json::from_value(message).map_err(|err| ProtocolError::Malformed(err.to_string()))
    }
}

/// Data carried by a successful `RENDER` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    #[serde(default)]
    pub missing_ids: Vec<ItemId>,
}

/// Unsolicited messages from the page-side overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum PageEvent {
    SelectionChanged { anchors: Vec<Anchor> },
    MissingChanged { missing_ids: Vec<ItemId> },
}

/// Notifications from the long-lived background process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum BackgroundEvent {
    TabActivated { tab_id: TabId, window_id: WindowId },
    TabNavigated { tab_id: TabId, url: String },
}
