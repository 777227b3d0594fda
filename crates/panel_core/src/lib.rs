pub mod action;
pub mod collab;
pub mod connection;
pub mod controller;
pub mod effect;
pub mod error;
pub mod model;
pub mod ordering;
pub mod page;
pub mod reducer;
pub mod transport;
pub mod ws;

pub use action::{Action, SelectionChange};
pub use collab::{CaptureService, LogView, MissingCaptureService, PanelView, StaticTabResolver, Tab, TabResolver};
pub use connection::{Connection, PageApi, PageConnector, PagePort};
pub use controller::{Controller, ControllerSettings, Liveness, PanelDeps};
pub use effect::{Effect, Notice, NoticeLevel, PersistMode};
pub use error::ReduceError;
pub use model::{ConnectionStatus, Model};
pub use reducer::update;
pub use ws::WsPageConnector;
