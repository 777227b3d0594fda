//! WebSocket transport for page ports: one socket per `(tab, port name)`.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use shared::domain::TabId;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::connection::{ChannelSink, PageConnector, PagePort};

pub struct WsPageConnector {
    endpoint: String,
}

impl WsPageConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn port_url(&self, tab_id: TabId, port_name: &str) -> Result<String> {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        let base = if let Some(rest) = endpoint.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = endpoint.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            endpoint.to_string()
        } else {
            return Err(anyhow!(
                "page endpoint must start with http(s):// or ws(s)://: {endpoint}"
            ));
        };
        Ok(format!("{base}/ports/{port_name}?tab_id={tab_id}"))
    }
}

#[async_trait]
impl PageConnector for WsPageConnector {
    async fn connect(&self, tab_id: TabId, port_name: &str) -> Result<PagePort> {
        let url = self.port_url(tab_id, port_name)?;
        let (stream, _) = connect_async(&url)
            .await
            .with_context(|| format!("failed to open page port: {url}"))?;
        let (mut writer, mut reader) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(error = %err, "failed to encode page message");
                        continue;
                    }
                };
                if writer.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = writer.close().await;
        });

        let (in_tx, in_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(message) = reader.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Value>(&text) {
                        Ok(value) => {
                            if in_tx.send(value).is_err() {
                                break;
                            }
                        }
                        Err(err) => debug!(error = %err, "ignoring non-json page message"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(tab_id = %tab_id, error = %err, "page socket receive failed");
                        break;
                    }
                }
            }
        });

        Ok(PagePort {
            sink: Arc::new(ChannelSink::new(out_tx)),
            inbound: in_rx,
        })
    }
}

#[cfg(test)]
#[path = "tests/ws_tests.rs"]
mod tests;
