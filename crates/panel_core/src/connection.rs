//! One panel <-> page binding: transport, typed page API and disconnect
//! notifications. A connection is never reused once replaced.

use std::{
    mem,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::{ItemId, ScreenItem, TabId},
    protocol::{PageCommand, PageEvent, RenderReport, Request},
};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::transport::{PortSink, Transport};

/// Page events tagged with the generation of the connection they arrived on.
pub type PageEventSender = mpsc::UnboundedSender<(u64, PageEvent)>;

pub type DisconnectHandler = Box<dyn FnOnce() + Send>;

/// An opened duplex port: outbound sink plus the inbound message stream.
/// The stream ending means the port closed.
pub struct PagePort {
    pub sink: Arc<dyn PortSink>,
    pub inbound: mpsc::UnboundedReceiver<Value>,
}

#[async_trait]
pub trait PageConnector: Send + Sync {
    async fn connect(&self, tab_id: TabId, port_name: &str) -> Result<PagePort>;
}

/// Sink backed by a tokio channel. Closing drops the sender so the peer sees
/// end of stream.
pub struct ChannelSink {
    tx: StdMutex<Option<mpsc::UnboundedSender<Value>>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            tx: StdMutex::new(Some(tx)),
        }
    }
}

impl PortSink for ChannelSink {
    fn post(&self, message: Value) -> Result<()> {
        let guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("port sink lock poisoned"))?;
        let tx = guard.as_ref().ok_or_else(|| anyhow!("port closed"))?;
        tx.send(message).map_err(|_| anyhow!("port peer gone"))
    }

    fn close(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
    }
}

/// Page side of an in-process port.
pub struct PagePeer {
    /// Messages the panel posted.
    pub outbound: mpsc::UnboundedReceiver<Value>,
    /// Messages for the panel; dropping it closes the port.
    pub inbound: mpsc::UnboundedSender<Value>,
}

pub fn in_process_port() -> (PagePort, PagePeer) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    (
        PagePort {
            sink: Arc::new(ChannelSink::new(out_tx)),
            inbound: in_rx,
        },
        PagePeer {
            outbound: out_rx,
            inbound: in_tx,
        },
    )
}

#[derive(Default)]
struct DisconnectRegistry {
    fired: bool,
    handlers: Vec<DisconnectHandler>,
}

impl DisconnectRegistry {
    fn take_for_fire(&mut self) -> Vec<DisconnectHandler> {
        self.fired = true;
        mem::take(&mut self.handlers)
    }
}

/// Typed commands for the page-side overlay.
#[derive(Clone)]
pub struct PageApi {
    transport: Arc<Transport>,
    request_timeout: Duration,
}

impl PageApi {
    pub async fn ping(&self, timeout: Duration) -> bool {
        match self
            .transport
            .send(Request::new(PageCommand::Ping), timeout)
            .await
        {
            Some(response) => response.ok,
            None => false,
        }
    }

    /// `None` when the page did not confirm the render.
    pub async fn render(&self, items: Vec<ScreenItem>) -> Option<RenderReport> {
        let response = self
            .transport
            .send(
                Request::new(PageCommand::Render { items }),
                self.request_timeout,
            )
            .await?;
        if !response.ok {
            debug!(
                request_id = %response.id,
                error = response.error.as_deref().unwrap_or_default(),
                "page rejected render"
            );
            return None;
        }
        match response.data {
            Some(data) => match serde_json::from_value(data) {
                Ok(report) => Some(report),
                Err(err) => {
                    debug!(error = %err, "ignoring malformed render report");
                    Some(RenderReport::default())
                }
            },
            None => Some(RenderReport::default()),
        }
    }

    pub async fn toggle_select(&self, enabled: bool) {
        self.fire(PageCommand::ToggleSelect { enabled }).await;
    }

    pub async fn clear(&self) {
        self.fire(PageCommand::Clear).await;
    }

    pub async fn hover(&self, id: Option<ItemId>) {
        self.fire(PageCommand::Hover { id }).await;
    }

    async fn fire(&self, command: PageCommand) {
        let _ = self
            .transport
            .send(Request::new(command), self.request_timeout)
            .await;
    }
}

pub struct Connection {
    tab_id: TabId,
    generation: u64,
    sink: Arc<dyn PortSink>,
    transport: Arc<Transport>,
    api: PageApi,
    registry: Arc<Mutex<DisconnectRegistry>>,
    pump: JoinHandle<()>,
}

impl Connection {
    /// Wraps an opened port and starts routing its inbound traffic.
    pub fn establish(
        tab_id: TabId,
        generation: u64,
        port: PagePort,
        events: PageEventSender,
        request_timeout: Duration,
    ) -> Self {
        let PagePort { sink, mut inbound } = port;
        let transport = Arc::new(Transport::new(Arc::clone(&sink)));
        let registry = Arc::new(Mutex::new(DisconnectRegistry::default()));

        let pump = {
            let transport = Arc::clone(&transport);
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                while let Some(message) = inbound.recv().await {
                    let Some(message) = transport.handle_inbound(message).await else {
                        continue;
                    };
                    match serde_json::from_value::<PageEvent>(message) {
                        Ok(event) => {
                            if events.send((generation, event)).is_err() {
                                debug!(generation, "page event receiver gone");
                            }
                        }
                        Err(err) => debug!(generation, error = %err, "ignoring unknown page message"),
                    }
                }

                info!(tab_id = %tab_id, generation, "page port closed");
                transport.handle_disconnect().await;
                let handlers = registry.lock().await.take_for_fire();
                for handler in handlers {
                    handler();
                }
            })
        };

        info!(tab_id = %tab_id, generation, "page connection established");
        Self {
            tab_id,
            generation,
            sink,
            api: PageApi {
                transport: Arc::clone(&transport),
                request_timeout,
            },
            transport,
            registry,
            pump,
        }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn page(&self) -> &PageApi {
        &self.api
    }

    pub async fn is_alive(&self) -> bool {
        self.transport.is_alive().await
    }

    /// Runs `handler` once the port closes, or right away if it already has.
    pub async fn on_disconnect(&self, handler: impl FnOnce() + Send + 'static) {
        let mut registry = self.registry.lock().await;
        if registry.fired {
            drop(registry);
            handler();
        } else {
            registry.handlers.push(Box::new(handler));
        }
    }

    /// Tears the connection down without notifying disconnect handlers.
    pub async fn discard(&self) {
        self.registry.lock().await.handlers.clear();
        self.transport.handle_disconnect().await;
        self.sink.close();
        self.pump.abort();
        debug!(tab_id = %self.tab_id, generation = self.generation, "page connection discarded");
    }
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
