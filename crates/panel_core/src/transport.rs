//! Request/response multiplexing over one duplex port.
//!
//! Every reply-expecting call is resolved exactly once: by the matching reply,
//! by its timeout (`None`), or by the port closing (a `disconnected` failure
//! response). Once the port has closed the transport never touches it again.

use std::{collections::HashMap, mem, sync::Arc, time::Duration};

use serde_json::Value;
use shared::protocol::{Request, Response};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

/// Outbound half of a duplex port.
pub trait PortSink: Send + Sync {
    fn post(&self, message: Value) -> anyhow::Result<()>;

    fn close(&self) {}
}

pub struct Transport {
    sink: Arc<dyn PortSink>,
    state: Mutex<TransportState>,
}

struct TransportState {
    alive: bool,
    pending: HashMap<String, oneshot::Sender<Response>>,
}

impl Transport {
    pub fn new(sink: Arc<dyn PortSink>) -> Self {
        Self {
            sink,
            state: Mutex::new(TransportState {
                alive: true,
                pending: HashMap::new(),
            }),
        }
    }

    pub async fn is_alive(&self) -> bool {
        self.state.lock().await.alive
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn send(&self, request: Request, timeout: Duration) -> Option<Response> {
        let payload = match serde_json::to_value(&request) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(request_id = %request.id, error = %err, "failed to encode port request");
                return None;
            }
        };

        let mut rx = {
            let mut state = self.state.lock().await;
            if !state.alive {
                debug!(
                    request_id = %request.id,
                    command = request.command.name(),
                    "port closed; request not sent"
                );
                return None;
            }

            if !request.expect_reply {
                if let Err(err) = self.sink.post(payload) {
                    warn!(request_id = %request.id, error = %err, "port post failed");
                }
                return None;
            }

            let (tx, rx) = oneshot::channel();
            state.pending.insert(request.id.clone(), tx);
            if let Err(err) = self.sink.post(payload) {
                warn!(request_id = %request.id, error = %err, "port post failed");
                state.pending.remove(&request.id);
                return None;
            }
            rx
        };

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(response)) => Some(response),
            Ok(Err(_)) => None,
            Err(_) => {
                self.state.lock().await.pending.remove(&request.id);
                // a reply that landed between the deadline and the removal still wins
                let late = rx.try_recv().ok();
                if late.is_none() {
                    debug!(
                        request_id = %request.id,
                        command = request.command.name(),
                        timeout_ms = timeout.as_millis() as u64,
                        "port request timed out"
                    );
                }
                late
            }
        }
    }

    /// Consumes `message` when it is a reply; hands it back otherwise so the
    /// caller can route it as an event.
    pub async fn handle_inbound(&self, message: Value) -> Option<Value> {
        if !Response::looks_like_reply(&message) {
            return Some(message);
        }

        let response = match Response::from_value(message) {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "ignoring malformed port reply");
                return None;
            }
        };

        let waiter = self.state.lock().await.pending.remove(&response.id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => debug!(request_id = %response.id, "reply without pending request"),
        }
        None
    }

    pub async fn handle_disconnect(&self) {
        let pending = {
            let mut state = self.state.lock().await;
            if !state.alive {
                return;
            }
            state.alive = false;
            mem::take(&mut state.pending)
        };

        if !pending.is_empty() {
            debug!(pending = pending.len(), "port closed; flushing pending requests");
        }
        for (id, tx) in pending {
            let _ = tx.send(Response::disconnected(id));
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
