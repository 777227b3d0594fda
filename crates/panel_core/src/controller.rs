//! Effect interpreter and connection lifecycle for one panel.
//!
//! `dispatch` is the only writer of the model: it reduces, swaps in the new
//! model, renders and queues the effects. A single drain task executes
//! queued effect batches in order, so persistence writes and page commands
//! never overtake each other.

use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex as StdMutex, PoisonError, Weak,
    },
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use shared::{
    domain::{Anchor, BadgeDefaults, PageKey, ScreenItem, WindowId},
    protocol::{port_name, BackgroundEvent, PageEvent},
};
use storage::{PersistedState, StateStore, INITIAL_NEXT_ID};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::{
    action::Action,
    collab::{CaptureService, PanelView, TabResolver},
    connection::{Connection, PageConnector},
    effect::{Effect, Notice, PersistMode},
    error::ReduceError,
    model::{ConnectionStatus, Model},
    reducer::update,
};

pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(3_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub ping_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            ping_timeout: DEFAULT_PING_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct PanelDeps {
    pub tabs: Arc<dyn TabResolver>,
    pub connector: Arc<dyn PageConnector>,
    pub store: Arc<dyn StateStore>,
    pub capture: Arc<dyn CaptureService>,
    pub view: Arc<dyn PanelView>,
}

/// Outcome of a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Liveness {
    pub alive: bool,
    /// The panel is now bound to a different page than before the check.
    pub page_changed: bool,
}

enum EffectJob {
    Batch(Vec<Effect>),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

struct Inner {
    deps: PanelDeps,
    settings: ControllerSettings,
    model: StdMutex<Arc<Model>>,
    effects_tx: mpsc::UnboundedSender<EffectJob>,
    queued_batches: AtomicUsize,
    events_tx: mpsc::UnboundedSender<(u64, PageEvent)>,
    disconnect_tx: mpsc::UnboundedSender<u64>,
    connection: Mutex<Option<Arc<Connection>>>,
    generation: AtomicU64,
    window_id: Mutex<Option<WindowId>>,
    reconnect_gate: Mutex<()>,
    /// Held across every read-modify-write of a page's stored state, so id
    /// reservation and persistence never interleave on `next_id`.
    store_gate: Mutex<()>,
}

impl Controller {
    /// Builds the controller, starts its background tasks and dispatches
    /// `Init`. Must be called inside a tokio runtime.
    pub fn spawn(deps: PanelDeps, settings: ControllerSettings) -> Self {
        let (effects_tx, effects_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel();

        let controller = Self {
            inner: Arc::new(Inner {
                deps,
                settings,
                model: StdMutex::new(Arc::new(Model::default())),
                effects_tx,
                queued_batches: AtomicUsize::new(0),
                events_tx,
                disconnect_tx,
                connection: Mutex::new(None),
                generation: AtomicU64::new(0),
                window_id: Mutex::new(None),
                reconnect_gate: Mutex::new(()),
                store_gate: Mutex::new(()),
            }),
        };

        tokio::spawn(drain_effects(Arc::downgrade(&controller.inner), effects_rx));
        tokio::spawn(route_port_signals(
            Arc::downgrade(&controller.inner),
            events_rx,
            disconnect_rx,
        ));

        controller.dispatch_logged(Action::Init);
        controller
    }

    fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn model(&self) -> Arc<Model> {
        Arc::clone(&self.lock_model())
    }

    fn lock_model(&self) -> std::sync::MutexGuard<'_, Arc<Model>> {
        self.inner
            .model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Reduces `action` against the current model, publishes the result and
    /// queues its effects. Effects run later on the drain task.
    pub fn dispatch(&self, action: Action) -> Result<(), ReduceError> {
        let name = action.name();
        let mut current = self.lock_model();
        let (next, effects) = match update(&current, action) {
            Ok(transition) => transition,
            Err(err) => {
                warn!(action = name, error = %err, "action rejected");
                return Err(err);
            }
        };
        *current = Arc::new(next);
        self.inner.deps.view.render(&current);

        if !effects.is_empty() {
            debug!(action = name, effects = effects.len(), "queueing effects");
            self.inner.queued_batches.fetch_add(1, Ordering::SeqCst);
            if self
                .inner
                .effects_tx
                .send(EffectJob::Batch(effects))
                .is_err()
            {
                self.inner.queued_batches.fetch_sub(1, Ordering::SeqCst);
                warn!(action = name, "effect queue closed; effects dropped");
            }
        }
        Ok(())
    }

    fn dispatch_logged(&self, action: Action) {
        let _ = self.dispatch(action);
    }

    /// Waits until every queued effect batch, including batches queued by
    /// those effects, has run. Spawned captures are not awaited.
    pub async fn settle(&self) {
        loop {
            let (tx, rx) = oneshot::channel();
            if self.inner.effects_tx.send(EffectJob::Flush(tx)).is_err() {
                return;
            }
            if rx.await.is_err() {
                return;
            }
            if self.inner.queued_batches.load(Ordering::SeqCst) == 0 {
                return;
            }
        }
    }

    /// Reuses a connection that answers a ping unless `force` is set;
    /// otherwise binds to the active tab from scratch.
    pub async fn ensure_connection_alive(&self, force: bool) -> Liveness {
        let _gate = self.inner.reconnect_gate.lock().await;

        if !force {
            let current = self.inner.connection.lock().await.clone();
            if let Some(connection) = current {
                if connection
                    .page()
                    .ping(self.inner.settings.ping_timeout)
                    .await
                {
                    return Liveness {
                        alive: true,
                        page_changed: false,
                    };
                }
                debug!(
                    tab_id = %connection.tab_id(),
                    generation = connection.generation(),
                    "page did not answer ping; reconnecting"
                );
            }
        }

        self.reconnect().await
    }

    async fn reconnect(&self) -> Liveness {
        let previous_key = self.model().page_key.clone();

        let tab = match self.inner.deps.tabs.active_tab().await {
            Ok(Some(tab)) => tab,
            Ok(None) => {
                debug!("no active tab");
                self.unbind(ConnectionStatus::Disconnected).await;
                return Liveness::default();
            }
            Err(err) => {
                warn!(error = %err, "failed to resolve active tab");
                self.unbind(ConnectionStatus::Disconnected).await;
                return Liveness::default();
            }
        };

        let page_key = if self.inner.deps.tabs.is_restricted(&tab.url) {
            None
        } else {
            PageKey::from_url(&tab.url)
        };
        let Some(page_key) = page_key else {
            info!(tab_id = %tab.id, url = %tab.url, "active tab is restricted");
            self.unbind(ConnectionStatus::Restricted).await;
            return Liveness::default();
        };

        self.drop_connection().await;
        *self.inner.window_id.lock().await = Some(tab.window_id);
        self.dispatch_logged(Action::SetStatus(ConnectionStatus::Connecting));

        let port = match self
            .inner
            .deps
            .connector
            .connect(tab.id, &port_name())
            .await
        {
            Ok(port) => port,
            Err(err) => {
                warn!(tab_id = %tab.id, error = %err, "failed to open page port");
                self.dispatch_logged(Action::SetStatus(ConnectionStatus::Disconnected));
                return Liveness::default();
            }
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let connection = Arc::new(Connection::establish(
            tab.id,
            generation,
            port,
            self.inner.events_tx.clone(),
            self.inner.settings.request_timeout,
        ));
        let disconnects = self.inner.disconnect_tx.clone();
        connection
            .on_disconnect(move || {
                let _ = disconnects.send(generation);
            })
            .await;
        *self.inner.connection.lock().await = Some(connection);

        self.dispatch_logged(Action::Connected {
            tab_id: tab.id,
            page_key: page_key.clone(),
        });
        let state = match self.inner.deps.store.load_page_state(&page_key).await {
            Ok(state) => state,
            Err(err) => {
                warn!(page_key = %page_key, error = %err, "failed to load page state");
                self.inner
                    .deps
                    .view
                    .notify(&Notice::error(format!("Could not load saved badges: {err}")));
                PersistedState::default()
            }
        };
        self.dispatch_logged(Action::RestoreState {
            items: state.items,
            defaults: state.defaults,
        });
        self.dispatch_logged(Action::SetStatus(ConnectionStatus::Connected));

        let page_changed = previous_key.is_some_and(|previous| previous != page_key);
        info!(
            tab_id = %tab.id,
            page_key = %page_key,
            generation,
            page_changed,
            "panel bound to page"
        );
        Liveness {
            alive: true,
            page_changed,
        }
    }

    async fn unbind(&self, status: ConnectionStatus) {
        self.drop_connection().await;
        self.dispatch_logged(Action::SetStatus(status));
    }

    async fn drop_connection(&self) {
        let previous = self.inner.connection.lock().await.take();
        if let Some(connection) = previous {
            connection.discard().await;
        }
    }

    /// Tears down the page connection. Queued effects that need the page
    /// will reconnect.
    pub async fn disconnect(&self) {
        let _gate = self.inner.reconnect_gate.lock().await;
        self.drop_connection().await;
    }

    pub async fn handle_background_event(&self, event: BackgroundEvent) {
        match event {
            BackgroundEvent::TabActivated { tab_id, window_id } => {
                let bound = *self.inner.window_id.lock().await;
                if bound.is_some_and(|bound| bound != window_id) {
                    debug!(tab_id = %tab_id, window_id = %window_id, "tab activated in another window");
                    return;
                }
                self.ensure_connection_alive(true).await;
            }
            BackgroundEvent::TabNavigated { tab_id, url } => {
                if self.model().tab_id != Some(tab_id) {
                    return;
                }
                debug!(tab_id = %tab_id, url = %url, "bound tab navigated");
                self.ensure_connection_alive(true).await;
            }
        }
    }

    /// Handles a message from the page-side overlay. Events from a replaced
    /// connection are dropped.
    pub async fn handle_page_event(&self, generation: u64, event: PageEvent) {
        // wait out a bind in progress so events see the restored model
        let _gate = self.inner.reconnect_gate.lock().await;
        if generation != self.inner.generation.load(Ordering::SeqCst) {
            debug!(generation, "ignoring event from stale page connection");
            return;
        }

        match event {
            PageEvent::SelectionChanged { anchors } => {
                if let Err(err) = self.pick_anchors(anchors).await {
                    warn!(error = %err, "failed to add picked elements");
                    self.inner
                        .deps
                        .view
                        .notify(&Notice::error(format!("Could not add badges: {err}")));
                }
            }
            PageEvent::MissingChanged { missing_ids } => {
                self.dispatch_logged(Action::MissingIdsReported(missing_ids));
            }
        }
    }

    async fn pick_anchors(&self, anchors: Vec<Anchor>) -> Result<()> {
        let model = self.model();
        let Some(page_key) = model.page_key.clone() else {
            debug!("selection event without a bound page");
            return Ok(());
        };

        let mut fresh: Vec<Anchor> = Vec::new();
        for anchor in anchors {
            if model.contains_anchor(&anchor.selector)
                || fresh.iter().any(|seen| seen.same_element(&anchor))
            {
                continue;
            }
            fresh.push(anchor);
        }
        if fresh.is_empty() {
            return Ok(());
        }

        let ids = {
            let _store = self.inner.store_gate.lock().await;
            self.inner
                .deps
                .store
                .reserve_ids(&page_key, fresh.len())
                .await
                .with_context(|| format!("failed to reserve ids for {page_key}"))?
        };
        let items = ids
            .into_iter()
            .zip(fresh)
            .map(|(id, anchor)| ScreenItem::new(id, anchor, &model.defaults))
            .collect();
        self.dispatch_logged(Action::ItemsPicked(items));
        Ok(())
    }

    async fn handle_port_closed(&self, generation: u64) {
        let _gate = self.inner.reconnect_gate.lock().await;
        let current = {
            let mut connection = self.inner.connection.lock().await;
            match connection.as_ref() {
                Some(existing) if existing.generation() == generation => connection.take(),
                _ => None,
            }
        };
        let Some(connection) = current else {
            debug!(generation, "ignoring disconnect from stale page connection");
            return;
        };
        connection.discard().await;
        self.dispatch_logged(Action::PortDisconnected);
    }

    async fn run_batch(&self, effects: Vec<Effect>) {
        let mut page_abandoned = false;
        for effect in effects {
            let name = effect.name();
            if effect.requires_page() {
                if page_abandoned {
                    debug!(effect = name, "skipping page effect after page change");
                    continue;
                }
                let liveness = self.ensure_connection_alive(false).await;
                if !liveness.alive || liveness.page_changed {
                    debug!(
                        effect = name,
                        alive = liveness.alive,
                        page_changed = liveness.page_changed,
                        "abandoning page effects"
                    );
                    page_abandoned = true;
                    continue;
                }
            }

            if let Err(err) = self.execute(effect).await {
                warn!(effect = name, error = %err, "effect failed");
            }
        }
    }

    async fn execute(&self, effect: Effect) -> Result<()> {
        match effect {
            Effect::RenderContent(items) => {
                let connection = self.current_connection().await?;
                match connection.page().render(items).await {
                    Some(report) => {
                        self.dispatch_logged(Action::MissingIdsReported(report.missing_ids))
                    }
                    None => debug!(generation = connection.generation(), "render not confirmed"),
                }
            }
            Effect::ToggleSelectOnPage(enabled) => {
                self.current_connection()
                    .await?
                    .page()
                    .toggle_select(enabled)
                    .await;
            }
            Effect::ClearContent => self.current_connection().await?.page().clear().await,
            Effect::HoverContent(id) => self.current_connection().await?.page().hover(id).await,
            Effect::Persist {
                page_key,
                items,
                defaults,
                mode,
            } => {
                self.persist(&page_key, items, defaults, mode).await?;
            }
            Effect::Capture { tab_id, settings } => {
                let controller = self.clone();
                tokio::spawn(async move {
                    let capture = Arc::clone(&controller.inner.deps.capture);
                    let action = match capture.capture(tab_id, &settings).await {
                        Ok(download_id) => Action::CaptureSucceeded { download_id },
                        Err(err) => {
                            warn!(tab_id = %tab_id, error = %err, "capture failed");
                            Action::CaptureFailed {
                                error: err.to_string(),
                            }
                        }
                    };
                    controller.dispatch_logged(action);
                });
            }
            Effect::Notify(notice) => self.inner.deps.view.notify(&notice),
        }
        Ok(())
    }

    async fn current_connection(&self) -> Result<Arc<Connection>> {
        self.inner
            .connection
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("no page connection"))
    }

    /// Read-merge-write: the model owns items and defaults, the store owns
    /// the id counter.
    async fn persist(
        &self,
        page_key: &PageKey,
        items: Vec<ScreenItem>,
        defaults: BadgeDefaults,
        mode: PersistMode,
    ) -> Result<()> {
        let store = &self.inner.deps.store;
        let _store = self.inner.store_gate.lock().await;
        let mut state = store
            .load_page_state(page_key)
            .await
            .with_context(|| format!("failed to read state for {page_key}"))?;
        state.items = items;
        state.defaults = defaults;
        state.next_id = match mode {
            PersistMode::Merge => {
                let above_items = state
                    .items
                    .iter()
                    .map(|item| item.id.0 + 1)
                    .max()
                    .unwrap_or(INITIAL_NEXT_ID);
                state.next_id.max(above_items)
            }
            PersistMode::ResetCounter => INITIAL_NEXT_ID,
        };
        store
            .save_page_state(page_key, &state)
            .await
            .with_context(|| format!("failed to write state for {page_key}"))
    }
}

async fn drain_effects(inner: Weak<Inner>, mut jobs: mpsc::UnboundedReceiver<EffectJob>) {
    while let Some(job) = jobs.recv().await {
        match job {
            EffectJob::Batch(effects) => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let controller = Controller::from_inner(inner);
                controller.run_batch(effects).await;
                controller
                    .inner
                    .queued_batches
                    .fetch_sub(1, Ordering::SeqCst);
            }
            EffectJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn route_port_signals(
    inner: Weak<Inner>,
    mut events: mpsc::UnboundedReceiver<(u64, PageEvent)>,
    mut disconnects: mpsc::UnboundedReceiver<u64>,
) {
    loop {
        tokio::select! {
            Some((generation, event)) = events.recv() => {
                let Some(inner) = inner.upgrade() else { break };
                Controller::from_inner(inner).handle_page_event(generation, event).await;
            }
            Some(generation) = disconnects.recv() => {
                let Some(inner) = inner.upgrade() else { break };
                Controller::from_inner(inner).handle_port_closed(generation).await;
            }
            else => break,
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
