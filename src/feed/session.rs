// src/feed/session.rs
//! Single-task event loop tying the connection lifecycle to the event store.
//!
//! Commands, transport events and the optional reconnect timer are handled one
//! at a time on one task, so the store's check-then-insert never interleaves
//! with another ingest. Observers get a [`FeedView`] over a `watch` channel.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

use super::connection::{ConnectionSignal, StreamConnection, StreamTransport, TaggedEvent};
use super::store::EventStore;
use super::types::EventRecord;
use crate::config::{ClientConfig, ReconnectPolicy};
use crate::control::FeedControl;

/// What a display layer needs to draw the feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedView {
    pub connected: bool,
    pub feed_active: bool,
    /// Newest first.
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
enum ControlAction {
    Start,
    Stop,
}

/// Cheap, cloneable remote for a running [`FeedSession`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    view_rx: watch::Receiver<FeedView>,
}

impl SessionHandle {
    /// Turn the feed on: (re)connect the stream and tell the backend.
    pub async fn start_feed(&self) -> Result<()> {
        self.send(Command::Start).await
    }

    /// Turn the feed off: drop the stream and tell the backend.
    pub async fn stop_feed(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedView> {
        self.view_rx.clone()
    }

    /// Latest published view.
    pub fn view(&self) -> FeedView {
        self.view_rx.borrow().clone()
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| anyhow!("feed session has stopped"))
    }
}

pub struct FeedSession {
    connection: StreamConnection,
    events_rx: mpsc::Receiver<TaggedEvent>,
    store: EventStore,
    control: Option<FeedControl>,
    reconnect: ReconnectPolicy,
    auto_start: bool,
    attempts: u8,
    retry_at: Option<Instant>,
    cmd_rx: mpsc::Receiver<Command>,
    view_tx: watch::Sender<FeedView>,
}

impl FeedSession {
    pub fn new(
        cfg: &ClientConfig,
        transport: Arc<dyn StreamTransport>,
        control: Option<FeedControl>,
    ) -> (Self, SessionHandle) {
        let (connection, events_rx) = StreamConnection::new(transport);
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (view_tx, view_rx) = watch::channel(FeedView::default());

        let session = Self {
            connection,
            events_rx,
            store: EventStore::with_capacity(cfg.capacity),
            control,
            reconnect: cfg.reconnect,
            auto_start: cfg.auto_start,
            attempts: 0,
            retry_at: None,
            cmd_rx,
            view_tx,
        };
        (session, SessionHandle { cmd_tx, view_rx })
    }

    /// Drive the session until `shutdown` is called or every handle is dropped.
    ///
    /// Returns the final store so callers can inspect what was collected.
    pub async fn run(mut self) -> EventStore {
        if self.auto_start {
            // connecting on launch is local only; the backend is not poked
            self.connection.start();
            self.publish();
        }

        loop {
            let retry_at = self.retry_at;
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Start) => self.handle_start(),
                    Some(Command::Stop) => self.handle_stop(),
                    Some(Command::Shutdown) | None => break,
                },
                Some(ev) = self.events_rx.recv() => self.handle_event(ev),
                _ = wait_retry(retry_at) => self.handle_retry(),
            }
        }

        self.connection.stop();
        self.publish();
        tracing::info!(target: "feed", held = self.store.len(), "feed session finished");
        self.store
    }

    fn handle_start(&mut self) {
        self.clear_retry();
        self.connection.start();
        self.fire_control(ControlAction::Start);
        self.publish();
    }

    fn handle_stop(&mut self) {
        self.clear_retry();
        self.connection.stop();
        self.fire_control(ControlAction::Stop);
        self.publish();
    }

    fn handle_event(&mut self, ev: TaggedEvent) {
        match self.connection.accept(ev) {
            None => {}
            Some(ConnectionSignal::Opened) => {
                self.attempts = 0;
                self.publish();
            }
            Some(ConnectionSignal::Message(payload)) => {
                if self.store.ingest(&payload).is_inserted() {
                    self.publish();
                }
            }
            Some(ConnectionSignal::Error(_)) => {
                self.schedule_retry();
                self.publish();
            }
        }
    }

    fn handle_retry(&mut self) {
        self.retry_at = None;
        if self.connection.feed_active() {
            tracing::info!(target: "connection", attempt = self.attempts, "reconnecting");
            self.connection.start();
            self.publish();
        }
    }

    fn schedule_retry(&mut self) {
        if !self.reconnect.enabled() || !self.connection.feed_active() {
            return;
        }
        self.attempts = self.attempts.saturating_add(1);
        match self.reconnect.delay_for(self.attempts) {
            Some(delay) => {
                tracing::info!(
                    target: "connection",
                    attempt = self.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                self.retry_at = Some(Instant::now() + delay);
            }
            None => {
                tracing::warn!(
                    target: "connection",
                    attempts = self.attempts - 1,
                    "reconnect attempts exhausted, staying disconnected"
                );
            }
        }
    }

    fn clear_retry(&mut self) {
        self.retry_at = None;
        self.attempts = 0;
    }

    fn fire_control(&self, action: ControlAction) {
        let Some(ctrl) = self.control.clone() else {
            return;
        };
        tokio::spawn(async move {
            let res = match action {
                ControlAction::Start => ctrl.start_feed().await,
                ControlAction::Stop => ctrl.stop_feed().await,
            };
            if let Err(e) = res {
                tracing::warn!(target: "control", error = ?e, ?action, "control request failed");
            }
        });
    }

    fn publish(&self) {
        self.view_tx.send_replace(FeedView {
            connected: self.connection.is_connected(),
            feed_active: self.connection.feed_active(),
            events: self.store.snapshot(),
        });
    }
}

async fn wait_retry(at: Option<Instant>) {
    match at {
        Some(t) => sleep_until(t).await,
        None => std::future::pending::<()>().await,
    }
}
