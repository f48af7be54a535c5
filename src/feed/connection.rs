// src/feed/connection.rs
//! Lifecycle of the one push connection the client keeps open.
//!
//! Every event a transport produces is tagged with the [`ConnectionId`] of the
//! instance that produced it. Once an instance has been stopped (or has failed
//! and been replaced) its late events no longer match the current id and are
//! dropped in [`StreamConnection::accept`], so they can never reach the store.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::{counter, gauge};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::ensure_metrics_described;

/// How many undelivered transport events may queue up before the transport waits.
pub const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("stream endpoint answered HTTP {0}")]
    Status(u16),
    #[error("stream read failed: {0}")]
    Stream(String),
    #[error("stream ended")]
    Ended,
}

/// Raw lifecycle event as produced by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Failed(TransportError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub connection: ConnectionId,
    pub event: TransportEvent,
}

/// What the consumer sees after stale events have been filtered out.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionSignal {
    Opened,
    Message(String),
    Error(TransportError),
}

/// Write side handed to a transport for exactly one connection instance.
#[derive(Debug, Clone)]
pub struct EventSink {
    id: ConnectionId,
    tx: mpsc::Sender<TaggedEvent>,
}

impl EventSink {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<TaggedEvent>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Report a successful handshake. Returns false once nobody listens anymore.
    pub async fn opened(&self) -> bool {
        self.emit(TransportEvent::Opened).await
    }

    /// Forward one payload verbatim. Returns false once nobody listens anymore.
    pub async fn message(&self, payload: String) -> bool {
        self.emit(TransportEvent::Message(payload)).await
    }

    async fn failed(&self, err: TransportError) -> bool {
        self.emit(TransportEvent::Failed(err)).await
    }

    async fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                connection: self.id,
                event,
            })
            .await
            .is_ok()
    }
}

/// A push transport able to run one connection to the stream endpoint.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Run a single connection until it breaks.
    ///
    /// Implementations call [`EventSink::opened`] once the handshake succeeded and
    /// [`EventSink::message`] for every payload, in delivery order. `Ok(())` means
    /// the server closed the stream; it is reported as [`TransportError::Ended`].
    async fn run(&self, sink: EventSink) -> Result<(), TransportError>;
}

#[derive(Debug)]
struct ActiveConnection {
    id: ConnectionId,
    task: JoinHandle<()>,
}

pub struct StreamConnection {
    transport: Arc<dyn StreamTransport>,
    tx: mpsc::Sender<TaggedEvent>,
    active: Option<ActiveConnection>,
    feed_active: bool,
    state: ConnectionState,
    next_id: u64,
}

impl StreamConnection {
    /// Returns the connection plus the receiver all of its instances report into.
    pub fn new(transport: Arc<dyn StreamTransport>) -> (Self, mpsc::Receiver<TaggedEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let conn = Self {
            transport,
            tx,
            active: None,
            feed_active: false,
            state: ConnectionState::Disconnected,
            next_id: 1,
        };
        (conn, rx)
    }

    /// Raise the feed-active flag and open a connection unless one is already live.
    ///
    /// Returns the id of a newly opened instance, or `None` when nothing changed.
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Option<ConnectionId> {
        ensure_metrics_described();
        self.feed_active = true;

        if let Some(active) = &self.active {
            tracing::debug!(target: "connection", id = active.id.0, "start ignored, connection already live");
            return None;
        }

        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        let transport = Arc::clone(&self.transport);
        let sink = EventSink::new(id, self.tx.clone());
        let task = tokio::spawn(async move {
            let err = match transport.run(sink.clone()).await {
                Ok(()) => TransportError::Ended,
                Err(e) => e,
            };
            let _ = sink.failed(err).await;
        });

        tracing::info!(target: "connection", id = id.0, "connecting");
        self.active = Some(ActiveConnection { id, task });
        Some(id)
    }

    /// Drop the feed-active flag and tear the live instance down, if any.
    ///
    /// The transport task is aborted right away, so anything it still had in
    /// flight is cut off; events it already queued are dropped by `accept`.
    pub fn stop(&mut self) {
        self.feed_active = false;
        if let Some(active) = self.active.take() {
            active.task.abort();
            tracing::info!(target: "connection", id = active.id.0, "connection stopped");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Filter one tagged event through the lifecycle.
    ///
    /// Events from any instance other than the live one are stale and yield `None`.
    pub fn accept(&mut self, ev: TaggedEvent) -> Option<ConnectionSignal> {
        let live = self.active.as_ref().map(|a| a.id);
        if live != Some(ev.connection) {
            tracing::debug!(
                target: "connection",
                stale = ev.connection.0,
                live = ?live.map(|id| id.0),
                "dropping event from stale connection"
            );
            counter!("feed_stale_events_dropped_total").increment(1);
            return None;
        }

        match ev.event {
            TransportEvent::Opened => {
                tracing::info!(target: "connection", id = ev.connection.0, "stream open");
                counter!("feed_connection_opened_total").increment(1);
                self.set_state(ConnectionState::Connected);
                Some(ConnectionSignal::Opened)
            }
            TransportEvent::Message(payload) => Some(ConnectionSignal::Message(payload)),
            TransportEvent::Failed(err) => {
                tracing::warn!(target: "connection", id = ev.connection.0, error = %err, "stream lost");
                counter!("feed_connection_errors_total").increment(1);
                // the task is already finishing; forget it so `start` may reconnect
                if let Some(active) = self.active.take() {
                    active.task.abort();
                }
                self.set_state(ConnectionState::Disconnected);
                Some(ConnectionSignal::Error(err))
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn feed_active(&self) -> bool {
        self.feed_active
    }

    /// Id of the live instance, if one is running.
    pub fn current(&self) -> Option<ConnectionId> {
        self.active.as_ref().map(|a| a.id)
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        gauge!("feed_connected").set(if state == ConnectionState::Connected {
            1.0
        } else {
            0.0
        });
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}
