// src/lib.rs
// Public library surface for the viewer binary and integration tests.

pub mod config;
pub mod control;
pub mod display;
pub mod feed;
pub mod metrics;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::{ClientConfig, LogFormat, ReconnectPolicy};
pub use crate::control::{FeedControl, FeedStatus, NewsSubmission};
pub use crate::feed::connection::{
    ConnectionId, ConnectionSignal, ConnectionState, EventSink, StreamConnection,
    StreamTransport, TaggedEvent, TransportError, TransportEvent,
};
pub use crate::feed::session::{FeedSession, FeedView, SessionHandle};
pub use crate::feed::sse::{SseDecoder, SseEvent, SseTransport};
pub use crate::feed::store::{EventStore, IngestOutcome, ParseError, DEFAULT_CAPACITY};
pub use crate::feed::types::{EventRecord, Sentiment};
