// src/feed/sse.rs
//! `text/event-stream` framing and the HTTP transport that feeds it.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;

use super::connection::{EventSink, StreamTransport, TransportError};
use crate::config::ClientConfig;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// Unnamed events (or ones explicitly named `message`) are what a browser
    /// `onmessage` handler would receive.
    pub fn is_message(&self) -> bool {
        self.event.as_deref().map_or(true, |e| e == "message")
    }
}

/// Longest line the decoder buffers; anything past it is discarded up to the next line break.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Cap on the `data` buffer of a single event; a bigger event is dropped whole.
pub const MAX_EVENT_BYTES: usize = 4 * MAX_LINE_BYTES;

/// Incremental SSE parser. Feed it chunks as they arrive, in any split.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    /// Previous chunk ended on `\r`; a leading `\n` belongs to that line break.
    after_cr: bool,
    /// Current line overflowed `MAX_LINE_BYTES`; skip until its terminator.
    discarding: bool,
    /// Current event overflowed `MAX_EVENT_BYTES`; skip until the blank line.
    oversized: bool,
    data: Option<String>,
    event: Option<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut out = Vec::new();
        for &b in chunk {
            if self.after_cr {
                self.after_cr = false;
                if b == b'\n' {
                    continue;
                }
            }
            match b {
                b'\n' | b'\r' => {
                    self.after_cr = b == b'\r';
                    if std::mem::take(&mut self.discarding) {
                        continue;
                    }
                    let raw = std::mem::take(&mut self.line);
                    let line = String::from_utf8_lossy(&raw);
                    if let Some(ev) = self.process_line(&line) {
                        out.push(ev);
                    }
                }
                _ if self.discarding => {}
                _ if self.line.len() >= MAX_LINE_BYTES => {
                    tracing::warn!(target: "connection", limit = MAX_LINE_BYTES, "dropping oversized sse line");
                    self.line = Vec::new();
                    self.discarding = true;
                }
                _ => self.line.push(b),
            }
        }
        out
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            let event = self.event.take();
            if std::mem::take(&mut self.oversized) {
                self.data = None;
                return None;
            }
            let data = self.data.take()?;
            return Some(SseEvent {
                event,
                data,
                id: self.last_id.clone(),
            });
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };

        match field {
            "data" if self.oversized => {}
            "data" => {
                let held = self.data.as_ref().map_or(0, |d| d.len() + 1);
                if held + value.len() > MAX_EVENT_BYTES {
                    tracing::warn!(target: "connection", limit = MAX_EVENT_BYTES, "dropping oversized sse event");
                    self.data = None;
                    self.oversized = true;
                    return None;
                }
                match &mut self.data {
                    Some(d) => {
                        d.push('\n');
                        d.push_str(value);
                    }
                    None => self.data = Some(value.to_string()),
                }
            }
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            // `retry:` is ignored; reconnect timing belongs to ReconnectPolicy
            _ => {}
        }
        None
    }
}

/// Long-lived `GET` against the stream endpoint, decoded as SSE.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: Client,
    url: String,
    cache_bust: bool,
}

impl SseTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            cache_bust: true,
        }
    }

    pub fn from_config(cfg: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .build()
            .context("building stream http client")?;
        Ok(Self {
            client,
            url: cfg.stream_url(),
            cache_bust: cfg.cache_bust,
        })
    }

    /// Append `t=<unix millis>` to every connect so intermediaries never replay a stream.
    pub fn with_cache_bust(mut self, on: bool) -> Self {
        self.cache_bust = on;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    async fn run(&self, sink: EventSink) -> Result<(), TransportError> {
        let mut req = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if self.cache_bust {
            req = req.query(&[("t", chrono::Utc::now().timestamp_millis())]);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        if !sink.opened().await {
            return Ok(());
        }

        let mut decoder = SseDecoder::new();
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| TransportError::Stream(e.to_string()))?;
            for ev in decoder.push(&chunk) {
                if !ev.is_message() {
                    tracing::debug!(target: "connection", event = ?ev.event, "skipping named event");
                    continue;
                }
                if !sink.message(ev.data).await {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
