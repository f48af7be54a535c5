// src/feed/store.rs
//! Bounded, first-seen-wins view of the most recent feed events.
//!
//! The store is the only thing that mutates the displayed list. It keeps
//! events newest-first by *arrival* (the producer timestamp is ignored for
//! ordering), holds at most `capacity` of them, and never holds two events
//! with the same non-empty url.

use std::collections::{HashSet, VecDeque};

use metrics::{counter, gauge};
use thiserror::Error;

use super::ensure_metrics_described;
use super::types::EventRecord;

/// Display window of the original client.
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty payload")]
    Empty,
    #[error("malformed event json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
pub enum IngestOutcome {
    Inserted,
    Duplicate,
    Rejected(ParseError),
}

impl IngestOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, IngestOutcome::Inserted)
    }
}

#[derive(Debug, Clone)]
pub struct EventStore {
    /// Front = newest.
    events: VecDeque<EventRecord>,
    /// Dedup keys of everything currently in `events`.
    keys: HashSet<String>,
    cap: usize,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `cap` of 0 is treated as 1.
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            events: VecDeque::with_capacity(cap),
            keys: HashSet::with_capacity(cap),
            cap,
        }
    }

    /// Parse one raw stream payload and fold it into the view.
    ///
    /// Never panics and never leaves the store half-updated: a rejected or
    /// duplicate payload leaves it exactly as it was.
    pub fn ingest(&mut self, raw: &str) -> IngestOutcome {
        ensure_metrics_described();

        match parse_payload(raw) {
            Ok(ev) => self.ingest_record(ev),
            Err(e) => {
                tracing::warn!(target: "feed", error = %e, len = raw.len(), "dropping malformed payload");
                counter!("feed_events_rejected_total").increment(1);
                IngestOutcome::Rejected(e)
            }
        }
    }

    /// Same as [`EventStore::ingest`] for an already decoded record.
    pub fn ingest_record(&mut self, ev: EventRecord) -> IngestOutcome {
        ensure_metrics_described();

        if let Some(key) = ev.dedup_key() {
            if self.keys.contains(key) {
                tracing::debug!(target: "feed", id = %ev.id, url = key, "duplicate url, keeping first seen");
                counter!("feed_events_duplicate_total").increment(1);
                return IngestOutcome::Duplicate;
            }
            self.keys.insert(key.to_string());
        }

        tracing::debug!(target: "feed", id = %ev.id, source = %ev.source, "event inserted");
        self.events.push_front(ev);

        let mut evicted = 0u64;
        while self.events.len() > self.cap {
            if let Some(old) = self.events.pop_back() {
                if let Some(key) = old.dedup_key() {
                    self.keys.remove(key);
                }
                evicted += 1;
            }
        }

        counter!("feed_events_inserted_total").increment(1);
        if evicted > 0 {
            counter!("feed_events_evicted_total").increment(evicted);
        }
        gauge!("feed_store_len").set(self.events.len() as f64);

        IngestOutcome::Inserted
    }

    /// Newest-first copy of the current view.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.events.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> + '_ {
        self.events.iter()
    }

    pub fn newest(&self) -> Option<&EventRecord> {
        self.events.front()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.keys.contains(url)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }
}

/// Decode one stream payload into an [`EventRecord`].
pub fn parse_payload(raw: &str) -> Result<EventRecord, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(serde_json::from_str(trimmed)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(id: &str, url: Option<&str>) -> String {
        let url = url
            .map(|u| format!(r#","url":"{u}""#))
            .unwrap_or_default();
        format!(
            r#"{{"id":"{id}","headline":"h{id}","summary":"s","sentiment":"NEUTRAL","riskScore":5,"source":"Wire","timestamp":"2025-09-06T09:00:00Z"{url}}}"#
        )
    }

    fn ids(store: &EventStore) -> Vec<String> {
        store.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn first_seen_wins_on_same_url() {
        let mut store = EventStore::new();
        assert!(store.ingest(&payload("1", Some("a"))).is_inserted());
        assert!(matches!(
            store.ingest(&payload("2", Some("a"))),
            IngestOutcome::Duplicate
        ));
        assert_eq!(ids(&store), vec!["1"]);
    }

    #[test]
    fn eviction_frees_the_url_key() {
        let mut store = EventStore::with_capacity(2);
        store.ingest(&payload("1", Some("a")));
        store.ingest(&payload("2", Some("b")));
        store.ingest(&payload("3", Some("c")));
        assert!(!store.contains_url("a"));
        assert_eq!(ids(&store), vec!["3", "2"]);

        // "a" fell out of the window, so it is new again
        assert!(store.ingest(&payload("4", Some("a"))).is_inserted());
        assert_eq!(ids(&store), vec!["4", "3"]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut store = EventStore::with_capacity(0);
        assert_eq!(store.capacity(), 1);
        store.ingest(&payload("1", None));
        store.ingest(&payload("2", None));
        assert_eq!(ids(&store), vec!["2"]);
    }

    #[test]
    fn empty_and_garbage_payloads_are_rejected() {
        let mut store = EventStore::new();
        assert!(matches!(
            store.ingest("   "),
            IngestOutcome::Rejected(ParseError::Empty)
        ));
        assert!(matches!(
            store.ingest("not json"),
            IngestOutcome::Rejected(ParseError::Json(_))
        ));
        assert!(store.is_empty());
    }
}
