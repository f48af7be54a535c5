// src/feed/mod.rs
pub mod connection;
pub mod session;
pub mod sse;
pub mod store;
pub mod types;

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feed_events_inserted_total",
            "Events accepted into the view."
        );
        describe_counter!(
            "feed_events_duplicate_total",
            "Events dropped because their url was already held."
        );
        describe_counter!(
            "feed_events_rejected_total",
            "Payloads that failed to parse."
        );
        describe_counter!(
            "feed_events_evicted_total",
            "Events pushed out of the bounded view."
        );
        describe_counter!(
            "feed_connection_opened_total",
            "Stream handshakes that succeeded."
        );
        describe_counter!(
            "feed_connection_errors_total",
            "Stream connections lost or refused."
        );
        describe_counter!(
            "feed_stale_events_dropped_total",
            "Events from stopped connection instances that were discarded."
        );
        describe_gauge!("feed_store_len", "Number of events currently held.");
        describe_gauge!("feed_connected", "1 while the stream is open, else 0.");
    });
}
