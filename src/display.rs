//! Plain-text labels for the terminal viewer.

use crate::feed::session::FeedView;
use crate::feed::types::{EventRecord, Sentiment};

pub fn badge(s: Sentiment) -> &'static str {
    match s {
        Sentiment::Bullish => "🟢 Bullish",
        Sentiment::Bearish => "🔴 Bearish",
        Sentiment::Neutral => "🟡 Neutral",
    }
}

pub fn connection_label(connected: bool) -> &'static str {
    if connected {
        "Connected ✅"
    } else {
        "Disconnected ❌"
    }
}

/// Two or three lines per event: headline + badge, source + time, optional url.
pub fn event_block(ev: &EventRecord) -> String {
    let mut out = format!(
        "{} | {} · Risk {}/10\n  {} · {}\n  {}",
        ev.headline,
        badge(ev.sentiment),
        ev.risk_score,
        ev.source,
        ev.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        ev.summary
    );
    if let Some(url) = ev.dedup_key() {
        out.push_str("\n  ");
        out.push_str(url);
    }
    out
}

pub fn render_view(view: &FeedView) -> String {
    let mut out = format!(
        "{} (feed {})\n",
        connection_label(view.connected),
        if view.feed_active { "on" } else { "off" }
    );
    if view.events.is_empty() {
        out.push_str("No events yet. Type `start` to turn the feed on.\n");
        return out;
    }
    for ev in &view.events {
        out.push_str(&event_block(ev));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ev(url: Option<&str>) -> EventRecord {
        EventRecord {
            id: "1".into(),
            headline: "Oil prices surge".into(),
            summary: "Crude rose sharply.".into(),
            sentiment: Sentiment::Bearish,
            risk_score: 7.0,
            source: "WSJ".into(),
            timestamp: chrono::Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap(),
            url: url.map(str::to_string),
        }
    }

    #[test]
    fn block_shows_badge_risk_and_optional_url() {
        let with = event_block(&ev(Some("https://example.com/c")));
        assert!(with.contains("🔴 Bearish · Risk 7/10"));
        assert!(with.ends_with("https://example.com/c"));

        let without = event_block(&ev(None));
        assert_eq!(without.lines().count(), 3);
    }

    #[test]
    fn empty_view_has_hint() {
        let out = render_view(&FeedView::default());
        assert!(out.starts_with("Disconnected ❌"));
        assert!(out.contains("No events yet"));
    }
}
