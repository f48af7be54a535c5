// src/feed/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Market tone attached to an event by the producer.
///
/// Anything other than `BULLISH` / `BEARISH` (case-insensitive) collapses to `Neutral`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "BULLISH" => Sentiment::Bullish,
            "BEARISH" => Sentiment::Bearish,
            _ => Sentiment::Neutral,
        }
    }
}

impl<'de> Deserialize<'de> for Sentiment {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(Sentiment::from_label(&raw))
    }
}

/// One news event as pushed by the feed backend.
///
/// Immutable once it has been accepted by [`crate::feed::store::EventStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Producer id. Not unique per story: re-publications get a fresh id.
    #[serde(deserialize_with = "de_opaque_id")]
    pub id: String,
    pub headline: String,
    pub summary: String,
    pub sentiment: Sentiment,
    /// 0..=10, display only (never validated here).
    pub risk_score: f64,
    pub source: String,
    #[serde(deserialize_with = "de_instant")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl EventRecord {
    /// Dedup key: the url, when present and non-empty.
    pub fn dedup_key(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }
}

// ids arrive as strings from the JVM backend, but numeric ids are common in fixtures
fn de_opaque_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }
    Ok(match RawId::deserialize(d)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Float(f) => f.to_string(),
    })
}

/// Accepts RFC 3339 text, or a number of epoch seconds (fractional allowed).
/// Numbers at or above 1e12 are read as epoch milliseconds.
fn de_instant<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTs {
        Text(String),
        Number(f64),
    }

    match RawTs::deserialize(d)? {
        RawTs::Text(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| D::Error::custom(format!("invalid timestamp '{s}': {e}"))),
        RawTs::Number(n) => {
            if !n.is_finite() {
                return Err(D::Error::custom("non-finite timestamp"));
            }
            let secs = if n.abs() >= 1e12 { n / 1_000.0 } else { n };
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {n}")))
        }
    }
}
