//! Message models

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de;
use serde::{Deserialize, Serialize};

/// Accept the timestamp shapes the backend emits: RFC 3339, a zone-less
/// ISO local date-time (taken as UTC), or a `[y, m, d, h, min, s, nanos]` array.
fn flexible_timestamp<'de, D: de::Deserializer<'de>>(
    d: D,
) -> std::result::Result<DateTime<Utc>, D::Error> {
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = DateTime<Utc>;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("an ISO 8601 timestamp or a date-time component array")
        }
        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<DateTime<Utc>, E> {
            parse_timestamp(v).ok_or_else(|| E::custom(format!("invalid timestamp: {}", v)))
        }
        fn visit_seq<A: de::SeqAccess<'de>>(
            self,
            mut seq: A,
        ) -> std::result::Result<DateTime<Utc>, A::Error> {
            let mut parts = [0i64; 7];
            let mut len = 0;
            while let Some(n) = seq.next_element::<i64>()? {
                if len < parts.len() {
                    parts[len] = n;
                }
                len += 1;
            }
            if len < 3 {
                return Err(de::Error::invalid_length(len, &self));
            }
            NaiveDate::from_ymd_opt(parts[0] as i32, parts[1] as u32, parts[2] as u32)
                .and_then(|d| {
                    d.and_hms_nano_opt(parts[3] as u32, parts[4] as u32, parts[5] as u32, parts[6] as u32)
                })
                .map(|dt| dt.and_utc())
                .ok_or_else(|| de::Error::custom("date-time components out of range"))
        }
    }
    d.deserialize_any(Visitor)
}

/// Parse an RFC 3339 timestamp, or a local ISO date-time interpreted as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

/// A single chat message as returned by `GET /chats/messages/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub reply_to: Option<String>,
    /// true when the signed-in user wrote this message
    #[serde(default)]
    pub is_sender: bool,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Sort a thread oldest-first. Stable, so equal timestamps keep server order.
pub fn sort_chronologically(messages: &mut [Message]) {
    messages.sort_by_key(|m| m.created_at);
}
