//! Shared helpers for webhook-pushed payloads read back from the KV store.

use bias_core::TimestampSource;
use chrono::{DateTime, Utc};

/// Derive the source timestamp from a payload, preferring authoritative
/// keys. Falls back to wall clock with provenance recorded as `Fallback`,
/// which the composite aggregates into `unverifiable_factors`.
pub fn extract_source_timestamp(payload: &serde_json::Value) -> (DateTime<Utc>, TimestampSource) {
    let candidates = [
        ("updated_at", TimestampSource::UpdatedAt),
        ("timestamp", TimestampSource::Timestamp),
        ("received_at", TimestampSource::ReceivedAt),
    ];
    for (key, source) in candidates {
        if let Some(raw) = payload.get(key).and_then(|v| v.as_str()) {
            if let Some(parsed) = parse_timestamp(raw) {
                return (parsed, source);
            }
        }
    }
    (Utc::now(), TimestampSource::Fallback)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Naive ISO timestamps (no offset) are treated as UTC.
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_updated_at() {
        let payload = serde_json::json!({
            "updated_at": "2026-07-30T14:00:00Z",
            "received_at": "2026-07-30T15:00:00Z",
        });
        let (ts, source) = extract_source_timestamp(&payload);
        assert_eq!(source, TimestampSource::UpdatedAt);
        assert_eq!(ts.to_rfc3339(), "2026-07-30T14:00:00+00:00");
    }

    #[test]
    fn test_falls_back_to_wall_clock() {
        let payload = serde_json::json!({"pcr": 0.84});
        let (_, source) = extract_source_timestamp(&payload);
        assert_eq!(source, TimestampSource::Fallback);
    }

    #[test]
    fn test_parses_naive_timestamps() {
        let parsed = parse_timestamp("2026-07-30T09:45:00.123456").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-07-30T09:45:00.123456+00:00");
    }
}
