//! Quota Ledger
//!
//! In-memory record of admitted reservations, keyed by model and resource.
//! Entries expire lazily: nothing is dropped until the next `expire` call
//! for that key.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::model::ModelName;

/// Length of the rolling quota window in seconds
pub const WINDOW_SECS: i64 = 60;

/// Length of the rolling quota window
pub fn window() -> Duration {
    Duration::seconds(WINDOW_SECS)
}

/// One admitted reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionEvent {
    /// Resource the tokens were reserved on
    pub resource: String,

    /// Raw tokens reserved
    pub tokens: u64,

    /// Admission time
    pub timestamp: DateTime<Utc>,
}

impl ConsumptionEvent {
    /// Instant at which this reservation stops counting against its resource
    pub fn released_at(&self) -> DateTime<Utc> {
        self.timestamp + window()
    }
}

type LedgerKey = (ModelName, String);

/// Per-(model, resource) consumption history
#[derive(Debug, Default)]
pub struct QuotaLedger {
    entries: HashMap<LedgerKey, Vec<ConsumptionEvent>>,
}

impl QuotaLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every event for the key that is at least one window old
    pub fn expire(&mut self, model: ModelName, resource: &str, now: DateTime<Utc>) {
        let cutoff = now - window();
        if let Some(events) = self.entries.get_mut(&(model, resource.to_string())) {
            events.retain(|e| e.timestamp > cutoff);
        }
    }

    /// Sum of retained tokens for the key
    pub fn used_tokens(&self, model: ModelName, resource: &str) -> u64 {
        self.events(model, resource).iter().map(|e| e.tokens).sum()
    }

    /// Append a reservation. Capacity must already have been checked.
    pub fn record(&mut self, model: ModelName, resource: &str, tokens: u64, now: DateTime<Utc>) {
        self.entries
            .entry((model, resource.to_string()))
            .or_default()
            .push(ConsumptionEvent {
                resource: resource.to_string(),
                tokens,
                timestamp: now,
            });
    }

    /// Retained events for the key, in insertion order
    pub fn events(&self, model: ModelName, resource: &str) -> &[ConsumptionEvent] {
        self.entries
            .get(&(model, resource.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of keys with any history
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no reservation has ever been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const MODEL: ModelName = ModelName::Embedding3Small;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_ledger() {
        let ledger = QuotaLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.used_tokens(MODEL, "east"), 0);
        assert!(ledger.events(MODEL, "east").is_empty());
    }

    #[test]
    fn test_record_and_sum() {
        let mut ledger = QuotaLedger::new();
        ledger.record(MODEL, "east", 3000, t0());
        ledger.record(MODEL, "east", 4000, t0() + Duration::seconds(5));
        ledger.record(MODEL, "west", 1000, t0());

        assert_eq!(ledger.used_tokens(MODEL, "east"), 7000);
        assert_eq!(ledger.used_tokens(MODEL, "west"), 1000);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_keys_are_per_model() {
        let mut ledger = QuotaLedger::new();
        ledger.record(ModelName::Embedding3Small, "east", 3000, t0());
        assert_eq!(ledger.used_tokens(ModelName::Embedding3Large, "east"), 0);
    }

    #[test]
    fn test_event_counts_for_exactly_one_window() {
        let mut ledger = QuotaLedger::new();
        ledger.record(MODEL, "east", 500, t0());

        ledger.expire(MODEL, "east", t0() + Duration::seconds(59));
        assert_eq!(ledger.used_tokens(MODEL, "east"), 500);

        ledger.expire(MODEL, "east", t0() + Duration::milliseconds(59_999));
        assert_eq!(ledger.used_tokens(MODEL, "east"), 500);

        ledger.expire(MODEL, "east", t0() + Duration::seconds(60));
        assert_eq!(ledger.used_tokens(MODEL, "east"), 0);
    }

    #[test]
    fn test_expire_keeps_newer_events() {
        let mut ledger = QuotaLedger::new();
        ledger.record(MODEL, "east", 100, t0());
        ledger.record(MODEL, "east", 200, t0() + Duration::seconds(30));

        ledger.expire(MODEL, "east", t0() + Duration::seconds(75));
        let events = ledger.events(MODEL, "east");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tokens, 200);
    }

    #[test]
    fn test_expire_unknown_key_is_noop() {
        let mut ledger = QuotaLedger::new();
        ledger.expire(MODEL, "nowhere", t0());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_released_at() {
        let event = ConsumptionEvent {
            resource: "east".to_string(),
            tokens: 1,
            timestamp: t0(),
        };
        assert_eq!(event.released_at(), t0() + Duration::seconds(60));
    }
}
