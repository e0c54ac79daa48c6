//! Wait-Time Estimator
//!
//! Simulates future expiries to find the earliest moment a resource that is
//! short on capacity could accept a request. Each reservation is released as
//! one lump exactly one window after it was admitted, so the answer is found
//! by walking the history in time order rather than by a closed formula.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ledger::ConsumptionEvent;

/// How long a caller has to wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WaitTime {
    /// Capacity frees up after this many whole seconds
    Seconds(u64),
    /// The resource cannot hold the request even when empty
    Never,
}

impl WaitTime {
    /// Seconds to wait, `None` when the wait is unbounded
    pub fn as_secs(&self) -> Option<u64> {
        match self {
            WaitTime::Seconds(s) => Some(*s),
            WaitTime::Never => None,
        }
    }

    /// Whether the wait is finite
    pub fn is_finite(&self) -> bool {
        matches!(self, WaitTime::Seconds(_))
    }
}

impl fmt::Display for WaitTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitTime::Seconds(s) => write!(f, "{}s", s),
            WaitTime::Never => f.write_str("never"),
        }
    }
}

/// Estimate how long until `requested` tokens fit on a resource
///
/// `available_now` is the capacity left after subtracting every event in
/// `events`. The events need not be sorted.
pub fn estimate_wait(
    events: &[ConsumptionEvent],
    requested: u64,
    available_now: u64,
    now: DateTime<Utc>,
) -> WaitTime {
    let mut sorted: Vec<&ConsumptionEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.timestamp);

    let mut accumulated = available_now;
    for event in sorted {
        accumulated += event.tokens;
        if accumulated >= requested {
            // num_seconds truncates toward zero
            let secs = (event.released_at() - now).num_seconds().max(0);
            return WaitTime::Seconds(secs as u64);
        }
    }

    WaitTime::Never
}
