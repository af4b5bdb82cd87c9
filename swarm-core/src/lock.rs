//! Lock state model for crash-only mutual exclusion.
//!
//! A lock is a marker resource that either does not exist or records who
//! created it and when:
//!
//! ```text
//!   Free ─── create-if-absent ──→ Held(owner, since) ─── release ──→ Free
//!                                        │
//!                        age > stale_after: force break ──→ Free
//! ```
//!
//! Staleness is recovery from a crashed holder, not a heartbeat-verified
//! lease: a holder that is merely slow can be broken, leaving a short window
//! with two holders. This is accepted for a single trusted host.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identity of a lock holder, recorded for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    /// Free-form label, typically the agent id or operation name.
    pub label: String,
}

impl LockOwner {
    /// Owner describing the current process.
    pub fn current(label: &str) -> Self {
        Self {
            pid: std::process::id(),
            label: label.to_string(),
        }
    }
}

/// Content written into a marker when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMarker {
    pub owner: LockOwner,
    pub acquired_at: Timestamp,
}

/// Observed state of a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Free,
    Held {
        /// `None` when the marker content could not be read (e.g. written by
        /// an older version or truncated by a crash).
        owner: Option<LockOwner>,
        /// Last modification time of the marker.
        since: Timestamp,
    },
}

impl LockState {
    pub fn is_free(&self) -> bool {
        matches!(self, LockState::Free)
    }

    /// Age of the marker; `None` when free. Clock skew clamps to zero.
    pub fn age(&self, now: Timestamp) -> Option<Duration> {
        match self {
            LockState::Free => None,
            LockState::Held { since, .. } => Some((now - *since).to_std().unwrap_or(Duration::ZERO)),
        }
    }

    /// Strictly older than the threshold.
    pub fn is_stale(&self, now: Timestamp, stale_after: Duration) -> bool {
        self.age(now).is_some_and(|age| age > stale_after)
    }

    pub fn owner(&self) -> Option<&LockOwner> {
        match self {
            LockState::Free => None,
            LockState::Held { owner, .. } => owner.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_free_is_never_stale() {
        assert!(!LockState::Free.is_stale(Utc::now(), Duration::ZERO));
        assert!(LockState::Free.age(Utc::now()).is_none());
    }

    #[test]
    fn test_held_staleness_threshold() {
        let now = Utc::now();
        let state = LockState::Held {
            owner: Some(LockOwner::current("α")),
            since: now - chrono::Duration::seconds(31),
        };
        assert!(state.is_stale(now, Duration::from_secs(30)));
        assert!(!state.is_stale(now, Duration::from_secs(60)));
        assert_eq!(state.owner().map(|o| o.label.as_str()), Some("α"));
    }

    #[test]
    fn test_future_marker_has_zero_age() {
        let now = Utc::now();
        let state = LockState::Held {
            owner: None,
            since: now + chrono::Duration::seconds(5),
        };
        assert_eq!(state.age(now), Some(Duration::ZERO));
        assert!(!state.is_stale(now, Duration::from_millis(1)));
    }

    #[test]
    fn test_marker_json_roundtrip() {
        let marker = LockMarker {
            owner: LockOwner::current("rollup"),
            acquired_at: crate::now(),
        };
        let json = serde_json::to_string(&marker).unwrap();
        let back: LockMarker = serde_json::from_str(&json).unwrap();
        assert_eq!(back, marker);
    }
}
