//! Swarm Core - Entity Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! identifiers, statuses, the error taxonomy, configuration and the lock
//! state model. This crate performs no filesystem I/O.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

mod agent;
mod config;
mod entities;
mod enums;
mod error;
mod event;
mod handoff;
mod lock;

pub use agent::{
    normalize_phase, validate_agent_id, AgentOverrides, AgentSpec, AgentStatus,
    AgentStatusParseError,
};
pub use config::{LockConfig, SwarmConfig};
pub use entities::{
    ClaimRecord, ClaimSource, FileClaim, Issue, PendingMirrorWrite, RegistryEntry,
    RegistryUpdate, Session,
};
pub use enums::{ClaimStatus, ClaimStatusParseError, RegistryStatus, ResourceKind, SupervisionMode};
pub use error::{SwarmError, SwarmResult};
pub use event::{Event, EventType};
pub use handoff::{HandoffNote, SYSTEM_AUTHOR};
pub use lock::{LockMarker, LockOwner, LockState};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash used for change detection and lock naming.
pub type ContentHash = [u8; 32];

/// Generate a new session id.
///
/// UUIDv7 embeds a Unix timestamp, so session ids sort by creation time.
pub fn new_session_id() -> String {
    Uuid::now_v7().to_string()
}

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Hex rendering of [`compute_content_hash`].
pub fn content_digest(content: &[u8]) -> String {
    hex::encode(compute_content_hash(content))
}

/// Render a timestamp the way every persisted record does (RFC 3339, UTC,
/// second precision).
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a timestamp written by [`format_timestamp`] (any RFC 3339 offset is
/// accepted and normalized to UTC).
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Current time truncated to whole seconds, so that values survive a
/// format/parse round trip unchanged.
pub fn now() -> Timestamp {
    let now = Utc::now();
    parse_timestamp(&format_timestamp(&now)).unwrap_or(now)
}

/// Collapse every whitespace run, line breaks included, into one space.
/// Store cells hold a single line, so text that is compared against cell
/// content goes through here first.
pub fn flatten_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased alphanumeric words of a status cell; emoji, arrows and
/// punctuation separate words.
pub(crate) fn status_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
