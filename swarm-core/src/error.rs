//! Error types for swarm coordination operations

use crate::ResourceKind;
use std::path::Path;
use thiserror::Error;

/// Master error type for every coordination operation.
///
/// Variants carry enough detail (current holder, current status, outstanding
/// agent ids) for a caller to retry, redirect, or escalate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwarmError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: ResourceKind, key: String },

    #[error("Conflict on {resource}: held by {holder} with status {status}")]
    Conflict {
        resource: String,
        holder: String,
        status: String,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("Phase {phase} is not complete, outstanding agents: {}", .outstanding.join(", "))]
    PhaseNotComplete {
        phase: String,
        outstanding: Vec<String>,
    },

    #[error("Could not acquire lock {lock} after {attempts} attempts")]
    LockTimeout { lock: String, attempts: u32 },

    #[error("I/O failure on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Malformed content in {path}: {reason}")]
    Malformed { path: String, reason: String },
}

impl SwarmError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        SwarmError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn not_found(kind: ResourceKind, key: impl Into<String>) -> Self {
        SwarmError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SwarmError::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        SwarmError::Malformed {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors a caller may resolve by retrying later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SwarmError::Conflict { .. } | SwarmError::LockTimeout { .. } | SwarmError::PhaseNotComplete { .. }
        )
    }
}

/// Result type alias for swarm operations.
pub type SwarmResult<T> = Result<T, SwarmError>;

// =============================================================================
// TESTS
// =============================================================================
