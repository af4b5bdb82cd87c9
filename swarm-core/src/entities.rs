//! Core entity structures

use crate::{
    flatten_text, format_timestamp, new_session_id, now, ClaimStatus, RegistryStatus,
    SupervisionMode, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One coordination run. Embedded in the canonical store and superseded, not
/// mutated, by the next initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub workspace_root: PathBuf,
    pub mission: String,
    pub supervision: SupervisionMode,
    pub created_at: Timestamp,
}

impl Session {
    /// Create a session with a fresh id.
    pub fn new(workspace_root: impl Into<PathBuf>, mission: &str, supervision: SupervisionMode) -> Self {
        Self {
            session_id: new_session_id(),
            workspace_root: workspace_root.into(),
            mission: mission.to_string(),
            supervision,
            created_at: now(),
        }
    }
}

/// A claim as recorded in an agent's own journal (the agent is implicit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileClaim {
    pub file: String,
    pub status: ClaimStatus,
}

impl FileClaim {
    pub fn active(file: &str) -> Self {
        Self {
            file: file.to_string(),
            status: ClaimStatus::Active,
        }
    }
}

/// Where a claim observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimSource {
    Journal,
    /// Recorded directly in the canonical store by an older writer.
    Store,
}

/// A claim observed on a file, with its holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub agent_id: String,
    pub file: String,
    pub status: ClaimStatus,
    pub source: ClaimSource,
}

/// A reported problem. Append-only; merges dedup on (description, reporter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: String,
    #[serde(default)]
    pub area: String,
    pub description: String,
    #[serde(default)]
    pub reporter: String,
}

impl Issue {
    /// Fields are flattened to one line each, matching what a store cell
    /// can hold.
    pub fn new(severity: &str, area: &str, description: &str, reporter: &str) -> Self {
        Self {
            severity: flatten_text(severity),
            area: flatten_text(area),
            description: flatten_text(description),
            reporter: flatten_text(reporter),
        }
    }

    /// Re-run the constructor over a record that may have been built field
    /// by field or read from a journal.
    pub fn normalized(&self) -> Self {
        Self::new(&self.severity, &self.area, &self.description, &self.reporter)
    }

    /// Identity used when merging issue lists.
    pub fn dedup_key(&self) -> (&str, &str) {
        (self.description.as_str(), self.reporter.as_str())
    }
}

/// Cross-workspace registry entry. At most one per workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub workspace: String,
    pub session_id: String,
    pub mission: String,
    pub phase: String,
    pub agents_active: u32,
    pub agents_total: u32,
    pub supervision: String,
    pub started_at: String,
    pub last_updated: String,
    pub status: RegistryStatus,
}

impl RegistryEntry {
    /// Entry for a freshly initialized session.
    pub fn for_session(session: &Session) -> Self {
        let ts = format_timestamp(&session.created_at);
        Self {
            workspace: session.workspace_root.display().to_string(),
            session_id: session.session_id.clone(),
            mission: session.mission.clone(),
            phase: String::new(),
            agents_active: 0,
            agents_total: 0,
            supervision: session.supervision.to_string(),
            started_at: ts.clone(),
            last_updated: ts,
            status: RegistryStatus::Active,
        }
    }

    /// Apply a partial update. `last_updated` is refreshed by the caller.
    pub fn apply(&mut self, update: &RegistryUpdate) {
        if let Some(phase) = &update.phase {
            self.phase = phase.clone();
        }
        if let Some(active) = update.agents_active {
            self.agents_active = active;
        }
        if let Some(total) = update.agents_total {
            self.agents_total = total;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(mission) = &update.mission {
            self.mission = mission.clone();
        }
    }
}

/// Partial update for a registry entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryUpdate {
    pub phase: Option<String>,
    pub agents_active: Option<u32>,
    pub agents_total: Option<u32>,
    pub status: Option<RegistryStatus>,
    pub mission: Option<String>,
}

/// A write to the external document mirror that failed and awaits retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMirrorWrite {
    pub agent_id: String,
    pub local_file: String,
    pub remote_page: String,
    pub remote_folder: String,
    pub failed_at: String,
    pub error: String,
    #[serde(default)]
    pub retries: u32,
}
