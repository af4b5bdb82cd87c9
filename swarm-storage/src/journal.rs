//! Per-agent journals.
//!
//! Each agent owns one JSON file, `swarm-agent-<safe id>.json`, in the
//! workspace root and is its only writer, so journal writes take no lock.
//! Readers treat unreadable or malformed journals as absent.

use crate::fs::{read_optional, remove_if_exists, write_json};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use swarm_core::{
    format_timestamp, now, parse_timestamp, AgentSpec, AgentStatus, FileClaim, HandoffNote,
    Issue, SwarmError, SwarmResult, Timestamp,
};

const FILE_PREFIX: &str = "swarm-agent-";
const FILE_SUFFIX: &str = ".json";

/// One agent's private progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    #[serde(default)]
    pub session_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub scope: String,
    /// Free-text detail attached to the latest status change.
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub file_claims: Vec<FileClaim>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    /// Concatenated notes, one `[timestamp] text` line each.
    #[serde(default)]
    pub handoff_notes: String,
    #[serde(default)]
    pub last_updated: String,
}

impl JournalRecord {
    /// Fresh record: Pending, no claims, issues or notes.
    pub fn new(agent_id: &str, role: &str, phase: &str, session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            role: role.to_string(),
            model: String::new(),
            scope: String::new(),
            detail: String::new(),
            status: AgentStatus::Pending,
            phase: phase.to_string(),
            file_claims: Vec::new(),
            issues: Vec::new(),
            handoff_notes: String::new(),
            last_updated: format_timestamp(&now()),
        }
    }

    pub fn from_spec(spec: &AgentSpec, session_id: &str) -> Self {
        let mut record = Self::new(&spec.agent_id, &spec.role, &spec.phase, session_id);
        record.model = spec.model.clone();
        record.scope = spec.scope.clone();
        record
    }

    pub fn claim(&self, file: &str) -> Option<&FileClaim> {
        self.file_claims.iter().find(|c| c.file == file)
    }

    pub fn claim_mut(&mut self, file: &str) -> Option<&mut FileClaim> {
        self.file_claims.iter_mut().find(|c| c.file == file)
    }

    pub fn active_claim(&self, file: &str) -> Option<&FileClaim> {
        self.file_claims
            .iter()
            .find(|c| c.file == file && c.status.is_active())
    }

    pub fn active_claims(&self) -> impl Iterator<Item = &FileClaim> {
        self.file_claims.iter().filter(|c| c.status.is_active())
    }

    /// Append a note line.
    pub fn append_note(&mut self, note: &HandoffNote) {
        if !self.handoff_notes.is_empty() && !self.handoff_notes.ends_with('\n') {
            self.handoff_notes.push('\n');
        }
        self.handoff_notes.push_str(&note.to_journal_line());
    }

    /// Parsed notes, attributed to this agent.
    pub fn notes(&self) -> Vec<HandoffNote> {
        let fallback = parse_timestamp(&self.last_updated).unwrap_or_else(Timestamp::default);
        HandoffNote::parse_journal(&self.agent_id, &self.handoff_notes, fallback)
    }

    /// Record an issue unless one with the same description and reporter
    /// is already there. Returns whether it was added.
    pub fn add_issue(&mut self, issue: Issue) -> bool {
        if self.issues.iter().any(|i| i.dedup_key() == issue.dedup_key()) {
            return false;
        }
        self.issues.push(issue);
        true
    }
}

/// File-per-agent journal storage rooted at the workspace.
#[derive(Debug, Clone)]
pub struct JournalStore {
    root: PathBuf,
}

impl JournalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, agent_id: &str) -> PathBuf {
        self.root
            .join(format!("{}{}{}", FILE_PREFIX, safe_id(agent_id), FILE_SUFFIX))
    }

    /// The agent's record, or `None` when missing or unreadable.
    pub fn read(&self, agent_id: &str) -> Option<JournalRecord> {
        read_record(&self.path_for(agent_id)).filter(|r| r.agent_id == agent_id)
    }

    pub fn exists(&self, agent_id: &str) -> bool {
        self.read(agent_id).is_some()
    }

    /// Rewrite the record atomically and refresh `last_updated`.
    pub fn write(&self, record: &mut JournalRecord) -> SwarmResult<()> {
        if record.agent_id.trim().is_empty() {
            return Err(SwarmError::invalid("agent_id", "must not be empty"));
        }
        record.last_updated = format_timestamp(&now());
        write_json(&self.path_for(&record.agent_id), record)?;
        tracing::debug!(agent = %record.agent_id, status = %record.status, "Journal written");
        Ok(())
    }

    /// Create and persist a default record.
    pub fn create(
        &self,
        agent_id: &str,
        role: &str,
        phase: &str,
        session_id: &str,
    ) -> SwarmResult<JournalRecord> {
        let mut record = JournalRecord::new(agent_id, role, phase, session_id);
        self.write(&mut record)?;
        Ok(record)
    }

    /// Every readable journal, optionally restricted to one session, sorted
    /// by agent id.
    pub fn read_all(&self, session_id: Option<&str>) -> Vec<JournalRecord> {
        let mut records: Vec<JournalRecord> = self
            .journal_paths()
            .iter()
            .filter_map(|path| read_record(path))
            .filter(|r| session_id.map_or(true, |s| r.session_id == s))
            .collect();
        records.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        records
    }

    /// Delete every journal. Returns how many were removed.
    pub fn cleanup_all(&self) -> SwarmResult<usize> {
        let mut removed = 0;
        for path in self.journal_paths() {
            if remove_if_exists(&path)? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(count = removed, "Removed agent journals");
        }
        Ok(removed)
    }

    fn journal_paths(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .filter(|e| {
                let name = e.file_name();
                let name = name.to_string_lossy();
                name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX)
            })
            .map(|e| e.path())
            .collect()
    }
}

fn read_record(path: &Path) -> Option<JournalRecord> {
    let text = match read_optional(path) {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Unreadable journal skipped");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Malformed journal skipped");
            None
        }
    }
}

/// File-name-safe form of an agent id.
///
/// `[A-Za-z0-9_-]` is kept; every other character becomes `.` followed by
/// the lowercase hex of its UTF-8 bytes. Distinct ids map to distinct names.
pub fn safe_id(agent_id: &str) -> String {
    let mut out = String::with_capacity(agent_id.len());
    for c in agent_id.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            out.push('.');
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("{:02x}", byte));
            }
        }
    }
    out
}
