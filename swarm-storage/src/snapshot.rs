//! Derived status snapshot, `swarm_status.json`.
//!
//! The snapshot is advisory: it is rebuilt from the canonical store after
//! each change and a failed write never fails the change itself.

use crate::fs::{read_json, write_json};
use serde::{Deserialize, Serialize};
use std::path::Path;
use swarm_core::{content_digest, format_timestamp, now, AgentStatus, SupervisionMode};
use swarm_manifest::{Manifest, PhaseState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub supervision: String,
    pub agents_active: u32,
    pub agents_complete: u32,
    pub agents_pending: u32,
    pub agents_blocked: u32,
    pub agents_failed: u32,
    pub agents_total: u32,
    /// Lowest phase whose gate is unchecked.
    pub current_phase: Option<String>,
    pub phase_ready: bool,
    pub needs_user_action: bool,
    pub last_event: String,
    pub manifest_digest: String,
    pub timestamp: String,
}

impl StatusSnapshot {
    pub fn from_manifest(manifest: &Manifest, last_event: &str) -> Self {
        let agents = manifest.agents();
        let statuses: Vec<Option<AgentStatus>> = agents.iter().map(|a| a.status()).collect();
        let count = |pred: fn(&AgentStatus) -> bool| {
            statuses.iter().flatten().filter(|s| pred(s)).count() as u32
        };

        let current = manifest.current_phase();
        let phase_ready = current.as_ref().is_some_and(|gate| {
            let roster = manifest.agents_in_phase(&gate.phase);
            let roster_statuses: Vec<Option<AgentStatus>> = roster.iter().map(|a| a.status()).collect();
            PhaseState::evaluate(gate.checked, roster_statuses.iter().map(Option::as_ref))
                == PhaseState::Ready
        });
        let any_blocked = count(|s| matches!(s, AgentStatus::Blocked)) > 0;
        let supervision = manifest.supervision();

        Self {
            supervision: supervision.to_string(),
            agents_active: count(|s| matches!(s, AgentStatus::Active)),
            agents_complete: count(AgentStatus::is_success),
            agents_pending: count(|s| matches!(s, AgentStatus::Pending)),
            agents_blocked: count(|s| matches!(s, AgentStatus::Blocked)),
            agents_failed: count(|s| matches!(s, AgentStatus::Failed)),
            agents_total: agents.len() as u32,
            current_phase: current.map(|g| g.phase),
            phase_ready,
            needs_user_action: needs_user_action(supervision, phase_ready, any_blocked),
            last_event: last_event.to_string(),
            manifest_digest: content_digest(manifest.render().as_bytes()),
            timestamp: format_timestamp(&now()),
        }
    }
}

/// Whether the user must act before the swarm can continue.
///
/// | Mode  | Needs action when                       |
/// |-------|-----------------------------------------|
/// | Auto  | never                                   |
/// | Gates | the current phase is ready              |
/// | Full  | the current phase is ready or a blocker |
pub fn needs_user_action(mode: SupervisionMode, phase_ready: bool, any_blocked: bool) -> bool {
    match mode {
        SupervisionMode::Auto => false,
        SupervisionMode::Gates => phase_ready,
        SupervisionMode::Full => phase_ready || any_blocked,
    }
}

/// Write the snapshot, logging instead of failing.
pub fn write_snapshot(path: &Path, snapshot: &StatusSnapshot) {
    if let Err(e) = write_json(path, snapshot) {
        tracing::warn!(path = %path.display(), error = %e, "Status snapshot write failed");
    }
}

pub fn read_snapshot(path: &Path) -> Option<StatusSnapshot> {
    read_json(path).ok().flatten()
}
