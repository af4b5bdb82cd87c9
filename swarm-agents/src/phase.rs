//! Phase gates.
//!
//! A gate is `NotStarted` until every agent assigned to its phase satisfies
//! it, then `Ready`, then `Checked` once ticked (by rollup or by hand).
//! Statuses come from the session's journals when present, else from the
//! Agents table.

use crate::rollup::RollupEngine;
use serde::Serialize;
use std::collections::HashMap;
use swarm_core::{
    normalize_phase, AgentStatus, ResourceKind, SwarmConfig, SwarmError, SwarmResult,
};
use swarm_manifest::{Manifest, PhaseState};
use swarm_storage::{JournalStore, ManifestStore};

/// One agent assigned to a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub agent_id: String,
    pub role: String,
    pub scope: String,
    /// Effective status; `None` when neither journal nor store has a
    /// readable one.
    pub status: Option<AgentStatus>,
}

impl RosterEntry {
    pub fn satisfies_gate(&self) -> bool {
        self.status.as_ref().is_some_and(AgentStatus::satisfies_gate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub phase: String,
    pub state: PhaseState,
    /// Checklist label, `None` when the phase has no gate.
    pub gate: Option<String>,
    pub roster: Vec<RosterEntry>,
    /// Roster members that do not yet satisfy the gate.
    pub outstanding: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PhaseGates {
    store: ManifestStore,
    journals: JournalStore,
}

impl PhaseGates {
    pub fn new(config: &SwarmConfig) -> Self {
        Self {
            store: ManifestStore::new(config),
            journals: JournalStore::new(&config.workspace_root),
        }
    }

    pub fn check_phase(&self, phase: &str) -> SwarmResult<PhaseReport> {
        let manifest = self.store.read()?;
        Ok(self.report(&manifest, phase))
    }

    /// Manual override: tick or untick a gate from any state. Returns
    /// whether the store changed.
    pub fn set_gate(&self, phase: &str, checked: bool) -> SwarmResult<bool> {
        let update = self.store.update(|m| {
            m.set_gate(phase, checked)?;
            Ok(())
        })?;
        tracing::info!(phase = %normalize_phase(phase), checked, changed = update.changed, "Gate set");
        Ok(update.changed)
    }

    /// Close `from` and hand over to `to`.
    ///
    /// Fails with `PhaseNotComplete` and changes nothing while any agent of
    /// `from` is outstanding. Otherwise rolls up, checks the `from` gate and
    /// returns the roster of `to`.
    pub fn advance(&self, from: &str, to: &str, rollup: &RollupEngine) -> SwarmResult<Vec<RosterEntry>> {
        let report = self.check_phase(from)?;
        if report.roster.is_empty() {
            return Err(SwarmError::not_found(ResourceKind::Phase, report.phase));
        }
        if !report.outstanding.is_empty() {
            tracing::info!(phase = %report.phase, outstanding = ?report.outstanding, "Advance refused");
            return Err(SwarmError::PhaseNotComplete {
                phase: report.phase,
                outstanding: report.outstanding,
            });
        }

        rollup.run(&format!("Phase {} complete", report.phase))?;
        self.store.update(|m| self.close_gate(m, from))?;

        let next = self.check_phase(to)?;
        tracing::info!(from = %report.phase, to = %next.phase, agents = next.roster.len(), "Phase advanced");
        Ok(next.roster)
    }

    /// Tick the gate of `phase` after re-checking its roster against the
    /// manifest held under the store lock. A journal can change between the
    /// first check and the lock.
    fn close_gate(&self, manifest: &mut Manifest, phase: &str) -> SwarmResult<()> {
        let report = self.report(manifest, phase);
        if !report.outstanding.is_empty() {
            tracing::info!(phase = %report.phase, outstanding = ?report.outstanding, "Advance refused under lock");
            return Err(SwarmError::PhaseNotComplete {
                phase: report.phase,
                outstanding: report.outstanding,
            });
        }
        manifest.ensure_gate(phase)?;
        manifest.set_gate(phase, true)?;
        Ok(())
    }

    fn report(&self, manifest: &Manifest, phase: &str) -> PhaseReport {
        let session = manifest.session_id();
        let journal_status: HashMap<String, AgentStatus> = self
            .journals
            .read_all(session.as_deref())
            .into_iter()
            .map(|j| (j.agent_id, j.status))
            .collect();

        let roster: Vec<RosterEntry> = manifest
            .agents_in_phase(phase)
            .into_iter()
            .map(|row| RosterEntry {
                status: journal_status.get(&row.id).cloned().or_else(|| row.status()),
                agent_id: row.id,
                role: row.role,
                scope: row.scope,
            })
            .collect();

        let gate = manifest.gate(phase);
        let state = PhaseState::evaluate(
            gate.as_ref().is_some_and(|g| g.checked),
            roster.iter().map(|e| e.status.as_ref()),
        );
        PhaseReport {
            phase: normalize_phase(phase),
            state,
            gate: gate.map(|g| g.label),
            outstanding: roster
                .iter()
                .filter(|e| !e.satisfies_gate())
                .map(|e| e.agent_id.clone())
                .collect(),
            roster,
        }
    }
}
