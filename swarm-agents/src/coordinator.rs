//! Coordinator facade.
//!
//! One method per coordination operation, each taking explicit arguments
//! over a [`SwarmConfig`]. A dispatch layer maps its requests onto these
//! calls and their typed results.

use crate::claims::ClaimManager;
use crate::lifecycle::{self, FailureReport, ReassignReport};
use crate::phase::{PhaseGates, PhaseReport, RosterEntry};
use crate::rollup::{RollupEngine, RollupReport};
use serde::Serialize;
use swarm_core::{
    now, validate_agent_id, AgentOverrides, AgentSpec, AgentStatus, ClaimRecord, ClaimStatus,
    Event, EventType, FileClaim, HandoffNote, Issue, PendingMirrorWrite, RegistryEntry,
    RegistryStatus, RegistryUpdate, ResourceKind, Session, SupervisionMode, SwarmConfig,
    SwarmError, SwarmResult,
};
use swarm_events::{EventBus, Registry};
use swarm_manifest::{AgentRow, Manifest, PhaseGate, SectionView};
use swarm_storage::{
    write_snapshot, JournalRecord, JournalStore, ManifestStore, MirrorSummary, PendingMirrorLog,
    StatusSnapshot,
};

/// Aggregate view of a running swarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwarmStatus {
    pub session_id: Option<String>,
    pub mission: Option<String>,
    pub agents: Vec<AgentRow>,
    pub gates: Vec<PhaseGate>,
    pub issues: Vec<Issue>,
    pub snapshot: StatusSnapshot,
    pub pending_mirror_writes: MirrorSummary,
}

#[derive(Debug, Clone)]
pub struct Coordinator {
    config: SwarmConfig,
    store: ManifestStore,
    journals: JournalStore,
    rollup: RollupEngine,
    gates: PhaseGates,
    registry: Registry,
    events: EventBus,
    mirror: PendingMirrorLog,
}

impl Coordinator {
    pub fn new(config: SwarmConfig) -> SwarmResult<Self> {
        config.validate()?;
        Ok(Self {
            store: ManifestStore::new(&config),
            journals: JournalStore::new(&config.workspace_root),
            rollup: RollupEngine::new(&config),
            gates: PhaseGates::new(&config),
            registry: Registry::new(&config),
            events: EventBus::new(&config),
            mirror: PendingMirrorLog::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn workspace(&self) -> String {
        self.config.workspace_root.display().to_string()
    }

    /// Session id embedded in the canonical store.
    pub fn session_id(&self) -> SwarmResult<String> {
        self.store.read()?.session_id().ok_or_else(|| {
            SwarmError::malformed(self.store.path(), "missing session marker")
        })
    }

    // ========================================================================
    // SESSION
    // ========================================================================

    /// Start a new session: drop every journal, write a fresh store and
    /// register the workspace.
    pub fn init_session(&self, mission: &str, supervision: SupervisionMode) -> SwarmResult<Session> {
        let removed = self.journals.cleanup_all()?;
        let session = Session::new(&self.config.workspace_root, mission, supervision);
        let manifest = Manifest::template(&session);
        self.store.lock().with_lock(|| self.store.write(&manifest))?;
        write_snapshot(
            &self.config.status_path(),
            &StatusSnapshot::from_manifest(&manifest, "Swarm initialized"),
        );
        self.registry.register(RegistryEntry::for_session(&session))?;
        tracing::info!(
            session = %session.session_id,
            supervision = %supervision,
            journals_removed = removed,
            "Session initialized"
        );
        Ok(session)
    }

    /// Final rollup, then mark the registry entry and clear the mirror log.
    pub fn complete_session(&self, status: RegistryStatus) -> SwarmResult<RollupReport> {
        let report = self.rollup.run("Session completed")?;
        let pending = self.mirror.summary();
        if pending.total > 0 {
            tracing::warn!(pending = pending.total, "Session completed with unsynced mirror writes");
        }
        self.mirror.clear()?;
        self.registry.update(
            &self.workspace(),
            &RegistryUpdate {
                status: Some(status),
                ..Default::default()
            },
        )?;
        tracing::info!(status = ?status, "Session completed");
        Ok(report)
    }

    // ========================================================================
    // AGENTS
    // ========================================================================

    /// Add an agent row, its phase gate and its journal.
    pub fn register_agent(&self, spec: &AgentSpec) -> SwarmResult<JournalRecord> {
        validate_agent_id(&spec.agent_id)?;
        let session_id = self.session_id()?;
        self.store.update(|m| {
            if let Some(existing) = m.agent(&spec.agent_id) {
                return Err(SwarmError::Conflict {
                    resource: format!("agent {}", spec.agent_id),
                    holder: spec.agent_id.clone(),
                    status: existing.status_text,
                });
            }
            m.add_agent(spec, &AgentStatus::Pending)?;
            m.ensure_gate(&spec.phase)?;
            Ok(())
        })?;

        let mut journal = JournalRecord::from_spec(spec, &session_id);
        self.journals.write(&mut journal)?;
        tracing::info!(agent = %spec.agent_id, role = %spec.role, phase = %spec.phase, "Agent registered");
        self.after_change(&format!("Agent {} registered", spec.agent_id));
        Ok(journal)
    }

    /// Record a status change in the agent's journal.
    pub fn update_status(&self, agent_id: &str, status: AgentStatus, detail: &str) -> SwarmResult<JournalRecord> {
        let mut journal = self.own_journal(agent_id)?;
        journal.status = status;
        journal.detail = detail.to_string();
        self.journals.write(&mut journal)?;
        tracing::info!(agent = %agent_id, status = %journal.status, "Agent status updated");
        Ok(journal)
    }

    /// Record an issue in the reporter's journal. Returns false for a
    /// duplicate.
    pub fn report_issue(&self, agent_id: &str, issue: Issue) -> SwarmResult<bool> {
        let mut issue = issue.normalized();
        if issue.description.is_empty() {
            return Err(SwarmError::invalid("description", "must not be empty"));
        }
        if issue.reporter.is_empty() {
            issue.reporter = agent_id.to_string();
        }
        let mut journal = self.own_journal(agent_id)?;
        let added = journal.add_issue(issue);
        if added {
            self.journals.write(&mut journal)?;
        }
        Ok(added)
    }

    pub fn add_note(&self, agent_id: &str, text: &str) -> SwarmResult<HandoffNote> {
        if text.trim().is_empty() {
            return Err(SwarmError::invalid("text", "must not be empty"));
        }
        let mut journal = self.own_journal(agent_id)?;
        let note = HandoffNote::new(now(), agent_id, text);
        journal.append_note(&note);
        self.journals.write(&mut journal)?;
        Ok(note)
    }

    pub fn mark_failed(&self, agent_id: &str, reason: &str) -> SwarmResult<FailureReport> {
        let report = lifecycle::mark_failed(&self.journals, &self.session_id()?, agent_id, reason)?;
        self.after_change(&format!("Agent {} failed", agent_id));
        Ok(report)
    }

    pub fn reassign(
        &self,
        source_id: &str,
        new_agent_id: &str,
        overrides: &AgentOverrides,
    ) -> SwarmResult<ReassignReport> {
        let report = lifecycle::reassign(
            &self.store,
            &self.journals,
            &self.session_id()?,
            source_id,
            new_agent_id,
            overrides,
        )?;
        self.after_change(&format!("Agent {} reassigned to {}", source_id, new_agent_id));
        Ok(report)
    }

    // ========================================================================
    // FILE CLAIMS
    // ========================================================================

    fn claims(&self) -> SwarmResult<ClaimManager> {
        Ok(ClaimManager::new(&self.config, &self.session_id()?))
    }

    pub fn claim_file(&self, agent_id: &str, file: &str) -> SwarmResult<FileClaim> {
        self.claims()?.claim(agent_id, file)
    }

    pub fn release_file(&self, agent_id: &str, file: &str, status: ClaimStatus) -> SwarmResult<FileClaim> {
        self.claims()?.release(agent_id, file, status)
    }

    pub fn check_file(&self, file: &str) -> SwarmResult<Vec<ClaimRecord>> {
        Ok(self.claims()?.check(file))
    }

    // ========================================================================
    // ROLLUP AND PHASES
    // ========================================================================

    pub fn rollup(&self) -> SwarmResult<RollupReport> {
        let report = self.rollup.run("Rollup")?;
        self.sync_registry();
        Ok(report)
    }

    pub fn check_phase(&self, phase: &str) -> SwarmResult<PhaseReport> {
        self.gates.check_phase(phase)
    }

    pub fn set_gate(&self, phase: &str, checked: bool) -> SwarmResult<bool> {
        let changed = self.gates.set_gate(phase, checked)?;
        self.after_change(&format!("Gate {} set to {}", phase, checked));
        Ok(changed)
    }

    /// Close `from` and return the roster of `to`. Pending mirror writes
    /// are reported at each gate.
    pub fn advance(&self, from: &str, to: &str) -> SwarmResult<Vec<RosterEntry>> {
        let roster = self.gates.advance(from, to, &self.rollup)?;
        let pending = self.mirror.summary();
        if pending.total > 0 {
            tracing::warn!(pending = pending.total, by_agent = ?pending.by_agent, "Mirror writes awaiting retry");
        }
        self.sync_registry();
        Ok(roster)
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn read_section(&self, name: &str) -> SwarmResult<SectionView> {
        self.store
            .read()?
            .section(name)
            .ok_or_else(|| SwarmError::not_found(ResourceKind::Section, name))
    }

    pub fn status(&self) -> SwarmResult<SwarmStatus> {
        let manifest = self.store.read()?;
        let last_event = self
            .events(None)
            .ok()
            .and_then(|events| events.last().map(|e| e.message.clone()))
            .unwrap_or_default();
        Ok(SwarmStatus {
            session_id: manifest.session_id(),
            mission: manifest.mission(),
            agents: manifest.agents(),
            gates: manifest.phase_gates(),
            issues: manifest.issues(),
            snapshot: StatusSnapshot::from_manifest(&manifest, &last_event),
            pending_mirror_writes: self.mirror.summary(),
        })
    }

    // ========================================================================
    // EVENTS AND MIRROR LOG
    // ========================================================================

    pub fn broadcast(&self, agent_id: &str, event_type: EventType, message: &str) -> SwarmResult<Event> {
        let event = Event::new(&self.workspace(), &self.session_id()?, agent_id, event_type, message);
        self.events.broadcast(&event)?;
        Ok(event)
    }

    pub fn events(&self, filter: Option<&EventType>) -> SwarmResult<Vec<Event>> {
        Ok(self.events.events(&self.workspace(), &self.session_id()?, filter))
    }

    /// Delete this session's event log.
    pub fn cleanup_events(&self) -> SwarmResult<bool> {
        self.events.cleanup(&self.workspace(), &self.session_id()?)
    }

    pub fn record_mirror_failure(&self, entry: PendingMirrorWrite) -> SwarmResult<()> {
        self.mirror.append(entry)
    }

    pub fn resolve_mirror_write(&self, local_file: &str) -> SwarmResult<bool> {
        self.mirror.resolve(local_file)
    }

    pub fn mirror_summary(&self) -> MirrorSummary {
        self.mirror.summary()
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn own_journal(&self, agent_id: &str) -> SwarmResult<JournalRecord> {
        let session_id = self.session_id()?;
        self.journals
            .read(agent_id)
            .filter(|j| j.session_id == session_id)
            .ok_or_else(|| SwarmError::not_found(ResourceKind::Agent, agent_id))
    }

    /// Refresh the snapshot and registry after a store change. Both are
    /// advisory.
    fn after_change(&self, event: &str) {
        match self.store.read() {
            Ok(manifest) => write_snapshot(
                &self.config.status_path(),
                &StatusSnapshot::from_manifest(&manifest, event),
            ),
            Err(e) => tracing::warn!(error = %e, "Snapshot skipped"),
        }
        self.sync_registry();
    }

    fn sync_registry(&self) {
        let Ok(manifest) = self.store.read() else {
            return;
        };
        let snapshot = StatusSnapshot::from_manifest(&manifest, "");
        let update = RegistryUpdate {
            phase: snapshot.current_phase,
            agents_active: Some(snapshot.agents_active),
            agents_total: Some(snapshot.agents_total),
            ..Default::default()
        };
        if let Err(e) = self.registry.update(&self.workspace(), &update) {
            tracing::warn!(error = %e, "Registry sync skipped");
        }
    }
}
