//! Agent failure and reassignment.

use serde::Serialize;
use swarm_core::{
    now, validate_agent_id, AgentOverrides, AgentSpec, AgentStatus, ClaimStatus, FileClaim,
    HandoffNote, ResourceKind, SwarmError, SwarmResult, SYSTEM_AUTHOR,
};
use swarm_storage::{JournalRecord, JournalStore, ManifestStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub agent_id: String,
    /// Files whose Active claims became Abandoned.
    pub abandoned: Vec<String>,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReassignReport {
    pub source: String,
    pub target: AgentSpec,
    /// Files copied to the target as Transferred claims.
    pub transferred: Vec<String>,
}

fn session_journal(journals: &JournalStore, session_id: &str, agent_id: &str) -> SwarmResult<JournalRecord> {
    journals
        .read(agent_id)
        .filter(|j| j.session_id == session_id)
        .ok_or_else(|| SwarmError::not_found(ResourceKind::Agent, agent_id))
}

fn file_list(files: &[String]) -> String {
    if files.is_empty() {
        "none".to_string()
    } else {
        files.join(", ")
    }
}

/// Mark an agent Failed and abandon its Active claims, leaving one system
/// note that lists the released files. Journal only; the next rollup
/// carries it into the store.
pub fn mark_failed(
    journals: &JournalStore,
    session_id: &str,
    agent_id: &str,
    reason: &str,
) -> SwarmResult<FailureReport> {
    let mut journal = session_journal(journals, session_id, agent_id)?;

    let mut abandoned = Vec::new();
    for claim in journal.file_claims.iter_mut().filter(|c| c.status.is_active()) {
        claim.status = ClaimStatus::Abandoned;
        abandoned.push(claim.file.clone());
    }

    let reason = reason.trim();
    let note = HandoffNote::new(
        now(),
        SYSTEM_AUTHOR,
        &format!(
            "{} marked Failed{}. Released files: {}",
            agent_id,
            if reason.is_empty() { String::new() } else { format!(" ({})", reason) },
            file_list(&abandoned)
        ),
    );
    journal.status = AgentStatus::Failed;
    journal.detail = reason.to_string();
    journal.append_note(&note);
    journals.write(&mut journal)?;

    tracing::info!(agent = %agent_id, released = abandoned.len(), "Agent marked failed");
    Ok(FailureReport {
        agent_id: agent_id.to_string(),
        abandoned,
        note: note.text,
    })
}

/// Hand `source`'s unfinished scope to a new agent `target_id`.
///
/// The target inherits role, model, phase and scope unless overridden,
/// starts Pending, and receives every non-Done claim of the source as
/// Transferred. The source ends `Reassigned → target` with its Active
/// claims Transferred. Both journals get a linked system note.
pub fn reassign(
    store: &ManifestStore,
    journals: &JournalStore,
    session_id: &str,
    source_id: &str,
    target_id: &str,
    overrides: &AgentOverrides,
) -> SwarmResult<ReassignReport> {
    let target_id = validate_agent_id(target_id.trim())?;
    if target_id == source_id {
        return Err(SwarmError::invalid("new_agent_id", "must differ from the source agent"));
    }
    let mut source = session_journal(journals, session_id, source_id)?;
    if journals.read(target_id).is_some_and(|j| j.session_id == session_id) {
        return Err(SwarmError::Conflict {
            resource: format!("agent {}", target_id),
            holder: target_id.to_string(),
            status: "registered".to_string(),
        });
    }

    let row = store.read()?.agent(source_id);
    let inherited = |own: &str, from_row: Option<&str>| -> String {
        if own.is_empty() {
            from_row.unwrap_or_default().to_string()
        } else {
            own.to_string()
        }
    };
    let spec = AgentSpec {
        agent_id: target_id.to_string(),
        role: overrides
            .role
            .clone()
            .unwrap_or_else(|| inherited(&source.role, row.as_ref().map(|r| r.role.as_str()))),
        model: overrides
            .model
            .clone()
            .unwrap_or_else(|| inherited(&source.model, row.as_ref().map(|r| r.model.as_str()))),
        phase: overrides
            .phase
            .clone()
            .unwrap_or_else(|| inherited(&source.phase, row.as_ref().map(|r| r.phase.as_str()))),
        scope: overrides
            .scope
            .clone()
            .unwrap_or_else(|| inherited(&source.scope, row.as_ref().map(|r| r.scope.as_str()))),
    };

    let new_status = AgentStatus::Reassigned(target_id.to_string());
    store.update(|m| {
        if let Some(existing) = m.agent(target_id) {
            return Err(SwarmError::Conflict {
                resource: format!("agent {}", target_id),
                holder: target_id.to_string(),
                status: existing.status_text,
            });
        }
        m.add_agent(&spec, &AgentStatus::Pending)?;
        m.apply_agent_statuses([(source_id, &new_status)])?;
        m.ensure_gate(&spec.phase)?;
        Ok(())
    })?;

    let mut transferred = Vec::new();
    for claim in source
        .file_claims
        .iter_mut()
        .filter(|c| c.status != ClaimStatus::Done)
    {
        if claim.status.is_active() {
            claim.status = ClaimStatus::Transferred;
        }
        transferred.push(claim.file.clone());
    }

    let ts = now();
    let files = file_list(&transferred);
    let mut target = JournalRecord::from_spec(&spec, session_id);
    target.file_claims = transferred
        .iter()
        .map(|file| FileClaim {
            file: file.clone(),
            status: ClaimStatus::Transferred,
        })
        .collect();
    target.append_note(&HandoffNote::new(
        ts,
        SYSTEM_AUTHOR,
        &format!("{} took over from {}. Transferred files: {}", target_id, source_id, files),
    ));
    source.status = new_status;
    source.append_note(&HandoffNote::new(
        ts,
        SYSTEM_AUTHOR,
        &format!("{} reassigned to {}. Transferred files: {}", source_id, target_id, files),
    ));

    journals.write(&mut target)?;
    journals.write(&mut source)?;

    tracing::info!(source = %source_id, target = %target_id, files = transferred.len(), "Agent reassigned");
    Ok(ReassignReport {
        source: source_id.to_string(),
        target: spec,
        transferred,
    })
}
