//! Rollup: fold the session's journals into the canonical store.
//!
//! ```text
//! journals ──┬─→ 1. Agents.Status        (journal wins, other rows untouched)
//!            ├─→ 2. File Claims          (full replacement)
//!            ├─→ 3. Issues               (union, dedup on description + reporter)
//!            ├─→ 4. Handoff Notes        (union on text, chronological)
//!            └─→ 5. Phase Gates          (check every ready gate)
//! ```
//!
//! The merge is a pure function of (store, journals), so running it twice
//! leaves the store byte-identical.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use swarm_core::{
    normalize_phase, AgentStatus, ClaimRecord, ClaimSource, HandoffNote, SwarmConfig, SwarmResult,
};
use swarm_manifest::{Manifest, PhaseState};
use swarm_storage::{write_snapshot, JournalRecord, JournalStore, ManifestStore, StatusSnapshot};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollupReport {
    /// Agent rows whose status changed.
    pub agents_updated: usize,
    /// Rows now in the File Claims table.
    pub claims: usize,
    pub issues_added: usize,
    pub notes_added: usize,
    /// Phases whose gate this run checked.
    pub gates_checked: Vec<String>,
    /// Whether the store content changed.
    pub changed: bool,
    pub digest: String,
}

/// Merge `journals` into `manifest`. Only the journals' own agents, claims,
/// issues, notes and phases are considered.
pub fn merge_journals(manifest: &mut Manifest, journals: &[JournalRecord]) -> SwarmResult<RollupReport> {
    let mut report = RollupReport {
        agents_updated: manifest
            .apply_agent_statuses(journals.iter().map(|j| (j.agent_id.as_str(), &j.status)))?,
        ..Default::default()
    };

    let claims: Vec<ClaimRecord> = journals
        .iter()
        .flat_map(|j| {
            j.file_claims.iter().map(move |c| ClaimRecord {
                agent_id: j.agent_id.clone(),
                file: c.file.clone(),
                status: c.status,
                source: ClaimSource::Journal,
            })
        })
        .collect();
    manifest.replace_claims(&claims)?;
    report.claims = claims.len();

    let mut issues = manifest.issues();
    for journal in journals {
        for issue in &journal.issues {
            // Store cells are single-line and trimmed; compare in that form.
            let mut issue = issue.normalized();
            if issue.reporter.is_empty() {
                issue.reporter = journal.agent_id.clone();
            }
            if !issues.iter().any(|i| i.dedup_key() == issue.dedup_key()) {
                issues.push(issue);
                report.issues_added += 1;
            }
        }
    }
    if report.issues_added > 0 {
        manifest.replace_issues(&issues)?;
    }

    let mut notes = manifest.notes();
    let mut seen: HashSet<String> = notes.iter().map(|n| n.text.clone()).collect();
    let mut incoming: Vec<HandoffNote> = journals.iter().flat_map(JournalRecord::notes).collect();
    incoming.sort_by_key(|n| n.timestamp);
    for note in incoming {
        if seen.insert(note.text.clone()) {
            notes.push(note);
            report.notes_added += 1;
        }
    }
    if report.notes_added > 0 {
        notes.sort_by_key(|n| n.timestamp);
        manifest.replace_notes(&notes)?;
    }

    let journal_status: HashMap<&str, &AgentStatus> =
        journals.iter().map(|j| (j.agent_id.as_str(), &j.status)).collect();
    let phases: BTreeSet<String> = journals
        .iter()
        .map(|j| normalize_phase(&j.phase))
        .filter(|p| !p.is_empty())
        .collect();
    for phase in phases {
        let Some(gate) = manifest.gate(&phase) else {
            tracing::debug!(phase = %phase, "No gate for phase, skipping");
            continue;
        };
        if gate.checked {
            continue;
        }
        let statuses: Vec<Option<AgentStatus>> = manifest
            .agents_in_phase(&phase)
            .iter()
            .map(|a| {
                journal_status
                    .get(a.id.as_str())
                    .map(|s| (*s).clone())
                    .or_else(|| a.status())
            })
            .collect();
        if PhaseState::evaluate(false, statuses.iter().map(Option::as_ref)) == PhaseState::Ready {
            manifest.set_gate(&phase, true)?;
            report.gates_checked.push(phase);
        }
    }

    Ok(report)
}

/// Runs [`merge_journals`] against the store under the store lock.
#[derive(Debug, Clone)]
pub struct RollupEngine {
    store: ManifestStore,
    journals: JournalStore,
    status_path: PathBuf,
}

impl RollupEngine {
    pub fn new(config: &SwarmConfig) -> Self {
        Self {
            store: ManifestStore::new(config),
            journals: JournalStore::new(&config.workspace_root),
            status_path: config.status_path(),
        }
    }

    /// Merge the journals of the store's session and refresh the status
    /// snapshot. The store is rewritten only when its content changes.
    pub fn run(&self, last_event: &str) -> SwarmResult<RollupReport> {
        let update = self.store.update(|manifest| {
            let session = manifest.session_id();
            let journals = self.journals.read_all(session.as_deref());
            let report = merge_journals(manifest, &journals)?;
            Ok((report, manifest.clone()))
        })?;
        let (mut report, manifest) = update.value;
        report.changed = update.changed;
        report.digest = update.digest;

        write_snapshot(&self.status_path, &StatusSnapshot::from_manifest(&manifest, last_event));
        tracing::info!(
            agents_updated = report.agents_updated,
            claims = report.claims,
            issues_added = report.issues_added,
            notes_added = report.notes_added,
            gates_checked = ?report.gates_checked,
            changed = report.changed,
            "Rollup complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use swarm_core::{ClaimStatus, FileClaim, Issue};
    use swarm_test_utils::fixtures::{TestWorkspace, SAMPLE_MANIFEST};

    const SESSION: &str = "sample-session";

    fn journal(id: &str, phase: &str, status: AgentStatus) -> JournalRecord {
        let mut j = JournalRecord::new(id, "developer", phase, SESSION);
        j.status = status;
        j
    }

    #[test]
    fn test_merge_updates_statuses_and_claims() {
        let mut m = Manifest::parse(SAMPLE_MANIFEST);
        let mut alpha = journal("α", "1", AgentStatus::Complete);
        alpha.file_claims.push(FileClaim {
            file: "a.ts".to_string(),
            status: ClaimStatus::Done,
        });
        let mut beta = journal("β", "2", AgentStatus::Active);
        beta.file_claims.push(FileClaim::active("b.ts"));

        let report = merge_journals(&mut m, &[alpha, beta]).unwrap();
        assert_eq!(report.agents_updated, 2);
        assert_eq!(report.claims, 2);
        assert_eq!(report.gates_checked, vec!["1".to_string()]);

        assert_eq!(m.agent("α").unwrap().status(), Some(AgentStatus::Complete));
        assert!(m.gate("1").unwrap().checked);
        assert!(!m.gate("2").unwrap().checked);
        let claims = m.claims();
        assert_eq!(claims[1].agent_id, "β");
        assert_eq!(claims[1].status, ClaimStatus::Active);
    }

    #[test]
    fn test_merge_discards_stale_store_claims() {
        let text = SAMPLE_MANIFEST.replace(
            "| File | Claimed By | Status |\n|---|---|---|\n",
            "| File | Claimed By | Status |\n|---|---|---|\n| old.ts | ω | 🔄 Active |\n",
        );
        let mut m = Manifest::parse(&text);
        merge_journals(&mut m, &[journal("α", "1", AgentStatus::Active)]).unwrap();
        assert!(m.claims().is_empty());
    }

    #[test]
    fn test_merge_dedups_issues_and_fills_reporter() {
        let mut m = Manifest::parse(SAMPLE_MANIFEST);
        let mut alpha = journal("α", "1", AgentStatus::Active);
        alpha.issues.push(Issue::new("high", "api", "login broken", ""));
        let mut beta = journal("β", "2", AgentStatus::Active);
        beta.issues.push(Issue::new("low", "api", "login broken", "α"));
        beta.issues.push(Issue::new("low", "api", "login broken", "β"));

        let report = merge_journals(&mut m, &[alpha, beta]).unwrap();
        assert_eq!(report.issues_added, 2);
        let issues = m.issues();
        assert_eq!(issues[0].reporter, "α");
        assert_eq!(issues[0].severity, "high");
        assert_eq!(issues[1].reporter, "β");
    }

    #[test]
    fn test_merge_flattens_raw_journal_issues() {
        let mut m = Manifest::parse(SAMPLE_MANIFEST);
        let mut alpha = journal("α", "1", AgentStatus::Active);
        alpha.issues.push(Issue {
            severity: "high".to_string(),
            area: "api".to_string(),
            description: "line one\nline two".to_string(),
            reporter: String::new(),
        });

        assert_eq!(merge_journals(&mut m, &[alpha.clone()]).unwrap().issues_added, 1);
        let once = m.render();
        assert_eq!(merge_journals(&mut m, &[alpha]).unwrap().issues_added, 0);
        assert_eq!(m.render(), once);
        assert_eq!(m.issues()[0].description, "line one line two");
    }

    #[test]
    fn test_merge_notes_union_in_time_order() {
        let mut m = Manifest::parse(SAMPLE_MANIFEST);
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let mut alpha = journal("α", "1", AgentStatus::Active);
        alpha.append_note(&HandoffNote::new(late, "α", "schema frozen"));
        let mut beta = journal("β", "2", AgentStatus::Active);
        beta.append_note(&HandoffNote::new(early, "β", "parser stub in"));
        beta.append_note(&HandoffNote::new(late, "β", "schema frozen"));

        let report = merge_journals(&mut m, &[alpha, beta]).unwrap();
        assert_eq!(report.notes_added, 2);
        let texts: Vec<String> = m.notes().into_iter().map(|n| n.text).collect();
        assert_eq!(texts, vec!["parser stub in", "schema frozen"]);
    }

    #[test]
    fn test_blocked_agent_keeps_gate_open() {
        let mut m = Manifest::parse(SAMPLE_MANIFEST);
        let report = merge_journals(&mut m, &[journal("α", "1", AgentStatus::Blocked)]).unwrap();
        assert!(report.gates_checked.is_empty());
        assert!(!m.gate("1").unwrap().checked);
    }

    #[test]
    fn test_engine_run_is_idempotent() {
        let ws = TestWorkspace::with_sample_manifest();
        let journals = JournalStore::new(ws.root());
        let mut alpha = journal("α", "1", AgentStatus::Done);
        alpha.file_claims.push(FileClaim::active("a.ts"));
        alpha.append_note(&HandoffNote::new(swarm_core::now(), "α", "done"));
        journals.write(&mut alpha).unwrap();

        let engine = RollupEngine::new(ws.config());
        let first = engine.run("rollup").unwrap();
        assert!(first.changed);
        let after_first = ws.manifest_text();

        let second = engine.run("rollup").unwrap();
        assert!(!second.changed);
        assert_eq!(second.digest, first.digest);
        assert_eq!(ws.manifest_text(), after_first);
        assert!(second.gates_checked.is_empty());
        assert!(ws.config().status_path().exists());
    }

    #[test]
    fn test_engine_ignores_other_sessions() {
        let ws = TestWorkspace::with_sample_manifest();
        let journals = JournalStore::new(ws.root());
        let mut stale = JournalRecord::new("α", "developer", "1", "older-session");
        stale.status = AgentStatus::Failed;
        journals.write(&mut stale).unwrap();

        RollupEngine::new(ws.config()).run("rollup").unwrap();
        assert_eq!(ws.manifest().agent("α").unwrap().status(), Some(AgentStatus::Active));
    }
}
