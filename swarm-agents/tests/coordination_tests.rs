//! End-to-end coordination scenarios against a temp workspace.

use std::sync::Barrier;
use swarm_agents::Coordinator;
use swarm_core::{
    AgentOverrides, AgentSpec, AgentStatus, ClaimStatus, ResourceKind, SupervisionMode,
    SwarmError,
};
use swarm_manifest::PhaseState;
use swarm_storage::{read_snapshot, JournalStore};
use swarm_test_utils::assertions::{assert_conflict, assert_not_found, assert_phase_not_complete};
use swarm_test_utils::fixtures::TestWorkspace;
use swarm_test_utils::init_tracing;

fn session(ws: &TestWorkspace, agents: &[(&str, &str)]) -> Coordinator {
    init_tracing();
    let c = Coordinator::new(ws.config().clone()).unwrap();
    c.init_session("Build the thing", SupervisionMode::Full).unwrap();
    for (id, phase) in agents {
        c.register_agent(&AgentSpec::new(id, "developer", phase)).unwrap();
    }
    c
}

#[test]
fn test_alpha_beta_claim_scenario() {
    let ws = TestWorkspace::new();
    let c = session(&ws, &[("α", "1"), ("β", "1")]);

    c.claim_file("α", "a.ts").unwrap();
    assert_conflict(&c.claim_file("β", "a.ts"), "α");
    c.release_file("α", "a.ts", ClaimStatus::Done).unwrap();
    c.claim_file("β", "a.ts").unwrap();

    let holders: Vec<(String, ClaimStatus)> = c
        .check_file("a.ts")
        .unwrap()
        .into_iter()
        .map(|r| (r.agent_id, r.status))
        .collect();
    assert_eq!(
        holders,
        vec![
            ("α".to_string(), ClaimStatus::Done),
            ("β".to_string(), ClaimStatus::Active)
        ]
    );
}

#[test]
fn test_concurrent_claims_have_one_winner() {
    let ws = TestWorkspace::new();
    let ids: Vec<String> = (0..8).map(|i| format!("agent-{}", i)).collect();
    let specs: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "1")).collect();
    let c = session(&ws, &specs);
    let barrier = Barrier::new(ids.len());

    let results: Vec<(String, Result<(), SwarmError>)> = std::thread::scope(|s| {
        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let c = c.clone();
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    (id.clone(), c.claim_file(id, "shared.rs").map(|_| ()))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<&String> = results
        .iter()
        .filter(|(_, r)| r.is_ok())
        .map(|(id, _)| id)
        .collect();
    assert_eq!(winners.len(), 1, "results: {:?}", results);
    let winner = winners[0].clone();
    for (_, result) in results.iter().filter(|(_, r)| r.is_err()) {
        assert_conflict(result, &winner);
    }
}

#[test]
fn test_release_of_missing_claim_is_not_found() {
    let ws = TestWorkspace::new();
    let c = session(&ws, &[("α", "1")]);
    assert_not_found(&c.release_file("α", "nope.ts", ClaimStatus::Done), ResourceKind::Claim);
    c.claim_file("α", "a.ts").unwrap();
    c.release_file("α", "a.ts", ClaimStatus::Done).unwrap();
    assert_not_found(&c.release_file("α", "a.ts", ClaimStatus::Done), ResourceKind::Claim);
}

#[test]
fn test_rollup_is_idempotent() {
    let ws = TestWorkspace::new();
    let c = session(&ws, &[("α", "1"), ("β", "2")]);
    c.update_status("α", AgentStatus::Active, "working").unwrap();
    c.claim_file("α", "src/lib.rs").unwrap();
    c.add_note("α", "lib skeleton in place").unwrap();

    let first = c.rollup().unwrap();
    assert!(first.changed);
    let text = ws.manifest_text();
    let second = c.rollup().unwrap();
    assert!(!second.changed);
    assert_eq!(ws.manifest_text(), text);

    let m = ws.manifest();
    assert_eq!(m.agent("α").unwrap().status(), Some(AgentStatus::Active));
    assert_eq!(m.claims().len(), 1);
    assert_eq!(m.notes().len(), 1);
}

#[test]
fn test_mark_failed_frees_claims_after_rollup() {
    let ws = TestWorkspace::new();
    let c = session(&ws, &[("α", "1"), ("β", "1")]);
    for file in ["a.ts", "b.ts", "c.ts"] {
        c.claim_file("α", file).unwrap();
    }
    c.release_file("α", "c.ts", ClaimStatus::Done).unwrap();

    let report = c.mark_failed("α", "context exhausted").unwrap();
    assert_eq!(report.abandoned.len(), 2);

    c.rollup().unwrap();
    let m = ws.manifest();
    let abandoned = m
        .claims()
        .into_iter()
        .filter(|r| r.status == ClaimStatus::Abandoned)
        .count();
    assert_eq!(abandoned, 2);
    let system_notes = m.notes().into_iter().filter(|n| n.is_system()).count();
    assert_eq!(system_notes, 1);

    c.claim_file("β", "a.ts").unwrap();
}

#[test]
fn test_advance_waits_for_the_whole_phase() {
    let ws = TestWorkspace::new();
    let c = session(&ws, &[("α", "1"), ("β", "1"), ("γ", "2")]);
    c.update_status("α", AgentStatus::Complete, "").unwrap();
    c.update_status("β", AgentStatus::Active, "").unwrap();

    assert_phase_not_complete(&c.advance("1", "2"), &["β"]);
    assert!(!ws.manifest().gate("1").unwrap().checked);

    c.update_status("β", AgentStatus::Failed, "gave up").unwrap();
    assert_eq!(c.check_phase("1").unwrap().state, PhaseState::Ready);
    let roster = c.advance("1", "2").unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].agent_id, "γ");

    let m = ws.manifest();
    assert!(m.gate("1").unwrap().checked);
    assert_eq!(m.current_phase().unwrap().phase, "2");
}

#[test]
fn test_reassigned_agent_can_reclaim_transferred_files() {
    let ws = TestWorkspace::new();
    let c = session(&ws, &[("α", "1")]);
    c.claim_file("α", "a.ts").unwrap();

    let report = c.reassign("α", "α2", &AgentOverrides::default()).unwrap();
    assert_eq!(report.transferred, vec!["a.ts"]);
    assert_eq!(report.target.phase, "1");

    c.claim_file("α2", "a.ts").unwrap();
    let journal = JournalStore::new(ws.root()).read("α2").unwrap();
    assert_eq!(journal.file_claims.len(), 1);
    assert!(journal.file_claims[0].status.is_active());

    c.rollup().unwrap();
    assert_eq!(
        ws.manifest().agent("α").unwrap().status(),
        Some(AgentStatus::Reassigned("α2".to_string()))
    );
    // A reassigned agent lets its phase gate close in favour of its successor.
    c.update_status("α2", AgentStatus::Done, "").unwrap();
    c.rollup().unwrap();
    assert!(ws.manifest().gate("1").unwrap().checked);
}

#[test]
fn test_snapshot_flags_blocked_agents_in_full_mode() {
    let ws = TestWorkspace::new();
    let c = session(&ws, &[("α", "1"), ("β", "1")]);
    c.update_status("β", AgentStatus::Blocked, "waiting on api").unwrap();
    c.rollup().unwrap();

    let snap = read_snapshot(&ws.config().status_path()).unwrap();
    assert_eq!(snap.agents_blocked, 1);
    assert_eq!(snap.agents_total, 2);
    assert!(snap.needs_user_action);
}
