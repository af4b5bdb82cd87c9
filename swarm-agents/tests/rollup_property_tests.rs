//! Property tests for the journal merge.

use proptest::prelude::*;
use swarm_agents::merge_journals;
use swarm_core::{AgentSpec, AgentStatus, FileClaim, Issue, Session, SupervisionMode};
use swarm_manifest::Manifest;
use swarm_storage::JournalRecord;
use swarm_test_utils::generators::{
    arb_agent_status, arb_claim_status, arb_file_path, arb_issue, arb_raw_issue,
};

const IDS: [&str; 3] = ["α", "β", "γ"];

fn base_manifest(session: &Session) -> Manifest {
    let mut m = Manifest::template(session);
    for (i, id) in IDS.iter().enumerate() {
        let phase = (i % 2 + 1).to_string();
        m.add_agent(&AgentSpec::new(id, "developer", &phase), &AgentStatus::Pending)
            .unwrap();
        m.ensure_gate(&phase).unwrap();
    }
    m
}

fn arb_journals(session_id: String) -> impl Strategy<Value = Vec<JournalRecord>> {
    let one = (
        arb_agent_status(),
        prop::collection::vec((arb_file_path(), arb_claim_status()), 0..4),
        prop::collection::vec(arb_raw_issue(), 0..3),
        prop::collection::vec("[a-z \n]{1,20}", 0..3),
    );
    prop::collection::vec(one, IDS.len()).prop_map(move |parts| {
        parts
            .into_iter()
            .zip(IDS)
            .enumerate()
            .map(|(i, ((status, claims, issues, notes), id))| {
                let phase = (i % 2 + 1).to_string();
                let mut j = JournalRecord::new(id, "developer", &phase, &session_id);
                j.status = status;
                j.file_claims = claims
                    .into_iter()
                    .map(|(file, status)| FileClaim { file, status })
                    .collect();
                j.issues = issues;
                for text in notes {
                    if !text.trim().is_empty() {
                        j.append_note(&swarm_core::HandoffNote::new(swarm_core::now(), id, &text));
                    }
                }
                j
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Merging the same journals a second time changes nothing.
    #[test]
    fn prop_merge_is_idempotent(
        journals in arb_journals("prop-session".to_string())
    ) {
        let mut session = Session::new("/w", "prop", SupervisionMode::Auto);
        session.session_id = "prop-session".to_string();
        let mut m = base_manifest(&session);

        merge_journals(&mut m, &journals).unwrap();
        let once = m.render();
        let report = merge_journals(&mut m, &journals).unwrap();

        prop_assert_eq!(m.render(), once);
        prop_assert_eq!(report.agents_updated, 0);
        prop_assert_eq!(report.issues_added, 0);
        prop_assert_eq!(report.notes_added, 0);
        prop_assert!(report.gates_checked.is_empty());
    }

    /// Every journal claim appears in the store exactly once.
    #[test]
    fn prop_claims_table_mirrors_journals(
        journals in arb_journals("prop-session".to_string())
    ) {
        let session = Session::new("/w", "prop", SupervisionMode::Auto);
        let mut m = base_manifest(&session);
        merge_journals(&mut m, &journals).unwrap();

        let expected: usize = journals.iter().map(|j| j.file_claims.len()).sum();
        prop_assert_eq!(m.claims().len(), expected);
    }

    /// Issues are never lost and never duplicated on (description, reporter).
    #[test]
    fn prop_issue_union_has_unique_keys(
        journals in arb_journals("prop-session".to_string()),
        existing in prop::collection::vec(arb_issue(), 0..3),
    ) {
        let session = Session::new("/w", "prop", SupervisionMode::Auto);
        let mut m = base_manifest(&session);
        let mut seeded: Vec<Issue> = Vec::new();
        for issue in existing {
            if !seeded.iter().any(|i| i.dedup_key() == issue.dedup_key()) {
                seeded.push(issue);
            }
        }
        m.replace_issues(&seeded).unwrap();
        merge_journals(&mut m, &journals).unwrap();

        let issues = m.issues();
        for (i, a) in issues.iter().enumerate() {
            for b in &issues[i + 1..] {
                prop_assert_ne!(a.dedup_key(), b.dedup_key());
            }
        }
        for issue in &seeded {
            prop_assert!(issues.contains(issue));
        }
    }
}
