//! Swarm Test Utilities
//!
//! Shared test infrastructure for the swarm workspace:
//! - Proptest generators for ids, statuses and records
//! - Temporary workspace fixtures with fast lock settings
//! - Custom assertions over `SwarmResult`
//! - Tracing initialisation for test output

pub use swarm_core::{
    AgentSpec, AgentStatus, ClaimStatus, Issue, LockConfig, ResourceKind, Session,
    SupervisionMode, SwarmConfig, SwarmError, SwarmResult,
};

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Install a test-writer subscriber once per process. Honors `RUST_LOG`,
/// defaulting to `warn`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for swarm types.

    use super::*;
    use proptest::prelude::*;

    /// Agent ids: ASCII, Greek letters and a few separators.
    pub fn arb_agent_id() -> impl Strategy<Value = String> {
        "[a-zα-ω][a-zα-ω0-9_.-]{0,11}"
    }

    /// Bare phase numbers.
    pub fn arb_phase() -> impl Strategy<Value = String> {
        (1u8..6).prop_map(|n| n.to_string())
    }

    /// Workspace-relative file paths.
    pub fn arb_file_path() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z][a-z0-9_]{0,7}", 1..4)
            .prop_map(|parts| format!("{}.rs", parts.join("/")))
    }

    /// Table cell text, pipes included.
    pub fn arb_cell_text() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 |_.:-]{0,16}"
    }

    pub fn arb_agent_status() -> impl Strategy<Value = AgentStatus> {
        prop_oneof![
            Just(AgentStatus::Pending),
            Just(AgentStatus::Active),
            Just(AgentStatus::Complete),
            Just(AgentStatus::Done),
            Just(AgentStatus::Blocked),
            Just(AgentStatus::Failed),
            arb_agent_id().prop_map(AgentStatus::Reassigned),
        ]
    }

    pub fn arb_claim_status() -> impl Strategy<Value = ClaimStatus> {
        prop_oneof![
            Just(ClaimStatus::Active),
            Just(ClaimStatus::Done),
            Just(ClaimStatus::Abandoned),
            Just(ClaimStatus::Transferred),
        ]
    }

    pub fn arb_supervision_mode() -> impl Strategy<Value = SupervisionMode> {
        prop_oneof![
            Just(SupervisionMode::Full),
            Just(SupervisionMode::Gates),
            Just(SupervisionMode::Auto),
        ]
    }

    pub fn arb_agent_spec() -> impl Strategy<Value = AgentSpec> {
        (arb_agent_id(), "[a-z]{3,10}", arb_phase())
            .prop_map(|(id, role, phase)| AgentSpec::new(&id, &role, &phase))
    }

    pub fn arb_issue() -> impl Strategy<Value = Issue> {
        (
            prop_oneof![Just("low"), Just("medium"), Just("high")],
            "[a-z/]{1,12}",
            "[A-Za-z]([A-Za-z ]{0,22}[A-Za-z])?",
            arb_agent_id(),
        )
            .prop_map(|(sev, area, desc, reporter)| Issue::new(sev, &area, &desc, &reporter))
    }

    /// Issues as an agent might write them into its journal: line breaks,
    /// padding and blank reporters left in place.
    pub fn arb_raw_issue() -> impl Strategy<Value = Issue> {
        (
            prop_oneof![Just("low"), Just(" high\n")],
            "[a-z/ ]{0,8}",
            "[ \n]{0,2}[A-Za-z]{1,6}([ \t\r\n]{1,3}[A-Za-z]{1,6}){0,3}[ \n]{0,2}",
            prop_oneof![Just(String::new()), arb_agent_id(), arb_agent_id().prop_map(|id| format!("{}\n", id))],
        )
            .prop_map(|(sev, area, description, reporter)| Issue {
                severity: sev.to_string(),
                area,
                description,
                reporter,
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use swarm_manifest::Manifest;
    use swarm_storage::ManifestStore;
    use tempfile::TempDir;

    /// A hand-written manifest with two agents in two phases.
    pub const SAMPLE_MANIFEST: &str = "<!-- swarm-session: sample-session -->
# Swarm Manifest

## Mission

Ship the parser rewrite.

## Mode

Supervision: Gates

## Agents

| ID | Role | Model | Phase | Scope | Status |
|---|---|---|---|---|---|
| α | architect | opus | 1 | design | 🔄 Active |
| β | developer | sonnet | 2 | src/parser | ⏳ Pending |

## File Claims

| File | Claimed By | Status |
|---|---|---|

## Phase Gates

- [ ] Phase 1 (Planning)
- [ ] Phase 2 (Implementation)

## Issues

| Severity | Area | Description | Reporter |
|---|---|---|---|

## Handoff Notes

| Time | Author | Note |
|---|---|---|
";

    /// Lock settings that keep contended tests fast.
    pub fn fast_lock_config() -> LockConfig {
        LockConfig {
            max_retries: 40,
            initial_backoff: Duration::from_millis(2),
            max_backoff: Duration::from_millis(20),
            stale_after: Duration::from_secs(30),
        }
    }

    /// A workspace and a config home, both inside one temp dir that is
    /// removed on drop.
    pub struct TestWorkspace {
        dir: TempDir,
        config: SwarmConfig,
    }

    impl TestWorkspace {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().expect("create temp dir");
            let root = dir.path().join("workspace");
            std::fs::create_dir_all(&root).expect("create workspace dir");
            let config = SwarmConfig::for_workspace(&root, &dir.path().join("config"))
                .with_lock(fast_lock_config());
            Self { dir, config }
        }

        /// Workspace whose canonical store holds [`SAMPLE_MANIFEST`].
        pub fn with_sample_manifest() -> Self {
            let ws = Self::new();
            ws.write_manifest(SAMPLE_MANIFEST);
            ws
        }

        pub fn root(&self) -> &Path {
            &self.config.workspace_root
        }

        pub fn config(&self) -> &SwarmConfig {
            &self.config
        }

        /// Directory shared by all workspaces (registry, events).
        pub fn config_home(&self) -> PathBuf {
            self.dir.path().join("config")
        }

        pub fn write_manifest(&self, text: &str) {
            ManifestStore::new(&self.config)
                .write_text(text)
                .expect("write manifest");
        }

        pub fn manifest_text(&self) -> String {
            ManifestStore::new(&self.config)
                .read_text()
                .expect("read manifest")
        }

        pub fn manifest(&self) -> Manifest {
            Manifest::parse(&self.manifest_text())
        }
    }

    impl Default for TestWorkspace {
        fn default() -> Self {
            Self::new()
        }
    }

    pub fn session_for(ws: &TestWorkspace, mode: SupervisionMode) -> Session {
        Session::new(ws.root(), "test mission", mode)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over `SwarmResult` values.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &SwarmResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &SwarmResult<T>, kind: ResourceKind) {
        match result {
            Err(SwarmError::NotFound { kind: k, .. }) => {
                assert_eq!(*k, kind, "Wrong resource kind in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", kind, other),
        }
    }

    /// Assert a Conflict held by `holder`.
    #[track_caller]
    pub fn assert_conflict<T: std::fmt::Debug>(result: &SwarmResult<T>, holder: &str) {
        match result {
            Err(SwarmError::Conflict { holder: h, .. }) => {
                assert_eq!(h, holder, "Wrong holder in Conflict error");
            }
            other => panic!("Expected Conflict held by {}, got: {:?}", holder, other),
        }
    }

    #[track_caller]
    pub fn assert_invalid_argument<T: std::fmt::Debug>(result: &SwarmResult<T>) {
        match result {
            Err(SwarmError::InvalidArgument { .. }) => {}
            other => panic!("Expected InvalidArgument error, got: {:?}", other),
        }
    }

    /// Assert PhaseNotComplete naming exactly `outstanding`, in any order.
    #[track_caller]
    pub fn assert_phase_not_complete<T: std::fmt::Debug>(
        result: &SwarmResult<T>,
        outstanding: &[&str],
    ) {
        match result {
            Err(SwarmError::PhaseNotComplete { outstanding: o, .. }) => {
                let mut got: Vec<&str> = o.iter().map(String::as_str).collect();
                let mut want = outstanding.to_vec();
                got.sort_unstable();
                want.sort_unstable();
                assert_eq!(got, want, "Wrong outstanding agents");
            }
            other => panic!("Expected PhaseNotComplete, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
