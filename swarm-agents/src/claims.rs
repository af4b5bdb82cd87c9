//! File claims.
//!
//! Claims live in the claimant's own journal. Granting one is a
//! lock → scan → record → unlock sequence under a lock named after the
//! file path, so two agents racing for the same file cannot both win.

use std::collections::BTreeSet;
use std::path::PathBuf;
use swarm_core::{
    content_digest, ClaimRecord, ClaimSource, ClaimStatus, FileClaim, LockConfig, ResourceKind,
    SwarmConfig, SwarmError, SwarmResult,
};
use swarm_storage::{FileLock, JournalRecord, JournalStore, ManifestStore};

#[derive(Debug, Clone)]
pub struct ClaimManager {
    journals: JournalStore,
    store: ManifestStore,
    lock_dir: PathBuf,
    lock_config: LockConfig,
    session_id: String,
}

impl ClaimManager {
    pub fn new(config: &SwarmConfig, session_id: &str) -> Self {
        Self {
            journals: JournalStore::new(&config.workspace_root),
            store: ManifestStore::new(config),
            lock_dir: config.claim_lock_dir(),
            lock_config: config.lock.clone(),
            session_id: session_id.to_string(),
        }
    }

    /// Lock guarding claims on `file`, named by the digest of the path.
    pub fn lock_for(&self, file: &str) -> FileLock {
        let name = format!("{}.lock", content_digest(file.as_bytes()));
        FileLock::new(self.lock_dir.join(name), &self.lock_config).with_owner("claim")
    }

    /// Grant `agent_id` an Active claim on `file`.
    ///
    /// Fails with `Conflict` naming the holder when any agent of the session
    /// (the claimant included) already holds an Active claim on the file.
    pub fn claim(&self, agent_id: &str, file: &str) -> SwarmResult<FileClaim> {
        let file = validate_file(file)?;
        self.lock_for(file).with_lock(|| {
            let mut own = self.own_journal(agent_id)?;

            if let Some((holder, status)) = self.active_holder(file) {
                tracing::info!(agent = %agent_id, file = %file, holder = %holder, "Claim refused");
                return Err(SwarmError::Conflict {
                    resource: file.to_string(),
                    holder,
                    status: status.to_string(),
                });
            }

            match own.claim_mut(file) {
                Some(existing) => existing.status = ClaimStatus::Active,
                None => own.file_claims.push(FileClaim::active(file)),
            }
            self.journals.write(&mut own)?;
            tracing::info!(agent = %agent_id, file = %file, "Claim granted");
            Ok(FileClaim::active(file))
        })
    }

    /// Close the caller's Active claim on `file` with a terminal status.
    pub fn release(
        &self,
        agent_id: &str,
        file: &str,
        final_status: ClaimStatus,
    ) -> SwarmResult<FileClaim> {
        if final_status.is_active() {
            return Err(SwarmError::invalid(
                "final_status",
                "a released claim must be Done, Abandoned or Transferred",
            ));
        }
        let file = validate_file(file)?;
        self.lock_for(file).with_lock(|| {
            let mut own = self.own_journal(agent_id)?;
            let claim = own
                .file_claims
                .iter_mut()
                .find(|c| c.file == file && c.status.is_active())
                .ok_or_else(|| {
                    SwarmError::not_found(ResourceKind::Claim, format!("{} on {}", agent_id, file))
                })?;
            claim.status = final_status;
            let released = claim.clone();
            self.journals.write(&mut own)?;
            tracing::info!(agent = %agent_id, file = %file, status = %final_status, "Claim released");
            Ok(released)
        })
    }

    /// Every claim on `file`: journal claims first, then store claims of
    /// agents that have no journal claim on it. The path is trimmed the way
    /// `claim` trims it; an empty path has no claims.
    pub fn check(&self, file: &str) -> Vec<ClaimRecord> {
        let Ok(file) = validate_file(file) else {
            return Vec::new();
        };
        let mut records: Vec<ClaimRecord> = self
            .session_journals()
            .into_iter()
            .flat_map(|j| {
                let agent = j.agent_id;
                j.file_claims
                    .into_iter()
                    .filter(|c| c.file == file)
                    .map(move |c| ClaimRecord {
                        agent_id: agent.clone(),
                        file: c.file,
                        status: c.status,
                        source: ClaimSource::Journal,
                    })
            })
            .collect();

        let mut seen: BTreeSet<String> = records.iter().map(|r| r.agent_id.clone()).collect();
        if let Ok(manifest) = self.store.read() {
            for record in manifest.claims().into_iter().filter(|c| c.file == file) {
                if seen.insert(record.agent_id.clone()) {
                    records.push(record);
                }
            }
        }
        records
    }

    fn own_journal(&self, agent_id: &str) -> SwarmResult<JournalRecord> {
        self.journals
            .read(agent_id)
            .filter(|j| j.session_id == self.session_id)
            .ok_or_else(|| SwarmError::not_found(ResourceKind::Agent, agent_id))
    }

    fn session_journals(&self) -> Vec<JournalRecord> {
        self.journals.read_all(Some(&self.session_id))
    }

    fn active_holder(&self, file: &str) -> Option<(String, ClaimStatus)> {
        self.session_journals().into_iter().find_map(|j| {
            j.active_claim(file)
                .map(|c| (j.agent_id.clone(), c.status))
        })
    }
}

fn validate_file(file: &str) -> SwarmResult<&str> {
    let trimmed = file.trim();
    if trimmed.is_empty() {
        return Err(SwarmError::invalid("file", "must not be empty"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_test_utils::fixtures::TestWorkspace;

    const SESSION: &str = "s-1";

    fn setup(agents: &[&str]) -> (TestWorkspace, ClaimManager) {
        let ws = TestWorkspace::new();
        let journals = JournalStore::new(ws.root());
        for id in agents {
            journals.create(id, "developer", "1", SESSION).unwrap();
        }
        let claims = ClaimManager::new(ws.config(), SESSION);
        (ws, claims)
    }

    #[test]
    fn test_claim_conflict_names_holder() {
        let (_ws, claims) = setup(&["α", "β"]);
        claims.claim("α", "a.ts").unwrap();
        match claims.claim("β", "a.ts") {
            Err(SwarmError::Conflict { holder, status, .. }) => {
                assert_eq!(holder, "α");
                assert_eq!(status, "🔄 Active");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_reclaim_by_holder_conflicts() {
        let (_ws, claims) = setup(&["α"]);
        claims.claim("α", "a.ts").unwrap();
        assert!(matches!(
            claims.claim("α", "a.ts"),
            Err(SwarmError::Conflict { .. })
        ));
    }

    #[test]
    fn test_release_then_claim_by_other() {
        let (ws, claims) = setup(&["α", "β"]);
        claims.claim("α", "a.ts").unwrap();
        let released = claims.release("α", "a.ts", ClaimStatus::Done).unwrap();
        assert_eq!(released.status, ClaimStatus::Done);
        claims.claim("β", "a.ts").unwrap();

        let journals = JournalStore::new(ws.root());
        assert_eq!(journals.read("α").unwrap().file_claims[0].status, ClaimStatus::Done);
        assert!(journals.read("β").unwrap().active_claim("a.ts").is_some());
    }

    #[test]
    fn test_release_errors() {
        let (_ws, claims) = setup(&["α"]);
        assert!(matches!(
            claims.release("α", "a.ts", ClaimStatus::Done),
            Err(SwarmError::NotFound { kind: ResourceKind::Claim, .. })
        ));
        claims.claim("α", "a.ts").unwrap();
        assert!(matches!(
            claims.release("α", "a.ts", ClaimStatus::Active),
            Err(SwarmError::InvalidArgument { .. })
        ));
        claims.release("α", "a.ts", ClaimStatus::Abandoned).unwrap();
        assert!(matches!(
            claims.release("α", "a.ts", ClaimStatus::Done),
            Err(SwarmError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unknown_or_foreign_session_agent_is_not_found() {
        let (ws, claims) = setup(&[]);
        JournalStore::new(ws.root())
            .create("old", "developer", "1", "previous-session")
            .unwrap();
        for agent in ["ghost", "old"] {
            assert!(matches!(
                claims.claim(agent, "a.ts"),
                Err(SwarmError::NotFound { kind: ResourceKind::Agent, .. })
            ));
        }
    }

    #[test]
    fn test_reclaim_reuses_existing_entry() {
        let (ws, claims) = setup(&["α"]);
        claims.claim("α", "a.ts").unwrap();
        claims.release("α", "a.ts", ClaimStatus::Transferred).unwrap();
        claims.claim("α", "a.ts").unwrap();
        let journal = JournalStore::new(ws.root()).read("α").unwrap();
        assert_eq!(journal.file_claims.len(), 1);
        assert!(journal.file_claims[0].status.is_active());
    }

    #[test]
    fn test_check_prefers_journal_over_store() {
        let ws = TestWorkspace::new();
        ws.write_manifest(
            "## File Claims\n\n| File | Agent ID | Status |\n|---|---|---|\n| a.ts | α | ✅ Done |\n| a.ts | γ | 🔄 Active |\n",
        );
        let journals = JournalStore::new(ws.root());
        journals.create("α", "dev", "1", SESSION).unwrap();
        let claims = ClaimManager::new(ws.config(), SESSION);
        claims.claim("α", "a.ts").unwrap();

        let found = claims.check("a.ts");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].agent_id, "α");
        assert_eq!(found[0].status, ClaimStatus::Active);
        assert_eq!(found[0].source, ClaimSource::Journal);
        assert_eq!(found[1].agent_id, "γ");
        assert_eq!(found[1].source, ClaimSource::Store);
        assert!(claims.check("b.ts").is_empty());
    }

    #[test]
    fn test_check_trims_path_like_claim() {
        let (_ws, claims) = setup(&["α"]);
        claims.claim("α", " a.ts ").unwrap();
        let found = claims.check("\ta.ts ");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file, "a.ts");
        assert!(claims.check("  ").is_empty());
    }

    #[test]
    fn test_lock_name_is_path_digest() {
        let (ws, claims) = setup(&[]);
        let lock = claims.lock_for("src/a.rs");
        assert_eq!(lock.path().parent(), Some(ws.root().join(".swarm-locks").as_path()));
        assert_ne!(lock.path(), claims.lock_for("src/b.rs").path());
    }
}
