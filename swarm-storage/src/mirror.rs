//! Log of document-mirror writes that failed and must be retried.
//!
//! Agents mirror their local documents to an external service. When a
//! mirror write fails they record it here; the entries are retried at
//! phase gates and cleared at the end of the session. This module only
//! manages the log, it never contacts the service.

use crate::fs::{read_json, remove_if_exists, write_json};
use crate::lock::FileLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use swarm_core::{PendingMirrorWrite, SwarmConfig, SwarmResult};

pub const PENDING_FILE: &str = ".mirror-pending.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLog {
    #[serde(default)]
    pub pending_writes: Vec<PendingMirrorWrite>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorSummary {
    pub total: usize,
    pub by_agent: BTreeMap<String, usize>,
    pub items: Vec<PendingMirrorWrite>,
}

#[derive(Debug, Clone)]
pub struct PendingMirrorLog {
    path: PathBuf,
    lock: FileLock,
}

impl PendingMirrorLog {
    pub fn new(config: &SwarmConfig) -> Self {
        let path = config.docs_dir().join(PENDING_FILE);
        let lock = FileLock::new(path.with_extension("json.lock"), &config.lock).with_owner("mirror-log");
        Self { path, lock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current log; missing or unreadable logs read as empty.
    pub fn read(&self) -> PendingLog {
        match read_json(&self.path) {
            Ok(Some(log)) => log,
            Ok(None) => PendingLog::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Pending mirror log unreadable");
                PendingLog::default()
            }
        }
    }

    /// Record a failed write with its retry count reset.
    pub fn append(&self, mut entry: PendingMirrorWrite) -> SwarmResult<()> {
        entry.retries = 0;
        self.lock.with_lock(|| {
            let mut log = self.read();
            tracing::info!(agent = %entry.agent_id, file = %entry.local_file, "Mirror write queued for retry");
            log.pending_writes.push(entry);
            write_json(&self.path, &log)
        })
    }

    /// Drop the first entry for `local_file`. Returns whether one existed.
    pub fn resolve(&self, local_file: &str) -> SwarmResult<bool> {
        self.lock.with_lock(|| {
            let mut log = self.read();
            let Some(idx) = log.pending_writes.iter().position(|w| w.local_file == local_file) else {
                return Ok(false);
            };
            log.pending_writes.remove(idx);
            write_json(&self.path, &log)?;
            Ok(true)
        })
    }

    /// Bump the retry count of the entry for `local_file`.
    pub fn increment_retry(&self, local_file: &str) -> SwarmResult<bool> {
        self.lock.with_lock(|| {
            let mut log = self.read();
            let Some(entry) = log.pending_writes.iter_mut().find(|w| w.local_file == local_file) else {
                return Ok(false);
            };
            entry.retries += 1;
            write_json(&self.path, &log)?;
            Ok(true)
        })
    }

    pub fn summary(&self) -> MirrorSummary {
        let items = self.read().pending_writes;
        let mut by_agent = BTreeMap::new();
        for w in &items {
            *by_agent.entry(w.agent_id.clone()).or_insert(0) += 1;
        }
        MirrorSummary {
            total: items.len(),
            by_agent,
            items,
        }
    }

    pub fn clear(&self) -> SwarmResult<()> {
        self.lock.with_lock(|| remove_if_exists(&self.path).map(|_| ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(agent: &str, file: &str) -> PendingMirrorWrite {
        PendingMirrorWrite {
            agent_id: agent.to_string(),
            local_file: file.to_string(),
            remote_page: "Design".to_string(),
            remote_folder: "f-1".to_string(),
            failed_at: "2026-03-01T09:30:00Z".to_string(),
            error: "timeout".to_string(),
            retries: 7,
        }
    }

    fn log_in(dir: &Path) -> PendingMirrorLog {
        PendingMirrorLog::new(&SwarmConfig::for_workspace(dir, &dir.join("home")))
    }

    #[test]
    fn test_append_resolve_summary() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path());
        assert_eq!(log.summary().total, 0);

        log.append(entry("α", "docs/a.md")).unwrap();
        log.append(entry("α", "docs/b.md")).unwrap();
        log.append(entry("β", "docs/c.md")).unwrap();

        let summary = log.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_agent.get("α"), Some(&2));
        assert!(summary.items.iter().all(|w| w.retries == 0));

        assert!(log.resolve("docs/a.md").unwrap());
        assert!(!log.resolve("docs/a.md").unwrap());
        assert_eq!(log.summary().total, 2);
    }

    #[test]
    fn test_increment_retry_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path());
        log.append(entry("α", "docs/a.md")).unwrap();
        assert!(log.increment_retry("docs/a.md").unwrap());
        assert!(log.increment_retry("docs/a.md").unwrap());
        assert!(!log.increment_retry("docs/zzz.md").unwrap());
        assert_eq!(log.read().pending_writes[0].retries, 2);

        log.clear().unwrap();
        assert!(!log.path().exists());
        log.clear().unwrap();
    }

    #[test]
    fn test_log_lives_under_docs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path());
        assert_eq!(log.path(), dir.path().join("swarm-docs").join(".mirror-pending.json"));
    }
}
