//! The canonical store on disk.

use crate::fs::{atomic_write, read_optional};
use crate::lock::FileLock;
use std::fs;
use std::path::{Path, PathBuf};
use swarm_core::{content_digest, ResourceKind, SwarmConfig, SwarmError, SwarmResult};
use swarm_manifest::Manifest;

/// Outcome of a locked read-modify-write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUpdate<T> {
    pub value: T,
    /// Whether the file content changed.
    pub changed: bool,
    /// Digest of the content after the update.
    pub digest: String,
}

#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    backup_path: PathBuf,
    lock: FileLock,
}

impl ManifestStore {
    pub fn new(config: &SwarmConfig) -> Self {
        let path = config.manifest_path();
        let lock_path = config
            .workspace_root
            .join(format!(".{}.lock", config.manifest_file));
        Self {
            backup_path: config.backup_path(),
            lock: FileLock::new(lock_path, &config.lock).with_owner("manifest"),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock(&self) -> &FileLock {
        &self.lock
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn read_text(&self) -> SwarmResult<String> {
        read_optional(&self.path)?.ok_or_else(|| {
            SwarmError::not_found(ResourceKind::Manifest, self.path.display().to_string())
        })
    }

    pub fn read(&self) -> SwarmResult<Manifest> {
        self.read_text().map(|text| Manifest::parse(&text))
    }

    /// Hex SHA-256 of the current content; `None` when there is no store.
    pub fn digest(&self) -> Option<String> {
        read_optional(&self.path)
            .ok()
            .flatten()
            .map(|text| content_digest(text.as_bytes()))
    }

    /// Replace the store content. The previous content is copied to the
    /// backup file first; a failed backup does not stop the write.
    pub fn write_text(&self, text: &str) -> SwarmResult<()> {
        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, &self.backup_path) {
                tracing::warn!(path = %self.backup_path.display(), error = %e, "Manifest backup failed");
            }
        }
        atomic_write(&self.path, text.as_bytes())
    }

    pub fn write(&self, manifest: &Manifest) -> SwarmResult<()> {
        self.write_text(&manifest.render())
    }

    /// Read, apply `f` and write back under the store lock. Nothing is
    /// written when the content is unchanged or `f` fails.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut Manifest) -> SwarmResult<T>,
    ) -> SwarmResult<StoreUpdate<T>> {
        self.lock.with_lock(|| {
            let before = self.read_text()?;
            let mut manifest = Manifest::parse(&before);
            let value = f(&mut manifest)?;
            let after = manifest.render();

            let before_digest = content_digest(before.as_bytes());
            let digest = content_digest(after.as_bytes());
            let changed = digest != before_digest;
            if changed {
                self.write_text(&after)?;
            }
            Ok(StoreUpdate {
                value,
                changed,
                digest,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{AgentSpec, AgentStatus, Session, SupervisionMode};

    fn store_in(dir: &Path) -> ManifestStore {
        ManifestStore::new(&SwarmConfig::for_workspace(dir, &dir.join("home")))
    }

    #[test]
    fn test_missing_store_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(matches!(
            store.read(),
            Err(SwarmError::NotFound { kind: ResourceKind::Manifest, .. })
        ));
        assert!(store.digest().is_none());
    }

    #[test]
    fn test_write_keeps_backup_of_previous() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.write_text("first\n").unwrap();
        store.write_text("second\n").unwrap();
        assert_eq!(store.read_text().unwrap(), "second\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("swarm-manifest.md.bak")).unwrap(),
            "first\n"
        );
    }

    #[test]
    fn test_update_skips_unchanged_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let session = Session::new(dir.path(), "mission", SupervisionMode::Full);
        store.write(&Manifest::template(&session)).unwrap();

        let noop = store.update(|_| Ok(())).unwrap();
        assert!(!noop.changed);
        assert!(!dir.path().join("swarm-manifest.md.bak").exists());

        let added = store
            .update(|m| {
                m.add_agent(&AgentSpec::new("α", "architect", "1"), &AgentStatus::Pending)?;
                Ok(())
            })
            .unwrap();
        assert!(added.changed);
        assert_eq!(Some(added.digest), store.digest());
        assert!(store.lock().inspect().is_free());
    }

    #[test]
    fn test_failed_update_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.write_text("## Agents\n").unwrap();
        let before = store.digest();
        let result = store.update(|m| {
            m.set_agent_status("ω", &AgentStatus::Done)?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(store.digest(), before);
        assert!(store.lock().inspect().is_free());
    }
}
