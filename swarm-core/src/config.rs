//! Configuration types
//!
//! Every path the engine touches is carried explicitly in [`SwarmConfig`];
//! nothing in the core looks at the environment or the home directory.

use crate::{SwarmError, SwarmResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default file name of the canonical store.
pub const MANIFEST_FILE: &str = "swarm-manifest.md";
/// Default file name of the derived status snapshot.
pub const STATUS_FILE: &str = "swarm_status.json";

/// Retry and staleness settings for marker-file locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Attempts before the last-resort force break.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Markers older than this are treated as left behind by a crashed holder.
    pub stale_after: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            stale_after: Duration::from_secs(30),
        }
    }
}

impl LockConfig {
    /// Wait before retry number `attempt` (0-based): doubling, capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }

    /// Upper bound on time spent waiting before the force break.
    pub fn total_wait(&self) -> Duration {
        (0..self.max_retries).map(|a| self.backoff_for(a)).sum()
    }
}

/// Master configuration struct, passed into the engine at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmConfig {
    pub workspace_root: PathBuf,
    /// Shared cross-workspace registry file.
    pub registry_path: PathBuf,
    /// Directory holding per-session event logs.
    pub events_dir: PathBuf,
    pub manifest_file: String,
    pub status_file: String,
    pub lock: LockConfig,
}

impl SwarmConfig {
    /// Build a configuration with default file names.
    ///
    /// `config_home` is the directory shared by all workspaces on the host;
    /// the caller decides where it lives.
    pub fn for_workspace(workspace_root: impl Into<PathBuf>, config_home: &Path) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            registry_path: config_home.join("swarm_registry.json"),
            events_dir: config_home.join("swarm_events"),
            manifest_file: MANIFEST_FILE.to_string(),
            status_file: STATUS_FILE.to_string(),
            lock: LockConfig::default(),
        }
    }

    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.workspace_root.join(&self.manifest_file)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.workspace_root.join(format!("{}.bak", self.manifest_file))
    }

    pub fn status_path(&self) -> PathBuf {
        self.workspace_root.join(&self.status_file)
    }

    /// Directory for lock markers that guard per-file claims.
    pub fn claim_lock_dir(&self) -> PathBuf {
        self.workspace_root.join(".swarm-locks")
    }

    /// Directory for the pending mirror-write log.
    pub fn docs_dir(&self) -> PathBuf {
        self.workspace_root.join("swarm-docs")
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - workspace_root is non-empty
    /// - file names are plain names, not paths
    /// - max_retries > 0 and backoff values are positive and ordered
    /// - stale_after is positive
    pub fn validate(&self) -> SwarmResult<()> {
        if self.workspace_root.as_os_str().is_empty() {
            return Err(SwarmError::invalid("workspace_root", "must not be empty"));
        }
        for (field, name) in [
            ("manifest_file", &self.manifest_file),
            ("status_file", &self.status_file),
        ] {
            if name.is_empty() || name.contains('/') || name.contains('\\') {
                return Err(SwarmError::invalid(field, format!("'{}' must be a plain file name", name)));
            }
        }
        if self.lock.max_retries == 0 {
            return Err(SwarmError::invalid("lock.max_retries", "must be greater than 0"));
        }
        if self.lock.initial_backoff.is_zero() {
            return Err(SwarmError::invalid("lock.initial_backoff", "must be positive"));
        }
        if self.lock.max_backoff < self.lock.initial_backoff {
            return Err(SwarmError::invalid(
                "lock.max_backoff",
                "must not be smaller than initial_backoff",
            ));
        }
        if self.lock.stale_after.is_zero() {
            return Err(SwarmError::invalid("lock.stale_after", "must be positive"));
        }
        Ok(())
    }

    /// Apply overrides from a TOML document and validate the result.
    ///
    /// ```toml
    /// registry_path = "/srv/swarm/registry.json"
    ///
    /// [lock]
    /// max_retries = 5
    /// stale_after_ms = 10000
    /// ```
    pub fn merge_toml(mut self, text: &str) -> SwarmResult<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| SwarmError::invalid("config", e.to_string()))?;
        if let Some(path) = file.registry_path {
            self.registry_path = path;
        }
        if let Some(dir) = file.events_dir {
            self.events_dir = dir;
        }
        if let Some(name) = file.manifest_file {
            self.manifest_file = name;
        }
        if let Some(name) = file.status_file {
            self.status_file = name;
        }
        if let Some(lock) = file.lock {
            if let Some(n) = lock.max_retries {
                self.lock.max_retries = n;
            }
            if let Some(ms) = lock.initial_backoff_ms {
                self.lock.initial_backoff = Duration::from_millis(ms);
            }
            if let Some(ms) = lock.max_backoff_ms {
                self.lock.max_backoff = Duration::from_millis(ms);
            }
            if let Some(ms) = lock.stale_after_ms {
                self.lock.stale_after = Duration::from_millis(ms);
            }
        }
        self.validate()?;
        Ok(self)
    }
}

// ============================================================================
// CONFIG FILE (The Schema)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    registry_path: Option<PathBuf>,
    events_dir: Option<PathBuf>,
    manifest_file: Option<String>,
    status_file: Option<String>,
    lock: Option<LockFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LockFile {
    max_retries: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    stale_after_ms: Option<u64>,
}
