//! Swarm Storage - filesystem substrate
//!
//! Everything the coordination engine persists lives in plain files:
//!
//! | Resource            | File                               | Guard             |
//! |---------------------|------------------------------------|-------------------|
//! | canonical store     | `swarm-manifest.md` (+ `.bak`)     | store lock        |
//! | agent journal       | `swarm-agent-<id>.json`            | single writer     |
//! | status snapshot     | `swarm_status.json`                | none (advisory)   |
//! | pending mirror log  | `swarm-docs/.mirror-pending.json`  | log lock          |
//!
//! All writes go through a temp file and a rename.

pub mod fs;
pub mod journal;
pub mod lock;
pub mod manifest_store;
pub mod mirror;
pub mod snapshot;

pub use journal::{safe_id, JournalRecord, JournalStore};
pub use lock::{inspect, FileLock, LockGuard};
pub use manifest_store::{ManifestStore, StoreUpdate};
pub use mirror::{MirrorSummary, PendingLog, PendingMirrorLog};
pub use snapshot::{needs_user_action, read_snapshot, write_snapshot, StatusSnapshot};
