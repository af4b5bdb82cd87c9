//! Swarm Agents - Coordination Engine
//!
//! Builds the coordination operations on top of the storage substrate:
//! - File claims (per-file lock, journal-backed)
//! - Rollup of journals into the canonical store
//! - Phase gates and fail-closed phase advance
//! - Failure handling and reassignment
//! - The [`Coordinator`] facade over all of the above

pub mod claims;
pub mod coordinator;
pub mod lifecycle;
pub mod phase;
pub mod rollup;

pub use claims::ClaimManager;
pub use coordinator::{Coordinator, SwarmStatus};
pub use lifecycle::{mark_failed, reassign, FailureReport, ReassignReport};
pub use phase::{PhaseGates, PhaseReport, RosterEntry};
pub use rollup::{merge_journals, RollupEngine, RollupReport};
