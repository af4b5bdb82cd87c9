//! Swarm Events - registry and event bus
//!
//! Both resources live in a directory shared by every workspace on the
//! host, so every mutation runs under the resource's own lock:
//!
//! ```text
//! <config home>/
//!   swarm_registry.json                      one entry per workspace
//!   swarm_events/
//!     events-<workspace slug>-<session>.json append-only, per session
//! ```

mod bus;
mod registry;

pub use bus::{workspace_slug, EventBus};
pub use registry::Registry;

pub use swarm_core::{Event, EventType, RegistryEntry, RegistryStatus, RegistryUpdate};
