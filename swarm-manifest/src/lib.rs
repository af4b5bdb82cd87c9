//! Swarm Manifest - canonical store grammar
//!
//! The canonical store is a single Markdown document made of level-2
//! sections. Each section may hold one pipe table or one checkbox list.
//!
//! Architecture:
//! ```text
//! Markdown Source (swarm-manifest.md)
//!     ↓
//! Document (lines + section spans, verbatim)
//!     ↓
//! Table / Checklist blocks (parsed on demand, malformed = absent)
//!     ↓
//! Manifest (typed view: agents, claims, issues, gates, notes)
//!     ↓
//! Printer (deterministic table / checklist text)
//! ```
//!
//! Edits replace exactly the lines of one block, so all other text survives
//! byte for byte.

pub mod document;
pub mod error;
pub mod model;
pub mod printer;
pub mod schema;

pub use document::{Document, SectionSpan};
pub use error::ManifestError;
pub use model::{CheckItem, Checklist, Row, Table};
pub use printer::{serialize_checklist, serialize_table};
pub use schema::{
    columns, sections, AgentRow, Manifest, PhaseGate, PhaseState, SectionView,
};
