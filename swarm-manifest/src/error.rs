//! Errors raised while editing a manifest document.

use swarm_core::{ResourceKind, SwarmError};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("No table in section: {0}")]
    TableNotFound(String),

    #[error("No checklist in section: {0}")]
    ChecklistNotFound(String),

    #[error("No row in section {section} where {column} = {value}")]
    RowNotFound {
        section: String,
        column: String,
        value: String,
    },

    #[error("No phase gate for phase {0}")]
    GateNotFound(String),
}

impl From<ManifestError> for SwarmError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::SectionNotFound(name) => SwarmError::not_found(ResourceKind::Section, name),
            ManifestError::TableNotFound(name) => SwarmError::not_found(ResourceKind::Table, name),
            ManifestError::ChecklistNotFound(name) => {
                SwarmError::not_found(ResourceKind::Checklist, name)
            }
            ManifestError::RowNotFound { section, value, .. } => {
                let kind = if section == crate::sections::AGENTS {
                    ResourceKind::Agent
                } else {
                    ResourceKind::Table
                };
                SwarmError::not_found(kind, value)
            }
            ManifestError::GateNotFound(phase) => SwarmError::not_found(ResourceKind::Phase, phase),
        }
    }
}
