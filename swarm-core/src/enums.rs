//! Enum types for swarm entities

use crate::status_words;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// RESOURCE KIND
// ============================================================================

/// Discriminator naming what a `NotFound` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Manifest,
    Section,
    Table,
    Checklist,
    Agent,
    Journal,
    Claim,
    Phase,
    RegistryEntry,
    PendingWrite,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Manifest => "manifest",
            ResourceKind::Section => "section",
            ResourceKind::Table => "table",
            ResourceKind::Checklist => "checklist",
            ResourceKind::Agent => "agent",
            ResourceKind::Journal => "journal",
            ResourceKind::Claim => "claim",
            ResourceKind::Phase => "phase",
            ResourceKind::RegistryEntry => "registry entry",
            ResourceKind::PendingWrite => "pending write",
        };
        f.write_str(name)
    }
}

// ============================================================================
// CLAIM STATUS
// ============================================================================

/// Status of a file claim.
///
/// Only `Active` is non-terminal: at most one `Active` claim may exist per
/// file path within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ClaimStatus {
    Active,
    Done,
    Abandoned,
    Transferred,
}

impl ClaimStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, ClaimStatus::Active)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Bare keyword without decoration.
    pub fn keyword(&self) -> &'static str {
        match self {
            ClaimStatus::Active => "Active",
            ClaimStatus::Done => "Done",
            ClaimStatus::Abandoned => "Abandoned",
            ClaimStatus::Transferred => "Transferred",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = match self {
            ClaimStatus::Active => "🔄",
            ClaimStatus::Done => "✅",
            ClaimStatus::Abandoned => "⚪",
            ClaimStatus::Transferred => "🔀",
        };
        write!(f, "{} {}", icon, self.keyword())
    }
}

/// Error when parsing an invalid claim status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimStatusParseError(pub String);

impl fmt::Display for ClaimStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid claim status: {}", self.0)
    }
}

impl std::error::Error for ClaimStatusParseError {}

impl FromStr for ClaimStatus {
    type Err = ClaimStatusParseError;

    /// Lenient: matches a whole keyword anywhere in the text, ignoring case
    /// and any emoji decoration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words = status_words(s);
        let has = |keyword: &str| words.iter().any(|w| w == keyword);
        if has("not") {
            Err(ClaimStatusParseError(s.to_string()))
        } else if has("transferred") {
            Ok(ClaimStatus::Transferred)
        } else if has("abandoned") {
            Ok(ClaimStatus::Abandoned)
        } else if has("done") || has("released") {
            Ok(ClaimStatus::Done)
        } else if has("active") {
            Ok(ClaimStatus::Active)
        } else {
            Err(ClaimStatusParseError(s.to_string()))
        }
    }
}

impl From<ClaimStatus> for String {
    fn from(status: ClaimStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for ClaimStatus {
    type Error = ClaimStatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// SUPERVISION MODE
// ============================================================================

/// How much the user wants to be involved while the swarm runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SupervisionMode {
    /// User reviews every gate and every blocker.
    #[default]
    Full,
    /// User only signs off on phase gates.
    Gates,
    /// Swarm runs to completion without asking.
    Auto,
}

impl SupervisionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisionMode::Full => "Full",
            SupervisionMode::Gates => "Gates",
            SupervisionMode::Auto => "Auto",
        }
    }

    /// Lenient parse; unknown text falls back to `Full`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for SupervisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupervisionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(SupervisionMode::Full),
            "gates" | "gate" | "checkpoints" => Ok(SupervisionMode::Gates),
            "auto" | "autonomous" | "none" => Ok(SupervisionMode::Auto),
            other => Err(format!("Invalid supervision mode: {}", other)),
        }
    }
}

// ============================================================================
// REGISTRY STATUS
// ============================================================================

/// Lifecycle of a swarm as seen by the cross-workspace registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistryStatus {
    #[default]
    Active,
    Completed,
    Failed,
}

impl fmt::Display for RegistryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistryStatus::Active => "active",
            RegistryStatus::Completed => "completed",
            RegistryStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}
