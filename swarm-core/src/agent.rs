//! Agent identity and status.
//!
//! # Status Transition Diagram
//!
//! ```text
//! Pending ──→ Active ──┬──→ Complete / Done
//!                      ├──→ Blocked ──→ Active
//!                      ├──→ Failed
//!                      └──→ Reassigned → <new id>
//! ```
//!
//! Statuses are persisted as decorated text (`"✅ Complete"`) and parsed
//! leniently, so hand-edited manifests keep working.

use crate::{status_words, SwarmError, SwarmResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// AGENT STATUS
// ============================================================================

/// Status of an agent within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(into = "String", try_from = "String")]
pub enum AgentStatus {
    #[default]
    Pending,
    Active,
    Complete,
    Done,
    Blocked,
    Failed,
    /// Scope handed to another agent; carries the successor id.
    Reassigned(String),
}

impl AgentStatus {
    /// Terminal in the glossary sense: the agent is no longer doing work.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentStatus::Complete | AgentStatus::Done | AgentStatus::Blocked | AgentStatus::Failed
        )
    }

    /// Whether this agent lets its phase gate close.
    ///
    /// `Failed` counts for gating though not for success accounting.
    /// `Blocked` does not: a blocked agent still owes its work.
    /// `Reassigned` does: the successor is gated in its place.
    pub fn satisfies_gate(&self) -> bool {
        matches!(
            self,
            AgentStatus::Complete
                | AgentStatus::Done
                | AgentStatus::Failed
                | AgentStatus::Reassigned(_)
        )
    }

    /// Completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, AgentStatus::Complete | AgentStatus::Done)
    }

    /// Bare keyword without decoration or successor.
    pub fn keyword(&self) -> &'static str {
        match self {
            AgentStatus::Pending => "Pending",
            AgentStatus::Active => "Active",
            AgentStatus::Complete => "Complete",
            AgentStatus::Done => "Done",
            AgentStatus::Blocked => "Blocked",
            AgentStatus::Failed => "Failed",
            AgentStatus::Reassigned(_) => "Reassigned",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Pending => write!(f, "⏳ Pending"),
            AgentStatus::Active => write!(f, "🔄 Active"),
            AgentStatus::Complete => write!(f, "✅ Complete"),
            AgentStatus::Done => write!(f, "✅ Done"),
            AgentStatus::Blocked => write!(f, "🚫 Blocked"),
            AgentStatus::Failed => write!(f, "❌ Failed"),
            AgentStatus::Reassigned(to) => write!(f, "🔀 Reassigned → {}", to),
        }
    }
}

/// Error when parsing an invalid agent status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatusParseError(pub String);

impl fmt::Display for AgentStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid agent status: {}", self.0)
    }
}

impl std::error::Error for AgentStatusParseError {}

impl FromStr for AgentStatus {
    type Err = AgentStatusParseError;

    /// Matches whole keywords, ignoring case and decoration. "Incomplete"
    /// and "not done" are rejected rather than read as finished.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s.split_once('→').or_else(|| s.split_once("->"));
        let words = status_words(split.map_or(s, |(head, _)| head));
        let has = |keyword: &str| words.iter().any(|w| w == keyword);
        if has("not") {
            return Err(AgentStatusParseError(s.to_string()));
        }
        if has("reassigned") {
            let target = split.map(|(_, to)| to.trim().to_string()).unwrap_or_default();
            return Ok(AgentStatus::Reassigned(target));
        }
        let in_progress = words.windows(2).any(|pair| pair[0] == "in" && pair[1] == "progress");
        let status = if has("pending") {
            AgentStatus::Pending
        } else if has("complete") || has("completed") {
            AgentStatus::Complete
        } else if has("done") {
            AgentStatus::Done
        } else if has("blocked") {
            AgentStatus::Blocked
        } else if has("failed") {
            AgentStatus::Failed
        } else if has("active") || in_progress {
            AgentStatus::Active
        } else {
            return Err(AgentStatusParseError(s.to_string()));
        };
        Ok(status)
    }
}

impl From<AgentStatus> for String {
    fn from(status: AgentStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for AgentStatus {
    type Error = AgentStatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// REGISTRATION
// ============================================================================

/// Check an agent id before it is written into a store row and a journal
/// name. Both must hold the same single-line text.
pub fn validate_agent_id(agent_id: &str) -> SwarmResult<&str> {
    if agent_id.trim().is_empty() {
        return Err(SwarmError::invalid("agent_id", "must not be empty"));
    }
    if agent_id.chars().any(char::is_control) {
        return Err(SwarmError::invalid("agent_id", "must not contain line breaks or control characters"));
    }
    if agent_id.trim() != agent_id {
        return Err(SwarmError::invalid("agent_id", "must not start or end with whitespace"));
    }
    Ok(agent_id)
}

/// Everything needed to register an agent for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub agent_id: String,
    pub role: String,
    pub model: String,
    pub phase: String,
    pub scope: String,
}

impl AgentSpec {
    pub fn new(agent_id: &str, role: &str, phase: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            role: role.to_string(),
            model: String::new(),
            phase: phase.to_string(),
            scope: String::new(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }
}

/// Fields a reassignment may override; `None` inherits from the source agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOverrides {
    pub role: Option<String>,
    pub model: Option<String>,
    pub phase: Option<String>,
    pub scope: Option<String>,
}

/// Reduce a phase label to its identifying token.
///
/// `"Phase 2 (Implementation)"`, `"phase 2"` and `"2"` all normalize to `"2"`.
pub fn normalize_phase(label: &str) -> String {
    let trimmed = label.trim();
    let rest = match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("phase") => &trimmed[5..],
        _ => trimmed,
    };
    rest.trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '#')
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, '(' | ':' | ')' | ','))
        .collect()
}
