//! Schema of the swarm manifest: section names, columns and typed views.

use crate::document::Document;
use crate::error::ManifestError;
use crate::model::{CheckItem, Checklist, Row, Table};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use swarm_core::{
    format_timestamp, normalize_phase, parse_timestamp, AgentSpec, AgentStatus, ClaimRecord,
    ClaimSource, ClaimStatus, HandoffNote, Issue, Session, SupervisionMode, Timestamp,
};

pub mod sections {
    pub const MISSION: &str = "Mission";
    pub const MODE: &str = "Mode";
    pub const AGENTS: &str = "Agents";
    pub const FILE_CLAIMS: &str = "File Claims";
    pub const PHASE_GATES: &str = "Phase Gates";
    pub const ISSUES: &str = "Issues";
    pub const HANDOFF_NOTES: &str = "Handoff Notes";
}

pub mod columns {
    pub const ID: &str = "ID";
    pub const ROLE: &str = "Role";
    pub const MODEL: &str = "Model";
    pub const PHASE: &str = "Phase";
    pub const SCOPE: &str = "Scope";
    pub const STATUS: &str = "Status";

    pub const FILE: &str = "File";
    pub const CLAIMED_BY: &str = "Claimed By";
    /// Older manifests name the claimant column this way.
    pub const AGENT_ID: &str = "Agent ID";

    pub const SEVERITY: &str = "Severity";
    pub const AREA: &str = "Area";
    pub const DESCRIPTION: &str = "Description";
    pub const REPORTER: &str = "Reporter";

    pub const TIME: &str = "Time";
    pub const AUTHOR: &str = "Author";
    pub const NOTE: &str = "Note";

    pub const AGENTS: [&str; 6] = [ID, ROLE, MODEL, PHASE, SCOPE, STATUS];
    pub const CLAIMS: [&str; 3] = [FILE, CLAIMED_BY, STATUS];
    pub const ISSUES: [&str; 4] = [SEVERITY, AREA, DESCRIPTION, REPORTER];
    pub const NOTES: [&str; 3] = [TIME, AUTHOR, NOTE];

    pub const CLAIMANT_ALIASES: [&str; 3] = [CLAIMED_BY, AGENT_ID, "Agent"];
    pub const AREA_ALIASES: [&str; 3] = [AREA, "Area/File", "File/Area"];
    pub const REPORTER_ALIASES: [&str; 2] = [REPORTER, "Reported By"];
}

static SESSION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<!--\s*swarm-session:\s*([^\s>]+)\s*-->").expect("valid session marker regex")
});

static SUPERVISION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Supervision:\s*(\w+)").expect("valid supervision regex"));

fn supervision_in(line: &str) -> Option<SupervisionMode> {
    SUPERVISION_LINE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| SupervisionMode::parse_lenient(m.as_str()))
}

// ============================================================================
// TYPED VIEWS
// ============================================================================

/// One row of the Agents table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRow {
    pub id: String,
    pub role: String,
    pub model: String,
    pub phase: String,
    pub scope: String,
    /// Status cell as written; see [`AgentRow::status`].
    pub status_text: String,
}

impl AgentRow {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(columns::ID).to_string(),
            role: row.get(columns::ROLE).to_string(),
            model: row.get(columns::MODEL).to_string(),
            phase: row.get(columns::PHASE).to_string(),
            scope: row.get(columns::SCOPE).to_string(),
            status_text: row.get(columns::STATUS).to_string(),
        }
    }

    /// Parsed status; `None` for text no status keyword matches.
    pub fn status(&self) -> Option<AgentStatus> {
        self.status_text.parse().ok()
    }

    pub fn in_phase(&self, phase: &str) -> bool {
        normalize_phase(&self.phase) == normalize_phase(phase)
    }
}

/// One item of the Phase Gates checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseGate {
    pub label: String,
    /// Normalized phase token, e.g. `"2"` for `"Phase 2 (Implementation)"`.
    pub phase: String,
    pub checked: bool,
}

/// Lifecycle of one phase gate.
///
/// ```text
/// NotStarted ──(every assigned agent satisfies the gate)──→ Ready ──(check)──→ Checked
/// ```
///
/// A manual override may move a gate to or from `Checked` at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    NotStarted,
    Ready,
    Checked,
}

impl PhaseState {
    /// Derive the state from the gate box and the roster's statuses.
    /// An empty roster is never ready.
    pub fn evaluate<'a>(checked: bool, roster: impl IntoIterator<Item = Option<&'a AgentStatus>>) -> Self {
        if checked {
            return PhaseState::Checked;
        }
        let mut any = false;
        for status in roster {
            any = true;
            if !status.is_some_and(AgentStatus::satisfies_gate) {
                return PhaseState::NotStarted;
            }
        }
        if any {
            PhaseState::Ready
        } else {
            PhaseState::NotStarted
        }
    }
}

/// Content of an arbitrary section, as returned to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SectionView {
    Table(Table),
    Checklist(Checklist),
    Text { text: String },
}

// ============================================================================
// MANIFEST
// ============================================================================

/// Typed access to a swarm manifest document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    doc: Document,
}

impl Manifest {
    pub fn parse(text: &str) -> Self {
        Self {
            doc: Document::parse(text),
        }
    }

    pub fn render(&self) -> String {
        self.doc.render()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Initial manifest for a new session.
    pub fn template(session: &Session) -> Self {
        let mission = session.mission.trim();
        let text = format!(
            "<!-- swarm-session: {id} -->\n\
             # Swarm Manifest\n\
             \n\
             ## {mission_h}\n\
             \n\
             {mission}\n\
             \n\
             ## {mode_h}\n\
             \n\
             Supervision: {mode}\n\
             Started: {started}\n\
             \n\
             ## {agents_h}\n\
             \n\
             {agents}\n\
             \n\
             ## {claims_h}\n\
             \n\
             {claims}\n\
             \n\
             ## {gates_h}\n\
             \n\
             ## {issues_h}\n\
             \n\
             {issues}\n\
             \n\
             ## {notes_h}\n\
             \n\
             {notes}\n",
            id = session.session_id,
            mission_h = sections::MISSION,
            mission = if mission.is_empty() { "(none)" } else { mission },
            mode_h = sections::MODE,
            mode = session.supervision,
            started = format_timestamp(&session.created_at),
            agents_h = sections::AGENTS,
            agents = Table::new(&columns::AGENTS).render(),
            claims_h = sections::FILE_CLAIMS,
            claims = Table::new(&columns::CLAIMS).render(),
            gates_h = sections::PHASE_GATES,
            issues_h = sections::ISSUES,
            issues = Table::new(&columns::ISSUES).render(),
            notes_h = sections::HANDOFF_NOTES,
            notes = Table::new(&columns::NOTES).render(),
        );
        Self::parse(&text)
    }

    /// Session id from the leading marker comment.
    pub fn session_id(&self) -> Option<String> {
        self.doc
            .lines()
            .iter()
            .find_map(|l| SESSION_MARKER.captures(l))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Supervision mode from the `Supervision:` line of the Mode section;
    /// `Full` when absent. Documents without a Mode section are searched
    /// whole.
    pub fn supervision(&self) -> SupervisionMode {
        let found = match self.doc.section_text(sections::MODE) {
            Some(mode) => mode.lines().find_map(supervision_in),
            None => self.doc.lines().iter().find_map(|l| supervision_in(l)),
        };
        found.unwrap_or_default()
    }

    pub fn mission(&self) -> Option<String> {
        self.doc.section_text(sections::MISSION)
    }

    /// Table, checklist or plain text of a section.
    pub fn section(&self, name: &str) -> Option<SectionView> {
        if let Some(table) = self.doc.get_table(name) {
            return Some(SectionView::Table(table));
        }
        if let Some(list) = self.doc.get_checklist(name) {
            return Some(SectionView::Checklist(list));
        }
        self.doc
            .section_text(name)
            .map(|text| SectionView::Text { text })
    }

    // ========================================================================
    // AGENTS
    // ========================================================================

    pub fn agents(&self) -> Vec<AgentRow> {
        self.doc
            .get_table(sections::AGENTS)
            .map(|t| t.rows.iter().map(AgentRow::from_row).collect())
            .unwrap_or_default()
    }

    pub fn agent(&self, id: &str) -> Option<AgentRow> {
        self.agents().into_iter().find(|a| a.id == id)
    }

    pub fn agents_in_phase(&self, phase: &str) -> Vec<AgentRow> {
        self.agents().into_iter().filter(|a| a.in_phase(phase)).collect()
    }

    /// Append a row for a new agent with the given status.
    pub fn add_agent(&mut self, spec: &AgentSpec, status: &AgentStatus) -> Result<(), ManifestError> {
        let mut table = self.agents_table()?;
        let mut row = Row::new();
        row.set(columns::ID, spec.agent_id.as_str());
        row.set(columns::ROLE, spec.role.as_str());
        row.set(columns::MODEL, spec.model.as_str());
        row.set(columns::PHASE, spec.phase.as_str());
        row.set(columns::SCOPE, spec.scope.as_str());
        row.set(columns::STATUS, status.to_string());
        table.rows.push(row);
        self.doc.replace_table(sections::AGENTS, &table)
    }

    /// Rewrite the Status cell of one agent row.
    pub fn set_agent_status(&mut self, id: &str, status: &AgentStatus) -> Result<(), ManifestError> {
        let mut table = self.agents_table()?;
        let row = table
            .find_row_mut(columns::ID, id)
            .ok_or_else(|| ManifestError::RowNotFound {
                section: sections::AGENTS.to_string(),
                column: columns::ID.to_string(),
                value: id.to_string(),
            })?;
        row.set(columns::STATUS, status.to_string());
        self.doc.replace_table(sections::AGENTS, &table)
    }

    /// Set the status of every listed agent that has a row. Returns how many
    /// rows changed; unknown ids are ignored.
    pub fn apply_agent_statuses<'a>(
        &mut self,
        statuses: impl IntoIterator<Item = (&'a str, &'a AgentStatus)>,
    ) -> Result<usize, ManifestError> {
        let mut table = self.agents_table()?;
        let mut changed = 0;
        for (id, status) in statuses {
            if let Some(row) = table.find_row_mut(columns::ID, id) {
                let text = status.to_string();
                if row.get(columns::STATUS) != text {
                    row.set(columns::STATUS, text);
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.doc.replace_table(sections::AGENTS, &table)?;
        }
        Ok(changed)
    }

    fn agents_table(&self) -> Result<Table, ManifestError> {
        self.doc
            .get_table(sections::AGENTS)
            .ok_or_else(|| self.missing_table(sections::AGENTS))
    }

    // ========================================================================
    // PHASE GATES
    // ========================================================================

    pub fn phase_gates(&self) -> Vec<PhaseGate> {
        self.doc
            .get_checklist(sections::PHASE_GATES)
            .map(|list| {
                list.items
                    .into_iter()
                    .map(|item| PhaseGate {
                        phase: normalize_phase(&item.label),
                        label: item.label,
                        checked: item.checked,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn gate(&self, phase: &str) -> Option<PhaseGate> {
        let wanted = normalize_phase(phase);
        self.phase_gates().into_iter().find(|g| g.phase == wanted)
    }

    /// Tick or untick the gate for `phase`.
    pub fn set_gate(&mut self, phase: &str, checked: bool) -> Result<(), ManifestError> {
        let gate = self
            .gate(phase)
            .ok_or_else(|| ManifestError::GateNotFound(normalize_phase(phase)))?;
        self.doc.set_checked(sections::PHASE_GATES, &gate.label, checked)
    }

    /// Add an unchecked `Phase <n>` gate if the phase has none. Returns
    /// whether a gate was added.
    pub fn ensure_gate(&mut self, phase: &str) -> Result<bool, ManifestError> {
        let token = normalize_phase(phase);
        if token.is_empty() || self.gate(&token).is_some() {
            return Ok(false);
        }
        self.ensure_section(sections::PHASE_GATES);
        let mut list = self
            .doc
            .get_checklist(sections::PHASE_GATES)
            .unwrap_or_default();
        list.items.push(CheckItem::new(&format!("Phase {}", token), false));
        self.doc.upsert_checklist(sections::PHASE_GATES, &list)?;
        Ok(true)
    }

    /// Lowest phase whose gate is still unchecked.
    pub fn current_phase(&self) -> Option<PhaseGate> {
        let mut open: Vec<PhaseGate> = self.phase_gates().into_iter().filter(|g| !g.checked).collect();
        open.sort_by(|a, b| phase_order(&a.phase, &b.phase));
        open.into_iter().next()
    }

    // ========================================================================
    // FILE CLAIMS
    // ========================================================================

    /// Claims recorded directly in the File Claims table.
    pub fn claims(&self) -> Vec<ClaimRecord> {
        let Some(table) = self.doc.get_table(sections::FILE_CLAIMS) else {
            return Vec::new();
        };
        table
            .rows
            .iter()
            .filter_map(|row| {
                let status = row.get(columns::STATUS).parse::<ClaimStatus>().ok()?;
                Some(ClaimRecord {
                    agent_id: row.get_any(&columns::CLAIMANT_ALIASES).to_string(),
                    file: row.get(columns::FILE).to_string(),
                    status,
                    source: ClaimSource::Store,
                })
            })
            .collect()
    }

    /// Replace every row of the File Claims table.
    pub fn replace_claims(&mut self, claims: &[ClaimRecord]) -> Result<(), ManifestError> {
        let existing = self.doc.get_table(sections::FILE_CLAIMS);
        let claimant = existing
            .as_ref()
            .and_then(|t| t.resolve_column(&columns::CLAIMANT_ALIASES));
        let (mut table, claimant) = match (existing, claimant) {
            (Some(t), Some(c)) if t.has_column(columns::FILE) && t.has_column(columns::STATUS) => {
                (t, c)
            }
            _ => (Table::new(&columns::CLAIMS), columns::CLAIMED_BY),
        };
        table.rows = claims
            .iter()
            .map(|c| {
                let mut row = Row::new();
                row.set(columns::FILE, c.file.as_str());
                row.set(claimant, c.agent_id.as_str());
                row.set(columns::STATUS, c.status.to_string());
                row
            })
            .collect();
        self.put_table(sections::FILE_CLAIMS, &table)
    }

    // ========================================================================
    // ISSUES
    // ========================================================================

    pub fn issues(&self) -> Vec<Issue> {
        self.doc
            .get_table(sections::ISSUES)
            .map(|t| {
                t.rows
                    .iter()
                    .map(|row| {
                        Issue::new(
                            row.get(columns::SEVERITY),
                            row.get_any(&columns::AREA_ALIASES),
                            row.get(columns::DESCRIPTION),
                            row.get_any(&columns::REPORTER_ALIASES),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn replace_issues(&mut self, issues: &[Issue]) -> Result<(), ManifestError> {
        let mut table = self
            .doc
            .get_table(sections::ISSUES)
            .filter(|t| t.has_column(columns::DESCRIPTION))
            .unwrap_or_else(|| Table::new(&columns::ISSUES));
        let area = table.resolve_column(&columns::AREA_ALIASES).unwrap_or(columns::AREA);
        let reporter = table
            .resolve_column(&columns::REPORTER_ALIASES)
            .unwrap_or(columns::REPORTER);
        table.rows = issues
            .iter()
            .map(|issue| {
                let mut row = Row::new();
                row.set(columns::SEVERITY, issue.severity.as_str());
                row.set(area, issue.area.as_str());
                row.set(columns::DESCRIPTION, issue.description.as_str());
                row.set(reporter, issue.reporter.as_str());
                row
            })
            .collect();
        self.put_table(sections::ISSUES, &table)
    }

    // ========================================================================
    // HANDOFF NOTES
    // ========================================================================

    /// Notes from the Handoff Notes table. Rows with an unreadable time sort
    /// first.
    pub fn notes(&self) -> Vec<HandoffNote> {
        self.doc
            .get_table(sections::HANDOFF_NOTES)
            .map(|t| {
                t.rows
                    .iter()
                    .map(|row| {
                        let ts = parse_timestamp(row.get(columns::TIME)).unwrap_or_else(Timestamp::default);
                        HandoffNote::new(ts, row.get(columns::AUTHOR), row.get(columns::NOTE))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn replace_notes(&mut self, notes: &[HandoffNote]) -> Result<(), ManifestError> {
        let rows = notes
            .iter()
            .map(|note| {
                Row::from_pairs([
                    (columns::TIME, format_timestamp(&note.timestamp)),
                    (columns::AUTHOR, note.author.clone()),
                    (columns::NOTE, note.text.clone()),
                ])
            })
            .collect();
        let table = Table::new(&columns::NOTES).with_rows(rows);
        self.put_table(sections::HANDOFF_NOTES, &table)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Replace a section's table, creating the section or table if missing.
    fn put_table(&mut self, section: &str, table: &Table) -> Result<(), ManifestError> {
        self.ensure_section(section);
        if !self.doc.ensure_table(section, table)? {
            self.doc.replace_table(section, table)?;
        }
        Ok(())
    }

    fn ensure_section(&mut self, section: &str) {
        if !self.doc.has_section(section) {
            self.doc.append_section(section, "");
        }
    }

    fn missing_table(&self, section: &str) -> ManifestError {
        if self.doc.has_section(section) {
            ManifestError::TableNotFound(section.to_string())
        } else {
            ManifestError::SectionNotFound(section.to_string())
        }
    }
}

/// Numeric phases sort numerically, everything else after them by text.
fn phase_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
