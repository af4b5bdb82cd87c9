//! Block model: pipe tables and checkbox lists.
//!
//! ```text
//! table     := header separator row*
//! header    := '|' cell ('|' cell)* '|'
//! separator := '|' ('-' | ':' | ' ' | '|')+        (must contain '-')
//! checklist := item+
//! item      := ('-' | '*') ' [' (' ' | 'x' | 'X') '] ' label
//! ```
//!
//! A `\|` inside a cell is a literal pipe.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

static CHECK_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-*]\s+\[([ xX])\]\s?(.*)$").expect("valid checklist regex"));

// ============================================================================
// TABLE
// ============================================================================

/// One table row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Row {
    cells: BTreeMap<String, String>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from (column, value) pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, String)>) -> Self {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Cell value; missing cells read as empty.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    /// First non-empty value among alternative column names.
    pub fn get_any(&self, columns: &[&str]) -> &str {
        columns
            .iter()
            .map(|c| self.get(c))
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }

    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        self.cells.insert(column.to_string(), value.into());
    }
}

/// A parsed pipe table: ordered columns and ordered rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    #[serde(rename = "headers")]
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// First column among `candidates` that the table actually has.
    pub fn resolve_column<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        candidates.iter().copied().find(|c| self.has_column(c))
    }

    pub fn find_row_mut(&mut self, column: &str, value: &str) -> Option<&mut Row> {
        self.rows.iter_mut().find(|r| r.get(column) == value)
    }

    /// Deterministic text form; see [`crate::printer::serialize_table`].
    pub fn render(&self) -> String {
        crate::printer::serialize_table(&self.columns, &self.rows)
    }

    /// Parse the lines of a table block. Returns `None` when the block is
    /// malformed (missing or invalid separator).
    pub fn from_lines(lines: &[String]) -> Option<Table> {
        let (header, rest) = lines.split_first()?;
        let (separator, body) = rest.split_first()?;
        if !is_separator(separator) {
            return None;
        }
        let columns = split_cells(header);
        if columns.is_empty() {
            return None;
        }
        let rows = body
            .iter()
            .map(|line| {
                let cells = split_cells(line);
                let mut row = Row::new();
                for (idx, column) in columns.iter().enumerate() {
                    row.set(column, cells.get(idx).cloned().unwrap_or_default());
                }
                row
            })
            .collect();
        Some(Table { columns, rows })
    }
}

/// True for a line that belongs to a table block.
pub(crate) fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

/// Split a row into trimmed cells, honouring `\|` escapes.
fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    // Text after the last pipe only counts when the row lacks a closing pipe.
    if !current.trim().is_empty() {
        cells.push(current.trim().to_string());
    }
    cells
}

// ============================================================================
// CHECKLIST
// ============================================================================

/// One checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckItem {
    pub label: String,
    pub checked: bool,
}

impl CheckItem {
    pub fn new(label: &str, checked: bool) -> Self {
        Self {
            label: label.to_string(),
            checked,
        }
    }
}

/// An ordered checkbox list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Checklist {
    pub items: Vec<CheckItem>,
}

impl Checklist {
    pub fn render(&self) -> String {
        crate::printer::serialize_checklist(self)
    }

    pub fn from_lines(lines: &[String]) -> Option<Checklist> {
        let items: Vec<CheckItem> = lines.iter().filter_map(|l| parse_check_item(l)).collect();
        if items.is_empty() || items.len() != lines.len() {
            return None;
        }
        Some(Checklist { items })
    }
}

pub(crate) fn is_check_line(line: &str) -> bool {
    CHECK_ITEM.is_match(line)
}

fn parse_check_item(line: &str) -> Option<CheckItem> {
    let caps = CHECK_ITEM.captures(line)?;
    let checked = caps.get(1).is_some_and(|m| m.as_str().eq_ignore_ascii_case("x"));
    let label = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    Some(CheckItem::new(label, checked))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_table_block() {
        let table = Table::from_lines(&lines(
            "| ID | Role | Status |\n|----|------|--------|\n| α | architect | ⏳ Pending |",
        ))
        .unwrap();
        assert_eq!(table.columns, vec!["ID", "Role", "Status"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].get("Role"), "architect");
    }

    #[test]
    fn test_missing_cells_read_empty() {
        let table = Table::from_lines(&lines("| A | B |\n|---|---|\n| 1 |")).unwrap();
        assert_eq!(table.rows[0].get("A"), "1");
        assert_eq!(table.rows[0].get("B"), "");
    }

    #[test]
    fn test_escaped_pipe_in_cell() {
        let table = Table::from_lines(&lines("| Cmd |\n|---|\n| a \\| b |")).unwrap();
        assert_eq!(table.rows[0].get("Cmd"), "a | b");
    }

    #[test]
    fn test_malformed_table_is_absent() {
        assert!(Table::from_lines(&lines("| A | B |\n| 1 | 2 |")).is_none());
        assert!(Table::from_lines(&lines("| A |")).is_none());
    }

    #[test]
    fn test_parse_checklist() {
        let list = Checklist::from_lines(&lines("- [ ] Phase 1 (Planning)\n- [x] Phase 2\n* [X] Phase 3")).unwrap();
        assert_eq!(list.items.len(), 3);
        assert!(!list.items[0].checked);
        assert_eq!(list.items[0].label, "Phase 1 (Planning)");
        assert!(list.items[1].checked);
        assert!(list.items[2].checked);
    }

    #[test]
    fn test_row_get_any_prefers_first_non_empty() {
        let row = Row::from_pairs([("Reported By", "α".to_string()), ("Reporter", String::new())]);
        assert_eq!(row.get_any(&["Reporter", "Reported By"]), "α");
    }

    #[test]
    fn test_table_serializes_as_headers_and_rows() {
        let table = Table::new(&["ID"]).with_rows(vec![Row::from_pairs([("ID", "α".to_string())])]);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["headers"][0], "ID");
        assert_eq!(json["rows"][0]["ID"], "α");
    }
}
