//! Deterministic printer for manifest blocks.
//!
//! Output never carries a trailing newline; the document layer owns line
//! boundaries.

use crate::model::{Checklist, Row};

/// Render a pipe table.
///
/// ```text
/// | ID | Status |
/// |---|---|
/// | α | ✅ Done |
/// ```
///
/// An empty row set yields the header and separator only. Cells are escaped
/// so the output always parses back to the same values.
pub fn serialize_table<S: AsRef<str>>(columns: &[S], rows: &[Row]) -> String {
    if columns.is_empty() {
        return String::new();
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(render_row(columns.iter().map(|c| escape_cell(c.as_ref()))));
    lines.push(format!(
        "|{}|",
        columns.iter().map(|_| "---").collect::<Vec<_>>().join("|")
    ));
    for row in rows {
        lines.push(render_row(
            columns.iter().map(|c| escape_cell(row.get(c.as_ref()))),
        ));
    }
    lines.join("\n")
}

/// Render a checkbox list, one item per line.
pub fn serialize_checklist(list: &Checklist) -> String {
    list.items
        .iter()
        .map(|item| {
            let mark = if item.checked { 'x' } else { ' ' };
            format!("- [{}] {}", mark, flatten(&item.label))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_row(cells: impl Iterator<Item = String>) -> String {
    format!("| {} |", cells.collect::<Vec<_>>().join(" | "))
}

/// Escape a cell value: pipes become `\|`, line breaks become spaces.
pub fn escape_cell(value: &str) -> String {
    flatten(value).replace('|', "\\|")
}

fn flatten(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckItem, Table};

    #[test]
    fn test_serialize_headers_and_rows() {
        let rows = vec![Row::from_pairs([
            ("ID", "α".to_string()),
            ("Status", "✅ Done".to_string()),
        ])];
        let text = serialize_table(&["ID", "Status"], &rows);
        assert_eq!(text, "| ID | Status |\n|---|---|\n| α | ✅ Done |");
    }

    #[test]
    fn test_serialize_empty_rows() {
        let text = serialize_table(&["File", "Status"], &[]);
        assert_eq!(text.lines().count(), 2);
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_serialize_no_columns() {
        let empty: [&str; 0] = [];
        assert_eq!(serialize_table(&empty, &[]), "");
    }

    #[test]
    fn test_escaped_cells_parse_back() {
        let rows = vec![Row::from_pairs([("Cmd", "a | b\nc".to_string())])];
        let text = serialize_table(&["Cmd"], &rows);
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let table = Table::from_lines(&lines).unwrap();
        assert_eq!(table.rows[0].get("Cmd"), "a | b c");
    }

    #[test]
    fn test_serialize_checklist() {
        let list = Checklist {
            items: vec![CheckItem::new("Phase 1 (Planning)", true), CheckItem::new("Phase 2", false)],
        };
        assert_eq!(serialize_checklist(&list), "- [x] Phase 1 (Planning)\n- [ ] Phase 2");
    }
}
