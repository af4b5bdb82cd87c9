//! Line-level view of a manifest document.
//!
//! The document is kept as the exact list of lines produced by splitting on
//! `\n`, so rendering an unedited document reproduces the input byte for
//! byte. Sections are located by level-2 headings outside fenced code.

use crate::error::ManifestError;
use crate::model::{is_check_line, is_table_line, Checklist, Table};
use std::ops::Range;

/// Location of one `## ` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub title: String,
    /// Index of the heading line.
    pub start: usize,
    /// One past the last line of the section body.
    pub end: usize,
}

impl SectionSpan {
    fn body(&self) -> Range<usize> {
        (self.start + 1)..self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    // ========================================================================
    // SECTIONS
    // ========================================================================

    /// All level-2 sections in document order.
    pub fn sections(&self) -> Vec<SectionSpan> {
        let mut spans: Vec<SectionSpan> = Vec::new();
        let mut in_fence = false;
        for (idx, line) in self.lines.iter().enumerate() {
            if is_fence(line) {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            if let Some(level) = heading_level(line) {
                if let Some(open) = spans.last_mut() {
                    if open.end == usize::MAX {
                        open.end = idx;
                    }
                }
                if level == 2 {
                    spans.push(SectionSpan {
                        title: line.get(2..).unwrap_or("").trim().to_string(),
                        start: idx,
                        end: usize::MAX,
                    });
                }
            }
        }
        if let Some(open) = spans.last_mut() {
            if open.end == usize::MAX {
                open.end = self.lines.len();
            }
        }
        spans
    }

    pub fn section_names(&self) -> Vec<String> {
        self.sections().into_iter().map(|s| s.title).collect()
    }

    /// First section whose title matches, ignoring case and surrounding space.
    pub fn find_section(&self, name: &str) -> Option<SectionSpan> {
        let wanted = name.trim();
        self.sections()
            .into_iter()
            .find(|s| s.title.eq_ignore_ascii_case(wanted))
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.find_section(name).is_some()
    }

    /// Body text of a section with surrounding blank lines trimmed.
    pub fn section_text(&self, name: &str) -> Option<String> {
        let span = self.find_section(name)?;
        let body = &self.lines[span.body()];
        let first = body.iter().position(|l| !l.trim().is_empty());
        let last = body.iter().rposition(|l| !l.trim().is_empty());
        Some(match (first, last) {
            (Some(first), Some(last)) => body[first..=last].join("\n"),
            _ => String::new(),
        })
    }

    /// Append a new section at the end of the document.
    pub fn append_section(&mut self, title: &str, body: &str) {
        // Drop the trailing empty line left by a final '\n', re-add after.
        let had_trailing_newline = self.lines.last().is_some_and(|l| l.is_empty()) && self.lines.len() > 1;
        if had_trailing_newline {
            self.lines.pop();
        }
        while self.lines.last().is_some_and(|l| l.trim().is_empty()) && self.lines.len() > 1 {
            self.lines.pop();
        }
        if self.lines.len() == 1 && self.lines[0].is_empty() {
            self.lines.clear();
        }
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.lines.push(format!("## {}", title));
        if !body.is_empty() {
            self.lines.push(String::new());
            self.lines.extend(body.split('\n').map(str::to_string));
        }
        if had_trailing_newline {
            self.lines.push(String::new());
        }
    }

    // ========================================================================
    // TABLES
    // ========================================================================

    /// The first table in a section. Malformed tables are absent.
    pub fn get_table(&self, section: &str) -> Option<Table> {
        let span = self.find_section(section)?;
        let block = self.block(&span, is_table_line)?;
        Table::from_lines(&self.lines[block])
    }

    /// Replace the first table in a section, leaving every other line intact.
    pub fn replace_table(&mut self, section: &str, table: &Table) -> Result<(), ManifestError> {
        let span = self
            .find_section(section)
            .ok_or_else(|| ManifestError::SectionNotFound(section.to_string()))?;
        let block = self
            .block(&span, is_table_line)
            .ok_or_else(|| ManifestError::TableNotFound(section.to_string()))?;
        self.splice(block, &table.render());
        Ok(())
    }

    /// Insert `table` into a section that has none. Returns `false` when the
    /// section already holds a table, which is left as is.
    pub fn ensure_table(&mut self, section: &str, table: &Table) -> Result<bool, ManifestError> {
        let span = self
            .find_section(section)
            .ok_or_else(|| ManifestError::SectionNotFound(section.to_string()))?;
        if self.block(&span, is_table_line).is_some() {
            return Ok(false);
        }
        self.insert_block(&span, &table.render());
        Ok(true)
    }

    // ========================================================================
    // CHECKLISTS
    // ========================================================================

    pub fn get_checklist(&self, section: &str) -> Option<Checklist> {
        let span = self.find_section(section)?;
        let block = self.block(&span, is_check_line)?;
        Checklist::from_lines(&self.lines[block])
    }

    pub fn replace_checklist(
        &mut self,
        section: &str,
        list: &Checklist,
    ) -> Result<(), ManifestError> {
        let span = self
            .find_section(section)
            .ok_or_else(|| ManifestError::SectionNotFound(section.to_string()))?;
        let block = self
            .block(&span, is_check_line)
            .ok_or_else(|| ManifestError::ChecklistNotFound(section.to_string()))?;
        self.splice(block, &list.render());
        Ok(())
    }

    /// Replace the checklist in a section, inserting one if there is none.
    pub fn upsert_checklist(&mut self, section: &str, list: &Checklist) -> Result<(), ManifestError> {
        let span = self
            .find_section(section)
            .ok_or_else(|| ManifestError::SectionNotFound(section.to_string()))?;
        match self.block(&span, is_check_line) {
            Some(block) => self.splice(block, &list.render()),
            None if list.items.is_empty() => {}
            None => self.insert_block(&span, &list.render()),
        }
        Ok(())
    }

    /// Tick or untick the item whose label matches exactly (case-insensitive).
    /// Only the checkbox character changes.
    pub fn set_checked(
        &mut self,
        section: &str,
        label: &str,
        checked: bool,
    ) -> Result<(), ManifestError> {
        let span = self
            .find_section(section)
            .ok_or_else(|| ManifestError::SectionNotFound(section.to_string()))?;
        let block = self
            .block(&span, is_check_line)
            .ok_or_else(|| ManifestError::ChecklistNotFound(section.to_string()))?;
        let wanted = label.trim();
        for idx in block {
            let Some(item) = Checklist::from_lines(std::slice::from_ref(&self.lines[idx]))
                .and_then(|l| l.items.into_iter().next())
            else {
                continue;
            };
            if item.label.eq_ignore_ascii_case(wanted) {
                set_mark(&mut self.lines[idx], checked);
                return Ok(());
            }
        }
        Err(ManifestError::GateNotFound(wanted.to_string()))
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// First contiguous run of lines matching `is_member` inside a section
    /// body, skipping fenced code.
    fn block(&self, span: &SectionSpan, is_member: fn(&str) -> bool) -> Option<Range<usize>> {
        let mut in_fence = false;
        let mut start = None;
        for idx in span.body() {
            let line = &self.lines[idx];
            if is_fence(line) {
                if start.is_some() {
                    return start.map(|s| s..idx);
                }
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            match (start, is_member(line)) {
                (None, true) => start = Some(idx),
                (Some(s), false) => return Some(s..idx),
                _ => {}
            }
        }
        start.map(|s| s..span.end)
    }

    fn splice(&mut self, range: Range<usize>, text: &str) {
        let replacement: Vec<String> = if text.is_empty() {
            Vec::new()
        } else {
            text.split('\n').map(str::to_string).collect()
        };
        self.lines.splice(range, replacement);
    }

    /// Insert a block after the last non-blank line of a section body,
    /// keeping one blank line on each side.
    fn insert_block(&mut self, span: &SectionSpan, text: &str) {
        let body = span.body();
        let anchor = self.lines[body.clone()]
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .map(|offset| body.start + offset + 1)
            .unwrap_or(body.start);
        let trailing_blanks = span.end - anchor;

        let mut inserted = vec![String::new()];
        inserted.extend(text.split('\n').map(str::to_string));
        if trailing_blanks == 0 && anchor < self.lines.len() {
            inserted.push(String::new());
        }
        self.lines.splice(anchor..anchor, inserted);
    }
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Level of an ATX heading of depth one or two.
fn heading_level(line: &str) -> Option<u8> {
    if line.starts_with("## ") || line == "##" {
        Some(2)
    } else if line.starts_with("# ") || line == "#" {
        Some(1)
    } else {
        None
    }
}

fn set_mark(line: &mut String, checked: bool) {
    if let Some(open) = line.find('[') {
        let mark = if checked { "x" } else { " " };
        line.replace_range(open + 1..open + 2, mark);
    }
}
