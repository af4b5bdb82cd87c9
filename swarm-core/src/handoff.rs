//! Handoff notes.
//!
//! Notes are append-only. A journal keeps them as concatenated text, one
//! `[timestamp] text` line per note (engine-written notes carry a
//! `(system)` tag after the timestamp); the canonical store keeps them as
//! table rows. Merges are a set union on the exact note text.

use crate::{flatten_text, format_timestamp, parse_timestamp, Timestamp};
use serde::{Deserialize, Serialize};

/// Author used for notes the engine writes on an agent's behalf.
pub const SYSTEM_AUTHOR: &str = "system";

const SYSTEM_TAG: &str = "(system)";

/// A single handoff note.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandoffNote {
    pub timestamp: Timestamp,
    pub author: String,
    pub text: String,
}

impl HandoffNote {
    pub fn new(timestamp: Timestamp, author: &str, text: &str) -> Self {
        Self {
            timestamp,
            author: author.to_string(),
            text: flatten_text(text),
        }
    }

    pub fn is_system(&self) -> bool {
        self.author == SYSTEM_AUTHOR
    }

    /// Render as a journal line.
    pub fn to_journal_line(&self) -> String {
        let ts = format_timestamp(&self.timestamp);
        if self.is_system() {
            format!("[{}] {} {}", ts, SYSTEM_TAG, self.text)
        } else {
            format!("[{}] {}", ts, self.text)
        }
    }

    /// Parse the concatenated notes of one journal.
    ///
    /// Lines without a leading `[timestamp]` are kept with `fallback` as
    /// their timestamp. Blank lines are skipped.
    pub fn parse_journal(author: &str, notes: &str, fallback: Timestamp) -> Vec<HandoffNote> {
        notes
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let parsed = line
                    .strip_prefix('[')
                    .and_then(|rest| rest.split_once(']'))
                    .and_then(|(ts, text)| parse_timestamp(ts).map(|ts| (ts, text.trim())));
                let (ts, text) = parsed.unwrap_or((fallback, line));
                match text.strip_prefix(SYSTEM_TAG) {
                    Some(rest) => HandoffNote::new(ts, SYSTEM_AUTHOR, rest),
                    None => HandoffNote::new(ts, author, text),
                }
            })
            .collect()
    }
}
