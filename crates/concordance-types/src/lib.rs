//! Records produced by a concordance scan.
//!
//! An [`Occurrence`] pins one keyword match to its line, the byte offset of
//! that line in the file, the column of the matched token, the untouched line
//! text and a word-count window of context on either side. A
//! [`KeywordEntry`] owns every occurrence of one normalized keyword in scan
//! order and keeps its frequency in lockstep with the list.
//!
//! Entries expose read-only accessors (no `pub` fields) so the
//! `count == occurrences.len()` invariant cannot be broken from outside.
//!
//! ```rust
//! use concordance_types::{KeywordEntry, Occurrence};
//!
//! let mut entry = KeywordEntry::new("fox");
//! entry
//!     .push(Occurrence {
//!         line_number: 1,
//!         byte_offset: 0,
//!         column: 16,
//!         line_text: "the quick brown fox".into(),
//!         context_before: "the quick brown".into(),
//!         context_after: String::new(),
//!     })
//!     .unwrap();
//! assert_eq!(entry.count(), 1);
//! assert_eq!(entry.occurrences()[0].before_words(), 3);
//! ```

use std::collections::TryReserveError;

use serde::Serialize;

/// Context radius used when the caller does not pick one.
pub const DEFAULT_CONTEXT_WORDS: usize = 10;

/// One keyword match with its position and surrounding context.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Occurrence {
    /// 1-based line number.
    #[serde(rename = "line")]
    pub line_number: u64,
    /// Byte offset of the start of the line within the file.
    #[serde(rename = "offset")]
    pub byte_offset: u64,
    /// Byte offset of the matched token within the line.
    pub column: usize,
    /// The line as read, without its terminator.
    pub line_text: String,
    pub context_before: String,
    pub context_after: String,
}

impl Occurrence {
    /// Number of context tokens preceding the match.
    pub fn before_words(&self) -> usize {
        self.context_before.split(' ').filter(|w| !w.is_empty()).count()
    }

    /// Number of context tokens following the match.
    pub fn after_words(&self) -> usize {
        self.context_after.split(' ').filter(|w| !w.is_empty()).count()
    }
}

/// A registered keyword and every occurrence recorded for it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct KeywordEntry {
    #[serde(skip)]
    keyword: String,
    #[serde(rename = "frequency")]
    count: usize,
    occurrences: Vec<Occurrence>,
}

impl KeywordEntry {
    /// Create an entry with no occurrences. `keyword` is expected to be
    /// normalized already.
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            count: 0,
            occurrences: Vec::new(),
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Occurrences in the order they were recorded.
    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// Append an occurrence, growing the list fallibly.
    ///
    /// On allocation failure the entry is left unchanged.
    pub fn push(&mut self, occurrence: Occurrence) -> Result<(), TryReserveError> {
        self.occurrences.try_reserve(1)?;
        self.occurrences.push(occurrence);
        self.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrence(line_number: u64, before: &str, after: &str) -> Occurrence {
        Occurrence {
            line_number,
            byte_offset: 0,
            column: 0,
            line_text: String::new(),
            context_before: before.to_string(),
            context_after: after.to_string(),
        }
    }

    #[test]
    fn count_tracks_pushed_occurrences() {
        let mut entry = KeywordEntry::new("error");
        assert_eq!(entry.count(), 0);
        assert!(entry.occurrences().is_empty());

        entry.push(occurrence(1, "", "")).unwrap();
        entry.push(occurrence(4, "", "")).unwrap();
        assert_eq!(entry.count(), 2);
        assert_eq!(entry.count(), entry.occurrences().len());
        assert_eq!(entry.occurrences()[1].line_number, 4);
    }

    #[test]
    fn counts_context_words() {
        let occ = occurrence(1, "quick brown", "");
        assert_eq!(occ.before_words(), 2);
        assert_eq!(occ.after_words(), 0);
    }

    #[test]
    fn serializes_without_keyword_field() {
        let mut entry = KeywordEntry::new("fox");
        entry.push(occurrence(3, "a \"quoted\"", "tail")).unwrap();
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["frequency"], 1);
        assert!(value.get("keyword").is_none());
        let occ = &value["occurrences"][0];
        assert_eq!(occ["line"], 3);
        assert_eq!(occ["offset"], 0);
        assert_eq!(occ["context_before"], "a \"quoted\"");
        assert_eq!(occ["context_after"], "tail");
    }
}
