//! In-memory verification history.
//!
//! The ledger is a bounded deque, newest first. It lives only as long as the
//! application state that owns it.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::verify::{format_similarity, VerificationOutcome, NOT_AVAILABLE};

/// Maximum number of retained entries.
pub const HISTORY_CAPACITY: usize = 20;

/// Verdict label recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeLabel {
    /// The service reported "Face matched".
    #[serde(rename = "Match")]
    Match,
    /// Anything else, including failures that reached the network.
    #[serde(rename = "No Match")]
    NoMatch,
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match => write!(f, "Match"),
            Self::NoMatch => write!(f, "No Match"),
        }
    }
}

/// One recorded verification attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Local wall-clock time the attempt completed.
    pub timestamp: DateTime<Local>,
    /// Verdict label.
    pub outcome: OutcomeLabel,
    /// Similarity score, if the service sent one.
    pub similarity: Option<f64>,
    /// Matched image reference, if the service sent one.
    pub matched_image: Option<String>,
}

impl HistoryEntry {
    /// Build an entry from an outcome completed at `timestamp`.
    #[must_use]
    pub fn from_outcome(outcome: &VerificationOutcome, timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            outcome: if outcome.is_matched() {
                OutcomeLabel::Match
            } else {
                OutcomeLabel::NoMatch
            },
            similarity: outcome.similarity(),
            matched_image: outcome.matched_image().map(str::to_string),
        }
    }

    /// Human-readable timestamp.
    #[must_use]
    pub fn display_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Similarity as `NN.NN%` or `N/A`.
    #[must_use]
    pub fn display_similarity(&self) -> String {
        format_similarity(self.similarity)
    }

    /// Matched image reference or `N/A`.
    #[must_use]
    pub fn display_matched_image(&self) -> &str {
        self.matched_image.as_deref().unwrap_or(NOT_AVAILABLE)
    }
}

/// Bounded, newest-first record of verification attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryLedger {
    entries: VecDeque<HistoryEntry>,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Prepend an entry, evicting the oldest past capacity.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        while self.entries.len() > HISTORY_CAPACITY {
            self.entries.pop_back();
        }
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
