/// Result types shared by the indexer, the mutator and the orchestrator.
///
/// Search side:
/// - [`Occurrence`]: one match inside one line
/// - [`FileMatches`]: every occurrence in one file, in line order
/// - [`SearchSummary`]: file-grouped matches for a whole batch
///
/// Replace side:
/// - [`MutationOutcome`]: the single terminal state of one file
/// - [`MutationSummary`]: one outcome per input file, in input order
///
/// Batch operations return an [`Aggregate`], which keeps "nothing found"
/// apart from "something was found" without resorting to empty collections.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::errors::FileFailure;

/// A single match of the search phrase within a line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    /// 1-based line number
    pub line_number: usize,
    /// The full line, or empty when line content was not requested
    pub line_content: String,
    /// Character index where the match starts
    pub start_index: usize,
    /// Character index of the last matched character (inclusive)
    pub end_index: usize,
}

/// All occurrences found in a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMatches {
    #[serde(rename = "file")]
    pub path: PathBuf,
    #[serde(rename = "lines")]
    pub occurrences: Vec<Occurrence>,
}

impl FileMatches {
    pub fn line_numbers(&self) -> Vec<usize> {
        self.occurrences.iter().map(|o| o.line_number).collect()
    }
}

/// Why a file was passed over without being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The classifier decided the file is binary
    NotText,
    /// Missing, not a regular file, or empty
    Invalid,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotText => f.write_str("not a text file"),
            SkipReason::Invalid => f.write_str("missing, empty or not a regular file"),
        }
    }
}

/// Terminal state of a replace pass over one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState {
    Succeeded { substitutions: usize },
    SkippedNotText,
    SkippedInvalid,
    Failed(String),
}

/// The outcome for one file, produced exactly once per file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub path: PathBuf,
    pub state: MutationState,
}

impl MutationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.state, MutationState::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.state, MutationState::Failed(_))
    }

    pub fn failure(&self) -> Option<FileFailure> {
        match &self.state {
            MutationState::Failed(reason) => Some(FileFailure {
                path: self.path.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

/// Per-file outcomes of a batch replace, in input order
#[derive(Debug, Clone, Default)]
pub struct MutationSummary {
    pub outcomes: Vec<MutationOutcome>,
}

impl MutationSummary {
    pub fn files_processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn files_changed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, MutationState::Succeeded { substitutions } if substitutions > 0))
            .count()
    }

    pub fn total_substitutions(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.state {
                MutationState::Succeeded { substitutions } => substitutions,
                _ => 0,
            })
            .sum()
    }

    pub fn files_skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o.state,
                    MutationState::SkippedNotText | MutationState::SkippedInvalid
                )
            })
            .count()
    }

    pub fn failures(&self) -> Vec<FileFailure> {
        self.outcomes.iter().filter_map(|o| o.failure()).collect()
    }

    /// Looks up the outcome for a path
    pub fn outcome_for(&self, path: &std::path::Path) -> Option<&MutationState> {
        self.outcomes
            .iter()
            .find(|o| o.path == path)
            .map(|o| &o.state)
    }
}

/// File-grouped search results for a batch, in traversal order
#[derive(Debug, Clone, Default)]
pub struct SearchSummary {
    /// Files with at least one occurrence
    pub results: Vec<FileMatches>,
    /// Files that could not be read
    pub failures: Vec<FileFailure>,
    /// Number of files handed to the batch
    pub files_searched: usize,
    /// Files passed over as binary or invalid
    pub files_skipped: usize,
}

impl SearchSummary {
    pub fn total_matches(&self) -> usize {
        self.results.iter().map(|r| r.occurrences.len()).sum()
    }

    pub fn files_with_matches(&self) -> usize {
        self.results.len()
    }

    /// Every occurrence, grouped by file then ordered by line and position
    pub fn occurrences(&self) -> impl Iterator<Item = (&PathBuf, &Occurrence)> {
        self.results
            .iter()
            .flat_map(|r| r.occurrences.iter().map(move |o| (&r.path, o)))
    }
}

/// Result of a batch run that completed without a fatal failure
#[derive(Debug, Clone)]
pub enum Aggregate<T> {
    /// At least one file produced a positive outcome or a recorded failure
    Found(T),
    /// Every file was skipped or had nothing to report
    NoResults,
}

impl<T> Aggregate<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Aggregate::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Aggregate::Found(value) => Some(value),
            Aggregate::NoResults => None,
        }
    }
}
