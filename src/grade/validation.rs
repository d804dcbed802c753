#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Completion validation: finds submission-readiness problems (nothing
//! executed, scaffolding left in place, errored outputs) and converts
//! them into a capped completion penalty.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{config::AssessmentConfig, notebook::Artifact};

/// Scaffolding markers instructors leave in executable template cells.
const PLACEHOLDER_MARKERS: &[&str] = &["YOUR CODE HERE", "raise NotImplementedError"];

/// Marker instructors leave in narrative prompt cells.
const PROMPT_MARKER: &str = "YOUR ANSWER HERE";

/// The kinds of completion issue the validator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    /// No executable cell in the document ever ran.
    NotExecuted,
    /// An executable cell still contains template scaffolding.
    PlaceholderStub,
    /// A narrative prompt was never answered.
    UnansweredPrompt,
    /// An executable cell's captured output contains an error.
    ErrorOutput,
    /// An executable cell has no source at all.
    EmptyCell,
}

impl IssueKind {
    /// Returns the completion penalty this issue carries, in percent.
    pub fn weight(&self) -> f64 {
        match self {
            IssueKind::NotExecuted => 50.0,
            IssueKind::PlaceholderStub => 5.0,
            IssueKind::UnansweredPrompt => 5.0,
            IssueKind::ErrorOutput => 3.0,
            IssueKind::EmptyCell => 2.0,
        }
    }
}

impl Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            IssueKind::NotExecuted => "not executed",
            IssueKind::PlaceholderStub => "placeholder stub",
            IssueKind::UnansweredPrompt => "unanswered prompt",
            IssueKind::ErrorOutput => "error output",
            IssueKind::EmptyCell => "empty cell",
        };
        write!(f, "{label}")
    }
}

/// One completion issue, tied to a cell where that makes sense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationFlag {
    /// What kind of issue was found.
    pub kind:       IssueKind,
    /// Document position of the offending cell; `None` for
    /// document-level issues.
    pub cell_index: Option<usize>,
    /// Short human-readable detail.
    pub detail:     String,
}

impl Display for ValidationFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cell_index {
            Some(index) => write!(f, "[cell {index}] {}: {}", self.kind, self.detail),
            None => write!(f, "{}: {}", self.kind, self.detail),
        }
    }
}

/// Everything the validator found, with the capped penalty already
/// computed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Issues in document order, document-level issues first.
    pub flags:   Vec<ValidationFlag>,
    /// Summed issue weights before the cap, percent.
    pub raw_sum: f64,
    /// Penalty after the cap, percent.
    pub penalty: f64,
}

impl ValidationReport {
    /// Returns true when no issues were found.
    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }

    /// Returns the completion level after penalties, percent.
    pub fn completion_percent(&self) -> f64 {
        100.0 - self.penalty
    }

    /// Returns one summary line per flag, for reports.
    pub fn summaries(&self) -> Vec<String> {
        self.flags.iter().map(ValidationFlag::to_string).collect()
    }
}

/// Scans an artifact for completion issues. Runs on the artifact as
/// parsed, before any preprocessing.
pub struct CompletionValidator {
    /// Threshold bundle, carried for the penalty cap.
    config: AssessmentConfig,
}

impl CompletionValidator {
    /// Creates a validator with the given thresholds.
    pub fn new(config: AssessmentConfig) -> Self {
        Self { config }
    }

    /// Validates `artifact` and returns the flags and capped penalty.
    pub fn validate(&self, artifact: &Artifact) -> ValidationReport {
        let mut flags = Vec::new();

        let executable: Vec<_> = artifact.executable_cells().collect();
        let any_executed = executable.iter().any(|(_, cell)| cell.executed());

        if executable.is_empty() {
            flags.push(ValidationFlag {
                kind:       IssueKind::NotExecuted,
                cell_index: None,
                detail:     "notebook has no executable cells".to_string(),
            });
        } else if !any_executed {
            flags.push(ValidationFlag {
                kind:       IssueKind::NotExecuted,
                cell_index: None,
                detail:     "no executable cell was ever run".to_string(),
            });
        }

        for (index, cell) in artifact.cells().iter().enumerate() {
            if cell.is_executable() {
                self.check_executable(index, cell, &mut flags);
                if cell.has_error() {
                    flags.push(ValidationFlag {
                        kind:       IssueKind::ErrorOutput,
                        cell_index: Some(index),
                        detail:     error_detail(cell),
                    });
                }
            } else if cell.source().contains(PROMPT_MARKER) {
                flags.push(ValidationFlag {
                    kind:       IssueKind::UnansweredPrompt,
                    cell_index: Some(index),
                    detail:     format!("`{PROMPT_MARKER}` left in place"),
                });
            }
        }

        let raw_sum: f64 = flags.iter().map(|flag| flag.kind.weight()).sum();
        let penalty = raw_sum.min(self.config.validation_cap());

        ValidationReport {
            flags,
            raw_sum,
            penalty,
        }
    }

    /// Flags scaffolding and empty sources in one executable cell.
    fn check_executable(
        &self,
        index: usize,
        cell: &crate::notebook::Cell,
        flags: &mut Vec<ValidationFlag>,
    ) {
        let source = cell.source();
        if source.trim().is_empty() {
            if cell.outputs().is_empty() {
                flags.push(ValidationFlag {
                    kind:       IssueKind::EmptyCell,
                    cell_index: Some(index),
                    detail:     "cell has no source".to_string(),
                });
            }
            return;
        }

        for marker in PLACEHOLDER_MARKERS {
            if source.contains(marker) {
                flags.push(ValidationFlag {
                    kind:       IssueKind::PlaceholderStub,
                    cell_index: Some(index),
                    detail:     format!("`{marker}` left in place"),
                });
                break;
            }
        }
    }
}

/// Builds the detail text for an errored cell from its first error
/// fragment.
fn error_detail(cell: &crate::notebook::Cell) -> String {
    cell.outputs()
        .iter()
        .find_map(|fragment| match fragment {
            crate::notebook::OutputFragment::Error { ename, .. } if !ename.is_empty() => {
                Some(format!("cell raised {ename}"))
            }
            crate::notebook::OutputFragment::Error { .. } => {
                Some("cell raised an error".to_string())
            }
            _ => None,
        })
        .unwrap_or_else(|| "cell raised an error".to_string())
}
