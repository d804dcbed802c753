#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Output comparison: pairs a submission's captured outputs with the
//! reference solution's and decides equivalence numerically where both
//! sides carry numbers, textually otherwise.

use std::{fmt::Display, time::Instant};

use bon::Builder;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use crate::{config::AssessmentConfig, notebook::Artifact, parsers, util};

/// Ceiling on the diff text carried in a mismatch record.
const DIFF_DETAIL_LIMIT: usize = 1_000;

/// Why a comparison pass was skipped wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The submission's serialized form exceeded the size guard.
    SizeGuard,
    /// The pass exceeded its wall-clock budget.
    Timeout,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SkipReason::SizeGuard => "size guard",
            SkipReason::Timeout => "timeout",
        };
        write!(f, "{label}")
    }
}

/// How one output pair was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMethod {
    /// Both sides carried aligned numeric tokens.
    Numeric,
    /// Judged by normalized text similarity.
    Text,
    /// The submission had no output at this position.
    Missing,
}

/// Judgement for one reference output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    /// Position in the reference output sequence.
    pub index:   usize,
    /// Whether the pair was judged equivalent.
    pub matched: bool,
    /// How the pair was judged.
    pub method:  MatchMethod,
    /// Tolerance or diff detail; empty on matches.
    pub detail:  String,
}

/// Outcome of one comparison pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Per-pair judgements, in reference order.
    pub records: Vec<ComparisonRecord>,
    /// Set when the pass was skipped wholesale.
    pub skipped: Option<SkipReason>,
    /// Number of reference outputs considered.
    pub compared: usize,
    /// Number of pairs judged equivalent.
    pub matched: usize,
}

impl ComparisonReport {
    /// Returns the fraction of reference outputs that did not match.
    /// Zero when the pass was skipped or nothing was compared.
    pub fn mismatch_fraction(&self) -> f64 {
        if self.skipped.is_some() || self.compared == 0 {
            return 0.0;
        }
        (self.compared - self.matched) as f64 / self.compared as f64
    }

    /// Returns the fraction of reference outputs that matched, or
    /// `None` when the pass was skipped or nothing was compared.
    pub fn match_ratio(&self) -> Option<f64> {
        if self.skipped.is_some() || self.compared == 0 {
            return None;
        }
        Some(self.matched as f64 / self.compared as f64)
    }

    /// Returns the points deducted for mismatches given the points at
    /// stake.
    pub fn penalty(&self, weight: f64) -> f64 {
        self.mismatch_fraction() * weight
    }

    /// Returns a one-line summary for reports.
    pub fn summary(&self) -> String {
        match self.skipped {
            Some(reason) => format!("comparison skipped ({reason})"),
            None if self.compared == 0 => "reference has no captured outputs".to_string(),
            None => format!("{}/{} reference outputs matched", self.matched, self.compared),
        }
    }
}

/// Compares a submission's captured outputs against a reference
/// solution's.
#[derive(Clone, Builder)]
pub struct OutputComparator {
    /// Reference artifact outputs are compared against.
    #[builder(getter)]
    reference:           Artifact,
    /// Threshold bundle.
    #[builder(default)]
    config:              AssessmentConfig,
    /// Whether to ignore case differences in the text path.
    #[builder(default = false)]
    #[builder(getter)]
    ignore_case:         bool,
    /// Whether to preserve whitespace in the text path.
    #[builder(default = false)]
    #[builder(getter)]
    preserve_whitespace: bool,
}

impl OutputComparator {
    /// Compares `submission` against the reference and returns the
    /// per-pair judgements.
    pub fn compare(&self, submission: &Artifact) -> ComparisonReport {
        if submission.serialized_size() > self.config.size_guard_bytes() {
            return ComparisonReport {
                skipped: Some(SkipReason::SizeGuard),
                ..ComparisonReport::default()
            };
        }

        let started = Instant::now();
        let budget = self.config.compare_timeout();

        let reference_outputs = self.reference.captured_outputs();
        let submission_outputs = submission.captured_outputs();

        let mut records = Vec::with_capacity(reference_outputs.len());
        let mut skipped = None;

        for (index, expected) in reference_outputs.iter().enumerate() {
            if started.elapsed() >= budget {
                skipped = Some(SkipReason::Timeout);
                break;
            }

            let record = match submission_outputs.get(index) {
                Some(actual) => self.judge_pair(index, expected, actual),
                None => ComparisonRecord {
                    index,
                    matched: false,
                    method: MatchMethod::Missing,
                    detail: "submission has no output at this position".to_string(),
                },
            };
            records.push(record);
        }

        let compared = records.len();
        let matched = records.iter().filter(|record| record.matched).count();

        ComparisonReport {
            records,
            skipped,
            compared,
            matched,
        }
    }

    /// Judges one output pair, numerically when both sides carry
    /// aligned numeric tokens, textually otherwise.
    fn judge_pair(&self, index: usize, expected: &str, actual: &str) -> ComparisonRecord {
        let expected_nums = parsers::numeric_tokens(expected);
        let actual_nums = parsers::numeric_tokens(actual);

        if !expected_nums.is_empty() && expected_nums.len() == actual_nums.len() {
            return self.judge_numeric(index, &expected_nums, &actual_nums);
        }

        self.judge_text(index, expected, actual)
    }

    /// Judges aligned numeric token sequences under relative tolerance.
    fn judge_numeric(&self, index: usize, expected: &[f64], actual: &[f64]) -> ComparisonRecord {
        for (a, b) in expected.iter().zip(actual.iter()) {
            if !self.within_tolerance(*a, *b) {
                let denom = a.abs().max(b.abs());
                let percent = if denom > 0.0 {
                    (a - b).abs() / denom * 100.0
                } else {
                    0.0
                };
                return ComparisonRecord {
                    index,
                    matched: false,
                    method: MatchMethod::Numeric,
                    detail: format!("value {b} differs from expected {a} by {percent:.1}%"),
                };
            }
        }

        ComparisonRecord {
            index,
            matched: true,
            method: MatchMethod::Numeric,
            detail: String::new(),
        }
    }

    /// Judges one pair by normalized text similarity.
    fn judge_text(&self, index: usize, expected: &str, actual: &str) -> ComparisonRecord {
        let expected_normalized = self.normalize(expected);
        let actual_normalized = self.normalize(actual);

        if expected_normalized == actual_normalized {
            return ComparisonRecord {
                index,
                matched: true,
                method: MatchMethod::Text,
                detail: String::new(),
            };
        }

        let ratio =
            f64::from(TextDiff::from_chars(&expected_normalized, &actual_normalized).ratio());

        if ratio >= self.config.similarity_threshold() {
            return ComparisonRecord {
                index,
                matched: true,
                method: MatchMethod::Text,
                detail: String::new(),
            };
        }

        let mut detail = format!(
            "similarity {ratio:.2} below threshold\n{}",
            format_diff(expected, actual)
        );
        util::truncate_with_notice(&mut detail, DIFF_DETAIL_LIMIT);

        ComparisonRecord {
            index,
            matched: false,
            method: MatchMethod::Text,
            detail,
        }
    }

    /// Returns true when two values agree within the relative
    /// tolerance. Agreement is judged against the larger magnitude, and
    /// two exact zeros agree.
    fn within_tolerance(&self, a: f64, b: f64) -> bool {
        if a == b {
            return true;
        }
        let denom = a.abs().max(b.abs());
        if denom == 0.0 {
            return true;
        }
        (a - b).abs() / denom <= self.config.numeric_tolerance()
    }

    /// Normalizes a string for comparison.
    fn normalize(&self, s: &str) -> String {
        let mut result = s.to_string();

        if !self.preserve_whitespace {
            result = result.replace("\r\n", "\n");
            result = result
                .lines()
                .map(|l| l.trim_end())
                .collect::<Vec<_>>()
                .join("\n");
            result = result.trim().to_string();
        }

        if self.ignore_case {
            result = result.to_lowercase();
        }

        result
    }
}

/// Formats a diff between expected and actual output.
fn format_diff(expected: &str, actual: &str) -> String {
    let diff = TextDiff::from_lines(expected, actual);
    let mut output = String::new();

    for change in diff.iter_all_changes() {
        let prefix = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        output.push_str(&format!("{} {}", prefix, change));
    }

    output
}
