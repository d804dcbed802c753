#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::BTreeMap, fmt::Display};

use bon::Builder;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize)]
/// A struct representing a grade
pub struct Grade {
    /// The actual grade received
    #[builder(getter)]
    pub grade:  f64,
    /// The maximum grade possible
    #[builder(getter)]
    pub out_of: f64,
}

impl Grade {
    /// Creates a new grade -
    /// * `grade` - The actual grade received
    /// * `out_of` - The maximum grade possible
    pub fn new(grade: f64, out_of: f64) -> Self {
        Self { grade, out_of }
    }
}

impl Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}/{:.2}", self.grade, self.out_of)
    }
}

/// The three feedback sections every assessment reports.
#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize)]
#[builder(on(String, into))]
pub struct FeedbackSections {
    /// Concrete things the submission does well.
    #[builder(default)]
    pub strengths:       Vec<String>,
    /// Concrete shortcomings, tied to cells or outputs.
    #[builder(default)]
    pub gaps:            Vec<String>,
    /// Actionable next steps for the student.
    #[builder(default)]
    pub recommendations: Vec<String>,
}

impl FeedbackSections {
    /// Returns true when every section is empty.
    pub fn is_empty(&self) -> bool {
        self.strengths.is_empty() && self.gaps.is_empty() && self.recommendations.is_empty()
    }

    /// Returns canned feedback used when nothing usable could be
    /// recovered from a scoring response.
    pub fn placeholder() -> Self {
        Self {
            strengths:       vec![
                "The submission was received and assessed; see the score breakdown above.".to_string(),
            ],
            gaps:            vec![
                "Detailed feedback could not be generated for this submission.".to_string(),
            ],
            recommendations: vec![
                "Review the score breakdown and ask course staff for a manual review if anything looks off."
                    .to_string(),
            ],
        }
    }

    /// Replaces any empty section with its placeholder counterpart so
    /// rendered feedback never has holes.
    pub fn fill_empty_sections(mut self) -> Self {
        let canned = Self::placeholder();
        if self.strengths.is_empty() {
            self.strengths = canned.strengths;
        }
        if self.gaps.is_empty() {
            self.gaps = canned.gaps;
        }
        if self.recommendations.is_empty() {
            self.recommendations = canned.recommendations;
        }
        self
    }
}

impl Display for FeedbackSections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        /// Writes one titled bullet list.
        fn section(
            f: &mut std::fmt::Formatter<'_>,
            title: &str,
            lines: &[String],
        ) -> std::fmt::Result {
            writeln!(f, "### {title}")?;
            for line in lines {
                writeln!(f, "- {line}")?;
            }
            writeln!(f)
        }

        section(f, "Strengths", &self.strengths)?;
        section(f, "Gaps", &self.gaps)?;
        section(f, "Recommendations", &self.recommendations)
    }
}

/// Outcome of the scoring stage: per-dimension scores on a 0-100 scale
/// plus sectioned feedback.
#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize)]
pub struct ScoringResult {
    /// Dimension name to reported score, 0-100.
    #[builder(default)]
    pub scores:   BTreeMap<String, f64>,
    /// Sectioned feedback recovered from the response.
    #[builder(default)]
    pub feedback: FeedbackSections,
    /// True when the service was unreachable and baseline scores were
    /// substituted.
    #[builder(default)]
    pub degraded: bool,
    /// True when scores were salvaged from a malformed response rather
    /// than parsed from the structured layout.
    #[builder(default)]
    pub salvaged: bool,
}

impl ScoringResult {
    /// Returns true when this result should send the submission to a
    /// human reviewer.
    pub fn needs_manual_review(&self) -> bool {
        self.degraded || self.salvaged
    }
}

#[derive(Tabled, Debug, Clone, Default, Builder, Serialize, Deserialize)]
#[builder(on(String, into))]
/// One rubric dimension's contribution to the final score.
pub struct DimensionBreakdown {
    #[tabled(rename = "Dimension")]
    /// Rubric dimension name.
    #[builder(getter)]
    pub dimension: String,
    #[tabled(rename = "Score (0-100)")]
    /// Score reported for the dimension, 0-100.
    #[builder(default)]
    pub score:     f64,
    #[tabled(rename = "Points")]
    /// Weighted points earned out of the dimension maximum.
    #[builder(default)]
    pub points:    Grade,
}

#[derive(Tabled, Debug, Clone, Default, Builder, Serialize, Deserialize)]
#[builder(on(String, into))]
/// One deduction applied on top of the weighted dimension scores.
pub struct PenaltyBreakdown {
    #[tabled(rename = "Penalty")]
    /// Which pipeline stage produced the deduction.
    #[builder(getter)]
    pub source: String,
    #[tabled(rename = "Points")]
    /// Points deducted.
    #[builder(default)]
    pub points: f64,
    #[tabled(rename = "Reason")]
    /// Why the deduction was applied.
    pub reason: String,
}

#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize)]
#[builder(on(String, into))]
/// The terminal result of assessing one submission.
pub struct FinalAssessment {
    /// Unique assessment identifier.
    #[builder(default = uuid::Uuid::new_v4().to_string())]
    pub id:            String,
    /// Submission identifier (notebook file stem).
    #[builder(getter)]
    pub submission:    String,
    /// Title of the rubric the submission was scored against.
    pub rubric_title:  String,
    /// Final points out of the rubric total.
    #[builder(default)]
    pub total:         Grade,
    /// Per-dimension score breakdown.
    #[builder(default)]
    pub dimensions:    Vec<DimensionBreakdown>,
    /// Deductions applied on top of the weighted scores.
    #[builder(default)]
    pub penalties:     Vec<PenaltyBreakdown>,
    /// Sectioned feedback for the student.
    #[builder(default)]
    pub feedback:      FeedbackSections,
    /// Completion issues observed during validation.
    #[builder(default)]
    pub flags:         Vec<String>,
    /// Defect fixes applied during preprocessing.
    #[builder(default)]
    pub fixes:         Vec<String>,
    /// One-line summary of the output comparison, if it ran.
    pub comparison:    Option<String>,
    /// Fraction of reference outputs that matched; `None` when no
    /// reference was configured or the comparison was skipped.
    pub match_ratio:   Option<f64>,
    /// True when a human should double-check this assessment.
    #[builder(default)]
    pub manual_review: bool,
}

impl FinalAssessment {
    /// Returns the final score as a fraction of the rubric total, 0-100.
    pub fn percentage(&self) -> f64 {
        if self.total.out_of <= 0.0 {
            return 0.0;
        }
        self.total.grade / self.total.out_of * 100.0
    }
}
