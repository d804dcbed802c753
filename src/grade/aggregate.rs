#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Score aggregation: folds dimension scores and stage penalties into
//! the final assessment. The result is always within `[0, total]`, and
//! every deduction is individually capped before it lands here.

use crate::{
    config::AssessmentConfig,
    grade::{
        compare::ComparisonReport,
        preprocess::PreprocessingReport,
        results::{
            DimensionBreakdown, FinalAssessment, Grade, PenaltyBreakdown, ScoringResult,
        },
        validation::ValidationReport,
    },
    rubric::Rubric,
};

/// Folds stage outputs into a [`FinalAssessment`].
pub struct ScoreAggregator {
    /// Threshold bundle, for penalty weights and the baseline score.
    config: AssessmentConfig,
}

impl ScoreAggregator {
    /// Creates an aggregator with the given thresholds.
    pub fn new(config: AssessmentConfig) -> Self {
        Self { config }
    }

    /// Produces the final assessment for one submission. `comparison`
    /// is `None` when no reference solution was configured.
    pub fn aggregate(
        &self,
        submission: &str,
        rubric: &Rubric,
        scoring: &ScoringResult,
        validation: &ValidationReport,
        preprocessing: &PreprocessingReport,
        comparison: Option<&ComparisonReport>,
    ) -> FinalAssessment {
        let mut any_dimension_missing = false;
        let mut weighted_total = 0.0;
        let mut dimensions = Vec::with_capacity(rubric.dimensions().len());

        for dim in rubric.dimensions() {
            let score = match scoring.scores.get(dim.name()) {
                Some(score) => score.clamp(0.0, 100.0),
                None => {
                    any_dimension_missing = true;
                    self.config.baseline_dimension_score()
                }
            };

            let earned = score / 100.0 * dim.max_points();
            weighted_total += earned;

            dimensions.push(
                DimensionBreakdown::builder()
                    .dimension(dim.name())
                    .score(score)
                    .points(Grade::new(earned, dim.max_points()))
                    .build(),
            );
        }

        let mut penalties = Vec::new();
        let mut deducted = 0.0;

        let validation_points = validation.penalty / 100.0 * rubric.total_points();
        if validation_points > 0.0 {
            deducted += validation_points;
            penalties.push(
                PenaltyBreakdown::builder()
                    .source("Completion validation")
                    .points(validation_points)
                    .reason(format!(
                        "{} issue{} found",
                        validation.flags.len(),
                        if validation.flags.len() == 1 { "" } else { "s" }
                    ))
                    .build(),
            );
        }

        if preprocessing.penalty > 0.0 {
            deducted += preprocessing.penalty;
            penalties.push(
                PenaltyBreakdown::builder()
                    .source("Defect preprocessing")
                    .points(preprocessing.penalty)
                    .reason(format!(
                        "{} fix{} applied",
                        preprocessing.fixes.len(),
                        if preprocessing.fixes.len() == 1 { "" } else { "es" }
                    ))
                    .build(),
            );
        }

        if let Some(report) = comparison {
            let comparison_points = report.penalty(self.config.comparison_weight());
            if comparison_points > 0.0 {
                deducted += comparison_points;
                penalties.push(
                    PenaltyBreakdown::builder()
                        .source("Output comparison")
                        .points(comparison_points)
                        .reason(report.summary())
                        .build(),
                );
            }
        }

        let total = (weighted_total - deducted).clamp(0.0, rubric.total_points());

        FinalAssessment::builder()
            .submission(submission)
            .rubric_title(rubric.title())
            .total(Grade::new(total, rubric.total_points()))
            .dimensions(dimensions)
            .penalties(penalties)
            .feedback(scoring.feedback.clone())
            .flags(validation.summaries())
            .fixes(preprocessing.summaries())
            .maybe_comparison(comparison.map(ComparisonReport::summary))
            .maybe_match_ratio(comparison.and_then(ComparisonReport::match_ratio))
            .manual_review(scoring.needs_manual_review() || any_dimension_missing)
            .build()
    }
}
