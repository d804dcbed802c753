#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The assessment pipeline and its stages.

/// Score aggregation into the final assessment.
pub mod aggregate;
/// Concurrent grading of a directory of submissions.
pub mod batch;
/// Output comparison against a reference solution.
pub mod compare;
/// Prompt assembly for the scoring stage.
pub mod context;
/// Extraction and sanitization of scoring responses.
pub mod extract;
/// The per-submission pipeline driver.
pub mod pipeline;
/// Defect detection and repair.
pub mod preprocess;
/// Shared result types.
pub mod results;
/// The scoring-service client.
pub mod review;
/// Completion validation.
pub mod validation;

pub use aggregate::ScoreAggregator;
pub use batch::{BatchEntry, BatchOutcome, BatchRunner, BatchSummary};
pub use compare::{ComparisonReport, OutputComparator, SkipReason};
pub use extract::ResponseExtractor;
pub use pipeline::AssessmentPipeline;
pub use preprocess::{DefectCatalog, DefectPreprocessor, PreprocessingReport};
pub use results::{
    DimensionBreakdown, FeedbackSections, FinalAssessment, Grade, PenaltyBreakdown, ScoringResult,
};
pub use review::{ScoringBackend, ScoringClient, ScoringError};
pub use validation::{CompletionValidator, ValidationReport};
