#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The assessment pipeline: parse, validate, preprocess, compare,
//! score, extract, aggregate. Once a submission parses, every stage
//! degrades rather than fails, so a parsed submission always yields a
//! final assessment.

use std::path::Path;

use anyhow::Result;

use crate::{
    config::{self, AssessmentConfig},
    grade::{
        aggregate::ScoreAggregator,
        compare::OutputComparator,
        context,
        extract::ResponseExtractor,
        preprocess::DefectPreprocessor,
        results::{FeedbackSections, FinalAssessment, ScoringResult},
        review::ScoringClient,
        validation::CompletionValidator,
    },
    notebook::{self, Artifact, NotebookError},
    rubric::Rubric,
    util,
};

/// Runs the full assessment sequence for submissions against one
/// rubric, and optionally one reference solution.
pub struct AssessmentPipeline {
    /// Threshold bundle shared by every stage.
    config:       AssessmentConfig,
    /// Rubric submissions are scored against.
    rubric:       Rubric,
    /// Reference solution, when one is configured. Drives the output
    /// comparison and is rendered into the scoring request.
    reference:    Option<Artifact>,
    /// Comparator against the reference solution, when one is
    /// configured.
    comparator:   Option<OutputComparator>,
    /// Scoring client, when a service is configured.
    client:       Option<ScoringClient>,
    /// Completion validator.
    validator:    CompletionValidator,
    /// Defect preprocessor.
    preprocessor: DefectPreprocessor,
    /// Response extractor.
    extractor:    ResponseExtractor,
    /// Score aggregator.
    aggregator:   ScoreAggregator,
}

impl AssessmentPipeline {
    /// Creates a pipeline with no reference solution and no scoring
    /// client. Scoring degrades to baseline scores until a client is
    /// attached.
    pub fn new(rubric: Rubric, config: AssessmentConfig) -> Result<Self> {
        Ok(Self {
            config,
            rubric,
            reference: None,
            comparator: None,
            client: None,
            validator: CompletionValidator::new(config),
            preprocessor: DefectPreprocessor::standard(&config)?,
            extractor: ResponseExtractor::new(config)?,
            aggregator: ScoreAggregator::new(config),
        })
    }

    /// Creates a pipeline from the global configuration, attaching the
    /// environment-configured scoring client when one is available.
    pub fn from_env(rubric: Rubric) -> Result<Self> {
        let config = config::assessment_defaults();
        let mut pipeline = Self::new(rubric, config)?;
        pipeline.client = ScoringClient::from_env(&config);
        if pipeline.client.is_none() {
            tracing::warn!("scoring service not configured; baseline scores will be substituted");
        }
        Ok(pipeline)
    }

    /// Attaches a reference solution. Its outputs are compared against
    /// the submission's, and it is sent along with the scoring request.
    pub fn with_reference(mut self, reference: Artifact) -> Self {
        self.comparator = Some(
            OutputComparator::builder()
                .reference(reference.clone())
                .config(self.config)
                .build(),
        );
        self.reference = Some(reference);
        self
    }

    /// Attaches a scoring client.
    pub fn with_client(mut self, client: ScoringClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Returns the rubric this pipeline scores against.
    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Reads, parses, and assesses the notebook at `path`. Parsing is
    /// the only stage that can fail.
    pub async fn assess_path(&self, path: &Path) -> Result<FinalAssessment, NotebookError> {
        let artifact = notebook::read_artifact(path)?;
        Ok(self.assess(&util::submission_id(path), &artifact).await)
    }

    /// Assesses an already-parsed submission.
    pub async fn assess(&self, submission: &str, artifact: &Artifact) -> FinalAssessment {
        let validation = self.validator.validate(artifact);

        let (preprocessed, preprocessing) = self.preprocessor.apply(artifact);

        let comparison = self
            .comparator
            .as_ref()
            .map(|comparator| comparator.compare(&preprocessed));

        let scoring = self.run_scoring(&preprocessed).await;

        self.aggregator.aggregate(
            submission,
            &self.rubric,
            &scoring,
            &validation,
            &preprocessing,
            comparison.as_ref(),
        )
    }

    /// Runs the scoring stage, substituting baseline scores whenever
    /// the service cannot produce a usable response.
    async fn run_scoring(&self, artifact: &Artifact) -> ScoringResult {
        let Some(client) = &self.client else {
            return self.baseline_scoring();
        };

        let messages =
            match context::scoring_messages(artifact, self.reference.as_ref(), &self.rubric) {
                Ok(messages) => messages,
                Err(err) => {
                    tracing::warn!(
                        "could not assemble scoring request ({err}); using baseline scores"
                    );
                    return self.baseline_scoring();
                }
            };

        match client.score(messages).await {
            Ok(raw) => self.extractor.extract(&raw, &self.rubric),
            Err(err) => {
                tracing::warn!("scoring unavailable ({err}); using baseline scores");
                self.baseline_scoring()
            }
        }
    }

    /// Builds the degraded scoring result: baseline scores for every
    /// dimension and placeholder feedback.
    fn baseline_scoring(&self) -> ScoringResult {
        let scores = self
            .rubric
            .dimension_names()
            .into_iter()
            .map(|name| (name, self.config.baseline_dimension_score()))
            .collect();

        ScoringResult::builder()
            .scores(scores)
            .feedback(FeedbackSections::placeholder())
            .degraded(true)
            .build()
    }
}
