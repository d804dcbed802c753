#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Batch grading: runs one independent pipeline per discovered
//! submission, concurrently, each under its own deadline. One
//! submission failing or timing out never affects the others.

use std::{path::Path, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use futures::{StreamExt, stream::FuturesUnordered};

use crate::{
    grade::{pipeline::AssessmentPipeline, results::FinalAssessment},
    util,
};

/// How one submission's pipeline run ended.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The pipeline produced an assessment.
    Assessed(Box<FinalAssessment>),
    /// The submission could not be parsed.
    ParseFailed(String),
    /// The pipeline was abandoned at the per-submission deadline.
    DeadlineExceeded,
}

impl BatchOutcome {
    /// Returns the produced assessment, if any.
    pub fn assessment(&self) -> Option<&FinalAssessment> {
        match self {
            BatchOutcome::Assessed(assessment) => Some(assessment),
            _ => None,
        }
    }

    /// Returns a one-line status for the batch summary.
    pub fn status_line(&self) -> String {
        match self {
            BatchOutcome::Assessed(assessment) => format!("{}", assessment.total),
            BatchOutcome::ParseFailed(reason) => format!("not graded: {reason}"),
            BatchOutcome::DeadlineExceeded => "abandoned at deadline".to_string(),
        }
    }
}

/// One submission's entry in the batch summary.
#[derive(Debug)]
pub struct BatchEntry {
    /// Submission identifier (notebook file stem).
    pub submission: String,
    /// Path the notebook was read from.
    pub path:       PathBuf,
    /// How the run ended.
    pub outcome:    BatchOutcome,
}

/// Everything a batch run produced, in submission order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Per-submission entries, sorted by submission id.
    pub entries: Vec<BatchEntry>,
}

impl BatchSummary {
    /// Returns the number of submissions that produced an assessment.
    pub fn assessed(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome.assessment().is_some())
            .count()
    }

    /// Returns the number of submissions that did not.
    pub fn failed(&self) -> usize {
        self.entries.len() - self.assessed()
    }
}

/// Drives concurrent pipeline runs over a directory of submissions.
pub struct BatchRunner {
    /// The shared, read-only pipeline every run uses.
    pipeline: Arc<AssessmentPipeline>,
    /// Per-submission wall-clock deadline.
    deadline: Duration,
}

impl BatchRunner {
    /// Creates a runner over `pipeline` with the given per-submission
    /// deadline.
    pub fn new(pipeline: AssessmentPipeline, deadline: Duration) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            deadline,
        }
    }

    /// Discovers notebooks under `root` and assesses each one. Returns
    /// an entry per discovered notebook, whatever its outcome.
    pub async fn run(&self, root: &Path) -> Result<BatchSummary> {
        let paths = util::find_notebooks(root)
            .with_context(|| format!("Could not scan {} for notebooks", root.display()))?;

        if paths.is_empty() {
            bail!("No notebooks found under {}", root.display());
        }

        tracing::info!("assessing {} submission(s) under {}", paths.len(), root.display());

        let mut tasks = paths
            .into_iter()
            .map(|path| {
                let pipeline = Arc::clone(&self.pipeline);
                let deadline = self.deadline;
                tokio::spawn(async move {
                    let outcome =
                        match tokio::time::timeout(deadline, pipeline.assess_path(&path)).await {
                            Ok(Ok(assessment)) => BatchOutcome::Assessed(Box::new(assessment)),
                            Ok(Err(err)) => BatchOutcome::ParseFailed(err.to_string()),
                            Err(_) => BatchOutcome::DeadlineExceeded,
                        };

                    BatchEntry {
                        submission: util::submission_id(&path),
                        path,
                        outcome,
                    }
                })
            })
            .collect::<FuturesUnordered<_>>();

        let mut entries = Vec::new();
        while let Some(joined) = tasks.next().await {
            let entry = joined.context("A grading task panicked")?;
            if let BatchOutcome::ParseFailed(reason) = &entry.outcome {
                tracing::warn!("{}: {}", entry.submission, reason);
            }
            entries.push(entry);
        }

        entries.sort_by(|a, b| a.submission.cmp(&b.submission));
        Ok(BatchSummary { entries })
    }
}
