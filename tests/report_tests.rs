//! Tests for assessment emission and batch grading.

use std::{fs, time::Duration};

use nbgrade::{
    config::AssessmentConfig,
    grade::{
        batch::{BatchOutcome, BatchRunner},
        pipeline::AssessmentPipeline,
    },
    report,
    rubric::Rubric,
};

const WORKED_NOTEBOOK: &str = r##"{
  "cells": [
    {"cell_type": "markdown", "source": "# Homework"},
    {"cell_type": "code", "source": "df.shape", "execution_count": 1,
     "outputs": [{"output_type": "execute_result", "data": {"text/plain": "(150, 4)"}}]}
  ]
}"##;

fn pipeline() -> AssessmentPipeline {
    AssessmentPipeline::new(Rubric::standard(), AssessmentConfig::default())
        .expect("build pipeline")
}

#[tokio::test]
async fn written_assessment_has_feedback_and_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let notebook_path = dir.path().join("alice_hw1.ipynb");
    fs::write(&notebook_path, WORKED_NOTEBOOK).expect("write notebook");

    let assessment = pipeline()
        .assess_path(&notebook_path)
        .await
        .expect("assess");

    let out_dir = dir.path().join("out");
    report::write_assessment(&assessment, &out_dir).expect("write reports");

    let feedback =
        fs::read_to_string(out_dir.join("alice_hw1_FEEDBACK.md")).expect("feedback file");
    assert!(feedback.contains("# Feedback:"));
    assert!(feedback.contains("### Strengths"));
    assert!(feedback.contains("### Gaps"));
    assert!(feedback.contains("### Recommendations"));

    let json = fs::read_to_string(out_dir.join("alice_hw1.json")).expect("json file");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(value["submission"], "alice_hw1");
    assert!(value["total"]["out_of"].as_f64().unwrap() > 0.0);
    // No reference was configured, so the ratio is present but null.
    assert!(value.as_object().unwrap().contains_key("match_ratio"));
    assert!(value["match_ratio"].is_null());
}

#[test]
fn feedback_markdown_lists_every_dimension() {
    let markdown = report::feedback_markdown(
        &nbgrade::grade::results::FinalAssessment::builder()
            .submission("bob")
            .rubric_title("Notebook Assessment")
            .total(nbgrade::grade::results::Grade::new(70.0, 100.0))
            .dimensions(vec![
                nbgrade::grade::results::DimensionBreakdown::builder()
                    .dimension("Technical Execution")
                    .score(70.0)
                    .points(nbgrade::grade::results::Grade::new(28.0, 40.0))
                    .build(),
            ])
            .feedback(nbgrade::grade::results::FeedbackSections::placeholder())
            .build(),
    );

    assert!(markdown.contains("**Score: 70.00/100.00 (70.0%)**"));
    assert!(markdown.contains("- Technical Execution: 28.00/40.00"));
}

#[tokio::test]
async fn batch_grades_every_notebook_and_survives_bad_ones() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("alice.ipynb"), WORKED_NOTEBOOK).expect("write");
    fs::write(dir.path().join("bob.ipynb"), WORKED_NOTEBOOK).expect("write");
    fs::write(dir.path().join("mallory.ipynb"), "{broken").expect("write");

    let runner = BatchRunner::new(pipeline(), Duration::from_secs(60));
    let summary = runner.run(dir.path()).await.expect("batch run");

    assert_eq!(summary.entries.len(), 3);
    assert_eq!(summary.assessed(), 2);
    assert_eq!(summary.failed(), 1);

    // Entries come back sorted by submission id.
    assert_eq!(summary.entries[0].submission, "alice");
    assert!(matches!(
        summary.entries[2].outcome,
        BatchOutcome::ParseFailed(_)
    ));
}

#[tokio::test]
async fn batch_skips_checkpoint_copies() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("alice.ipynb"), WORKED_NOTEBOOK).expect("write");

    let checkpoints = dir.path().join(".ipynb_checkpoints");
    fs::create_dir(&checkpoints).expect("mkdir");
    fs::write(checkpoints.join("alice-checkpoint.ipynb"), WORKED_NOTEBOOK).expect("write");

    let runner = BatchRunner::new(pipeline(), Duration::from_secs(60));
    let summary = runner.run(dir.path()).await.expect("batch run");

    assert_eq!(summary.entries.len(), 1);
}

#[tokio::test]
async fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = BatchRunner::new(pipeline(), Duration::from_secs(60));
    assert!(runner.run(dir.path()).await.is_err());
}
