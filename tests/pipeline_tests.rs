//! End-to-end tests for the assessment pipeline, driven through canned
//! scoring backends so no network is involved.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageContent,
};
use async_trait::async_trait;
use nbgrade::{
    config::AssessmentConfig,
    grade::{
        pipeline::AssessmentPipeline,
        review::{ScoringBackend, ScoringClient, ScoringError},
    },
    notebook::{Artifact, Cell, OutputFragment},
    rubric::Rubric,
};

/// Backend that always answers with the same text.
struct CannedBackend {
    response: String,
}

#[async_trait]
impl ScoringBackend for CannedBackend {
    async fn submit(
        &self,
        _messages: Vec<async_openai::types::ChatCompletionRequestMessage>,
    ) -> Result<String, ScoringError> {
        Ok(self.response.clone())
    }

    async fn health(&self) -> Result<(), ScoringError> {
        Ok(())
    }
}

/// Backend that records the user content it was sent.
struct RecordingBackend {
    seen:     Mutex<String>,
    response: String,
}

#[async_trait]
impl ScoringBackend for RecordingBackend {
    async fn submit(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<String, ScoringError> {
        let rendered = messages
            .iter()
            .filter_map(|message| match message {
                ChatCompletionRequestMessage::User(user) => match &user.content {
                    ChatCompletionRequestUserMessageContent::Text(text) => Some(text.clone()),
                    _ => None,
                },
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        *self.seen.lock().unwrap() = rendered;
        Ok(self.response.clone())
    }

    async fn health(&self) -> Result<(), ScoringError> {
        Ok(())
    }
}

/// Backend that never answers within any reasonable budget.
struct SlowBackend;

#[async_trait]
impl ScoringBackend for SlowBackend {
    async fn submit(
        &self,
        _messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<String, ScoringError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("too late".to_string())
    }

    async fn health(&self) -> Result<(), ScoringError> {
        Ok(())
    }
}

/// Backend that fails a set number of times before answering.
struct FlakyBackend {
    attempts:      AtomicUsize,
    fail_first:    usize,
    healthy:       bool,
    response:      String,
}

#[async_trait]
impl ScoringBackend for FlakyBackend {
    async fn submit(
        &self,
        _messages: Vec<async_openai::types::ChatCompletionRequestMessage>,
    ) -> Result<String, ScoringError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            Err(ScoringError::Unavailable("connection reset".to_string()))
        } else {
            Ok(self.response.clone())
        }
    }

    async fn health(&self) -> Result<(), ScoringError> {
        if self.healthy {
            Ok(())
        } else {
            Err(ScoringError::Unavailable("probe refused".to_string()))
        }
    }
}

const GOOD_RESPONSE: &str = r#"```json
{
  "scores": {
    "Technical Execution": 85,
    "Analysis Depth": 70,
    "Communication": 80
  },
  "feedback": {
    "strengths": ["Every cell runs top to bottom and the outputs back up the narrative."],
    "gaps": ["The aggregation in cell 5 is never sanity-checked against the raw counts."],
    "recommendations": ["Compare the grouped totals to the ungrouped sum before reporting them."]
  }
}
```"#;

fn worked_notebook() -> Artifact {
    Artifact::from_cells(vec![
        Cell::narrative("# Homework 3\n\nWe analyze the city dataset."),
        Cell::executable(
            "df = pd.read_csv('cities.csv')\ndf.shape",
            Some(1),
            vec![OutputFragment::Value {
                text: "(150, 4)".to_string(),
            }],
        ),
        Cell::narrative("The dataset loads with 150 rows as expected."),
        Cell::executable(
            "df.population.mean()",
            Some(2),
            vec![OutputFragment::Value {
                text: "52340.7".to_string(),
            }],
        ),
    ])
}

fn reference_notebook() -> Artifact {
    Artifact::from_cells(vec![
        Cell::executable(
            "df = pd.read_csv('cities.csv')\ndf.shape",
            Some(1),
            vec![OutputFragment::Value {
                text: "(150, 4)".to_string(),
            }],
        ),
        Cell::executable(
            "df.population.mean()",
            Some(2),
            vec![OutputFragment::Value {
                text: "61200.2".to_string(),
            }],
        ),
    ])
}

fn pipeline_with(backend: Arc<dyn ScoringBackend>) -> AssessmentPipeline {
    let config = AssessmentConfig::default();
    let client = ScoringClient::new(backend, &config);
    AssessmentPipeline::new(Rubric::standard(), config)
        .expect("build pipeline")
        .with_client(client)
}

#[tokio::test]
async fn good_submission_scores_within_bounds() {
    let pipeline = pipeline_with(Arc::new(CannedBackend {
        response: GOOD_RESPONSE.to_string(),
    }));

    let assessment = pipeline.assess("alice", &worked_notebook()).await;

    assert!(assessment.total.grade > 0.0);
    assert!(assessment.total.grade <= assessment.total.out_of);
    // 40% of 85 + 35% of 70 + 25% of 80, nothing to deduct.
    assert!((assessment.total.grade - 78.5).abs() < 1e-9);
    assert!(!assessment.manual_review);
    assert!(assessment.feedback.gaps[0].contains("cell 5"));
}

#[tokio::test]
async fn untouched_template_lands_near_the_floor() {
    let mut cells = Vec::new();
    for _ in 0..5 {
        cells.push(Cell::executable(
            "# YOUR CODE HERE\nraise NotImplementedError()",
            None,
            vec![],
        ));
    }
    cells.push(Cell::narrative("Q1\n\nYOUR ANSWER HERE"));
    cells.push(Cell::narrative("Q2\n\nYOUR ANSWER HERE"));

    let pipeline = pipeline_with(Arc::new(CannedBackend {
        response: GOOD_RESPONSE.to_string(),
    }));
    let assessment = pipeline.assess("bob", &Artifact::from_cells(cells)).await;

    // Validation alone deducts 85 of the 100 points.
    assert!(assessment.total.grade <= 10.0);
    assert!(assessment.total.grade >= 0.0);
    assert!(!assessment.flags.is_empty());
}

#[tokio::test]
async fn unreachable_service_degrades_to_baseline_and_flags_review() {
    let pipeline = AssessmentPipeline::new(Rubric::standard(), AssessmentConfig::default())
        .expect("build pipeline");

    let assessment = pipeline.assess("carol", &worked_notebook()).await;

    assert!(assessment.manual_review);
    // Baseline 50 on every dimension.
    assert!((assessment.total.grade - 50.0).abs() < 1e-9);
    assert!(!assessment.feedback.strengths.is_empty());
}

#[tokio::test]
async fn comparison_against_reference_feeds_the_breakdown() {
    let pipeline = pipeline_with(Arc::new(CannedBackend {
        response: GOOD_RESPONSE.to_string(),
    }))
    .with_reference(reference_notebook());

    let assessment = pipeline.assess("dave", &worked_notebook()).await;

    let summary = assessment.comparison.as_deref().expect("comparison ran");
    assert!(summary.contains("1/2"), "unexpected summary: {summary}");
    assert_eq!(assessment.match_ratio, Some(0.5));
    assert!(assessment.total.grade < 78.5);
}

#[tokio::test]
async fn scoring_request_carries_the_reference_solution() {
    let backend = Arc::new(RecordingBackend {
        seen:     Mutex::new(String::new()),
        response: GOOD_RESPONSE.to_string(),
    });
    let pipeline = pipeline_with(backend.clone()).with_reference(reference_notebook());

    pipeline.assess("frank", &worked_notebook()).await;

    let seen = backend.seen.lock().unwrap().clone();
    assert!(seen.contains("## Notebook"));
    assert!(seen.contains("## Reference solution"));
    assert!(seen.contains("61200.2"), "reference output missing from request");
}

#[tokio::test]
async fn scoring_request_has_no_reference_section_without_one() {
    let backend = Arc::new(RecordingBackend {
        seen:     Mutex::new(String::new()),
        response: GOOD_RESPONSE.to_string(),
    });
    let pipeline = pipeline_with(backend.clone());

    pipeline.assess("grace", &worked_notebook()).await;

    let seen = backend.seen.lock().unwrap().clone();
    assert!(seen.contains("## Notebook"));
    assert!(!seen.contains("## Reference solution"));
}

#[tokio::test]
async fn client_retries_once_after_a_healthy_probe() {
    let backend = Arc::new(FlakyBackend {
        attempts:   AtomicUsize::new(0),
        fail_first: 1,
        healthy:    true,
        response:   "all good".to_string(),
    });
    let client = ScoringClient::new(backend.clone(), &AssessmentConfig::default());

    let text = client.score(Vec::new()).await.expect("retry succeeds");
    assert_eq!(text, "all good");
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retry_budget_is_bounded() {
    let backend = Arc::new(FlakyBackend {
        attempts:   AtomicUsize::new(0),
        fail_first: 10,
        healthy:    true,
        response:   "never reached".to_string(),
    });
    let client = ScoringClient::new(backend.clone(), &AssessmentConfig::default());

    let err = client.score(Vec::new()).await.expect_err("budget exhausted");
    assert!(matches!(err, ScoringError::Unavailable(_)));
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn no_retry_when_the_probe_stays_unhealthy() {
    let backend = Arc::new(FlakyBackend {
        attempts:   AtomicUsize::new(0),
        fail_first: 10,
        healthy:    false,
        response:   "never reached".to_string(),
    });
    let client = ScoringClient::new(backend.clone(), &AssessmentConfig::default());

    client.score(Vec::new()).await.expect_err("stays down");
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_backend_surfaces_a_timeout() {
    let config = AssessmentConfig::default()
        .with_scoring_timeout(Duration::from_millis(10))
        .with_scoring_retry_budget(0);
    let client = ScoringClient::new(Arc::new(SlowBackend), &config);

    let err = client.score(Vec::new()).await.expect_err("budget blown");
    assert!(matches!(err, ScoringError::Timeout(_)));
}

#[tokio::test]
async fn defect_fixes_show_up_in_the_assessment() {
    let artifact = Artifact::from_cells(vec![Cell::executable(
        "subset = df.ix[df.year > 2000]",
        Some(1),
        vec![OutputFragment::Value {
            text: "(42, 4)".to_string(),
        }],
    )]);

    let pipeline = pipeline_with(Arc::new(CannedBackend {
        response: GOOD_RESPONSE.to_string(),
    }));
    let assessment = pipeline.assess("eve", &artifact).await;

    assert_eq!(assessment.fixes.len(), 1);
    assert!(assessment.fixes[0].contains("chained-ix-indexer"));
    assert!((assessment.total.grade - 78.0).abs() < 1e-9);
}
