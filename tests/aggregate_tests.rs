//! Tests for score aggregation.

use std::collections::BTreeMap;

use nbgrade::{
    config::AssessmentConfig,
    grade::{
        aggregate::ScoreAggregator,
        compare::{ComparisonRecord, ComparisonReport, MatchMethod},
        preprocess::{AppliedFix, PreprocessingReport},
        results::{FeedbackSections, ScoringResult},
        validation::{IssueKind, ValidationFlag, ValidationReport},
    },
    rubric::Rubric,
};

fn aggregator() -> ScoreAggregator {
    ScoreAggregator::new(AssessmentConfig::default())
}

fn scoring(scores: &[(&str, f64)]) -> ScoringResult {
    let scores: BTreeMap<String, f64> = scores
        .iter()
        .map(|(name, score)| ((*name).to_string(), *score))
        .collect();
    ScoringResult::builder()
        .scores(scores)
        .feedback(FeedbackSections::placeholder())
        .build()
}

fn standard_scores(value: f64) -> ScoringResult {
    scoring(&[
        ("Technical Execution", value),
        ("Analysis Depth", value),
        ("Communication", value),
    ])
}

fn validation(penalty: f64) -> ValidationReport {
    ValidationReport {
        flags: vec![ValidationFlag {
            kind:       IssueKind::PlaceholderStub,
            cell_index: Some(0),
            detail:     "stub".to_string(),
        }],
        raw_sum: penalty,
        penalty,
    }
}

fn preprocessing(penalty: f64) -> PreprocessingReport {
    PreprocessingReport {
        fixes: vec![AppliedFix {
            defect:      "chained-ix-indexer".to_string(),
            cell_index:  0,
            occurrences: 1,
            penalty,
            description: "rewrite".to_string(),
        }],
        raw_sum: penalty,
        penalty,
    }
}

fn comparison(compared: usize, matched: usize) -> ComparisonReport {
    let records = (0..compared)
        .map(|index| ComparisonRecord {
            index,
            matched: index < matched,
            method: MatchMethod::Text,
            detail: String::new(),
        })
        .collect();
    ComparisonReport {
        records,
        skipped: None,
        compared,
        matched,
    }
}

#[test]
fn perfect_submission_earns_full_marks() {
    let assessment = aggregator().aggregate(
        "alice",
        &Rubric::standard(),
        &standard_scores(100.0),
        &ValidationReport::default(),
        &PreprocessingReport::default(),
        None,
    );

    assert_eq!(assessment.total.grade, 100.0);
    assert_eq!(assessment.total.out_of, 100.0);
    assert!(assessment.penalties.is_empty());
    assert!(!assessment.manual_review);
}

#[test]
fn weighted_dimensions_sum_correctly() {
    // 40% of 80 + 35% of 60 + 25% of 90 = 32 + 21 + 22.5
    let assessment = aggregator().aggregate(
        "bob",
        &Rubric::standard(),
        &scoring(&[
            ("Technical Execution", 80.0),
            ("Analysis Depth", 60.0),
            ("Communication", 90.0),
        ]),
        &ValidationReport::default(),
        &PreprocessingReport::default(),
        None,
    );

    assert!((assessment.total.grade - 75.5).abs() < 1e-9);
    assert_eq!(assessment.dimensions.len(), 3);
}

#[test]
fn validation_percent_converts_to_points() {
    let assessment = aggregator().aggregate(
        "carol",
        &Rubric::standard(),
        &standard_scores(100.0),
        &validation(20.0),
        &PreprocessingReport::default(),
        None,
    );

    assert!((assessment.total.grade - 80.0).abs() < 1e-9);
    assert_eq!(assessment.penalties.len(), 1);
}

#[test]
fn every_penalty_source_appears_in_the_breakdown() {
    let assessment = aggregator().aggregate(
        "dave",
        &Rubric::standard(),
        &standard_scores(90.0),
        &validation(10.0),
        &preprocessing(1.5),
        Some(&comparison(4, 2)),
    );

    // 90 - 10 - 1.5 - (0.5 * 15)
    assert!((assessment.total.grade - 71.0).abs() < 1e-9);
    assert_eq!(assessment.penalties.len(), 3);
    let sources: Vec<&str> = assessment
        .penalties
        .iter()
        .map(|p| p.source.as_str())
        .collect();
    assert!(sources.contains(&"Completion validation"));
    assert!(sources.contains(&"Defect preprocessing"));
    assert!(sources.contains(&"Output comparison"));
    assert_eq!(assessment.match_ratio, Some(0.5));
}

#[test]
fn score_never_drops_below_zero() {
    let assessment = aggregator().aggregate(
        "eve",
        &Rubric::standard(),
        &standard_scores(5.0),
        &validation(90.0),
        &preprocessing(10.0),
        Some(&comparison(2, 0)),
    );

    assert_eq!(assessment.total.grade, 0.0);
}

#[test]
fn score_never_exceeds_the_rubric_total() {
    // Scores above 100 are clamped before weighting.
    let assessment = aggregator().aggregate(
        "frank",
        &Rubric::standard(),
        &standard_scores(150.0),
        &ValidationReport::default(),
        &PreprocessingReport::default(),
        None,
    );

    assert_eq!(assessment.total.grade, 100.0);
}

#[test]
fn missing_dimension_gets_the_baseline_and_flags_review() {
    let assessment = aggregator().aggregate(
        "grace",
        &Rubric::standard(),
        &scoring(&[("Technical Execution", 80.0)]),
        &ValidationReport::default(),
        &PreprocessingReport::default(),
        None,
    );

    assert!(assessment.manual_review);
    // 40% of 80 + baseline 50 on the remaining 60%.
    assert!((assessment.total.grade - 62.0).abs() < 1e-9);
}

#[test]
fn skipped_comparison_deducts_nothing() {
    let report = ComparisonReport {
        records:  Vec::new(),
        skipped:  Some(nbgrade::grade::compare::SkipReason::SizeGuard),
        compared: 0,
        matched:  0,
    };

    let assessment = aggregator().aggregate(
        "heidi",
        &Rubric::standard(),
        &standard_scores(100.0),
        &ValidationReport::default(),
        &PreprocessingReport::default(),
        Some(&report),
    );

    assert_eq!(assessment.total.grade, 100.0);
    assert_eq!(
        assessment.comparison.as_deref(),
        Some("comparison skipped (size guard)")
    );
    assert_eq!(assessment.match_ratio, None);
}

#[test]
fn degraded_scoring_flags_manual_review() {
    let result = ScoringResult {
        degraded: true,
        ..standard_scores(50.0)
    };

    let assessment = aggregator().aggregate(
        "ivan",
        &Rubric::standard(),
        &result,
        &ValidationReport::default(),
        &PreprocessingReport::default(),
        None,
    );

    assert!(assessment.manual_review);
}
