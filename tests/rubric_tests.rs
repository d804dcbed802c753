//! Tests for rubric loading and validation.

use nbgrade::rubric::{Rubric, RubricError};

#[test]
fn standard_rubric_is_balanced() {
    let rubric = Rubric::standard();
    assert_eq!(rubric.total_points(), 100.0);

    let sum: f64 = rubric.dimensions().iter().map(|d| d.weight()).sum();
    assert!((sum - 1.0).abs() < 1e-9);

    let points: f64 = rubric.dimensions().iter().map(|d| d.max_points()).sum();
    assert!((points - 100.0).abs() < 1e-9);
}

#[test]
fn loads_a_rubric_file_shape() {
    let json = r#"{
      "title": "Project 2: Regression",
      "total_points": 50,
      "dimensions": [
        {"name": "Modeling", "weight": 0.6},
        {"name": "Writeup", "weight": 0.4}
      ]
    }"#;

    let rubric = Rubric::from_json(json).expect("valid rubric");
    assert_eq!(rubric.title(), "Project 2: Regression");
    assert_eq!(rubric.total_points(), 50.0);
    assert_eq!(rubric.find("Modeling").expect("present").max_points(), 30.0);
}

#[test]
fn title_and_total_default_when_absent() {
    let json = r#"{"dimensions": [{"name": "Everything", "weight": 1.0}]}"#;
    let rubric = Rubric::from_json(json).expect("valid rubric");
    assert_eq!(rubric.total_points(), 100.0);
    assert!(!rubric.title().is_empty());
}

#[test]
fn unbalanced_weights_are_rejected() {
    let json = r#"{"dimensions": [
      {"name": "A", "weight": 0.5},
      {"name": "B", "weight": 0.6}
    ]}"#;

    let err = Rubric::from_json(json).expect_err("weights sum past 1.0");
    assert!(matches!(err, RubricError::UnbalancedWeights { .. }));
}

#[test]
fn non_positive_weight_is_rejected() {
    let json = r#"{"dimensions": [
      {"name": "A", "weight": 0.0},
      {"name": "B", "weight": 1.0}
    ]}"#;

    let err = Rubric::from_json(json).expect_err("zero weight");
    assert!(matches!(err, RubricError::InvalidWeight { .. }));
}

#[test]
fn duplicate_dimension_names_are_rejected() {
    let json = r#"{"dimensions": [
      {"name": "Analysis", "weight": 0.5},
      {"name": "Analysis", "weight": 0.5}
    ]}"#;

    let err = Rubric::from_json(json).expect_err("duplicate name");
    assert!(matches!(err, RubricError::DuplicateDimension(name) if name == "Analysis"));
}

#[test]
fn empty_dimension_list_is_rejected() {
    let err = Rubric::from_json(r#"{"dimensions": []}"#).expect_err("no dimensions");
    assert!(matches!(err, RubricError::Empty));
}

#[test]
fn non_positive_total_is_rejected() {
    let json = r#"{"total_points": 0, "dimensions": [{"name": "A", "weight": 1.0}]}"#;
    let err = Rubric::from_json(json).expect_err("zero total");
    assert!(matches!(err, RubricError::InvalidTotal(_)));
}
