//! Tests for response extraction and sanitization.

use nbgrade::{
    config::AssessmentConfig, grade::extract::ResponseExtractor, rubric::Rubric,
};

fn extractor() -> ResponseExtractor {
    ResponseExtractor::new(AssessmentConfig::default()).expect("build extractor")
}

fn rubric() -> Rubric {
    Rubric::standard()
}

const STRUCTURED: &str = r#"Here is my assessment.

```json
{
  "scores": {
    "Technical Execution": 82,
    "Analysis Depth": 74,
    "Communication": 90
  },
  "feedback": {
    "strengths": ["The merge in cell 4 is done correctly and verified with a shape check."],
    "gaps": ["The regression in cell 9 is never interpreted; the coefficient table is left unexplained."],
    "recommendations": ["Add a sentence after each model cell stating what the output means for the question asked."]
  }
}
```"#;

#[test]
fn structured_block_is_decoded() {
    let result = extractor().extract(STRUCTURED, &rubric());

    assert!(!result.salvaged);
    assert_eq!(result.scores["Technical Execution"], 82.0);
    assert_eq!(result.scores["Communication"], 90.0);
    assert!(result.feedback.strengths[0].contains("cell 4"));
}

#[test]
fn bare_json_without_fences_is_decoded() {
    let raw = r#"{"scores": {"Technical Execution": 65, "Analysis Depth": 55, "Communication": 70}}"#;
    let result = extractor().extract(raw, &rubric());

    assert!(!result.salvaged);
    assert_eq!(result.scores["Analysis Depth"], 55.0);
    // No feedback in the payload: every section falls back to canned text.
    assert!(!result.feedback.strengths.is_empty());
    assert!(!result.feedback.gaps.is_empty());
    assert!(!result.feedback.recommendations.is_empty());
}

#[test]
fn numeric_strings_and_out_of_range_scores_are_coerced() {
    let raw = r#"{"scores": {"Technical Execution": "88", "Analysis Depth": 130, "Communication": -5}}"#;
    let result = extractor().extract(raw, &rubric());

    assert_eq!(result.scores["Technical Execution"], 88.0);
    assert_eq!(result.scores["Analysis Depth"], 100.0);
    assert_eq!(result.scores["Communication"], 0.0);
}

#[test]
fn malformed_response_falls_back_to_line_filtering() {
    let raw = "Let me start by analyzing the notebook cell by cell.\n\
               Step 1: check whether the data loads.\n\
               ## Strengths\n\
               - The data loading section reads the CSV and checks its shape immediately.\n\
               ## Gaps\n\
               - The student never interprets the regression output in cell 9.\n\
               - The final plot in cell 12 is missing axis labels and a title.\n\
               ## Recommendations\n\
               - Label both axes on the final plot and describe the trend it shows.\n";

    let result = extractor().extract(raw, &rubric());
    assert!(result.salvaged);

    let all_lines: Vec<&String> = result
        .feedback
        .strengths
        .iter()
        .chain(&result.feedback.gaps)
        .chain(&result.feedback.recommendations)
        .collect();

    for line in &all_lines {
        assert!(!line.contains("Let me start"), "planning line survived: {line}");
        assert!(!line.contains("Step 1"), "step marker survived: {line}");
        assert!(!line.to_lowercase().contains("the student"), "third-person line survived: {line}");
    }

    assert!(result.feedback.strengths[0].contains("CSV"));
    assert!(result.feedback.gaps.iter().any(|l| l.contains("cell 12")));
    assert!(result.feedback.recommendations[0].contains("axes"));
}

#[test]
fn forbidden_phrases_never_survive_the_structured_path() {
    let raw = r#"{
      "scores": {"Technical Execution": 70, "Analysis Depth": 70, "Communication": 70},
      "feedback": {
        "strengths": ["As an AI language model, I found the plotting section strong."],
        "gaps": ["The merge in cell 6 drops twelve rows without comment."],
        "recommendations": ["Check the row count before and after every merge."]
      }
    }"#;

    let result = extractor().extract(raw, &rubric());
    assert!(!result.salvaged);
    // The tainted line is dropped; the section refills with canned text.
    assert!(!result.feedback.strengths.iter().any(|l| l.contains("AI")));
    assert!(!result.feedback.strengths.is_empty());
    assert!(result.feedback.gaps[0].contains("cell 6"));
}

#[test]
fn scores_are_salvaged_from_prose() {
    let raw = "Overall this is solid work.\n\
               Technical Execution: 78\n\
               Analysis Depth came to 62 after review.\n\
               Communication: 85\n";

    let result = extractor().extract(raw, &rubric());
    assert!(result.salvaged);
    assert_eq!(result.scores["Technical Execution"], 78.0);
    assert_eq!(result.scores["Analysis Depth"], 62.0);
    assert_eq!(result.scores["Communication"], 85.0);
}

#[test]
fn empty_response_still_yields_full_sections() {
    let result = extractor().extract("", &rubric());

    assert!(result.salvaged);
    assert!(result.scores.is_empty());
    assert!(!result.feedback.strengths.is_empty());
    assert!(!result.feedback.gaps.is_empty());
    assert!(!result.feedback.recommendations.is_empty());
}

#[test]
fn short_lines_and_json_debris_are_dropped() {
    let raw = "## Gaps\n\
               ok\n\
               { \"scores\": 1 }\n\
               \"gaps\": [\n\
               - The notebook never checks for missing values before the aggregation step.\n";

    let result = extractor().extract(raw, &rubric());
    assert_eq!(result.feedback.gaps.len(), 1);
    assert!(result.feedback.gaps[0].contains("missing values"));
}

#[test]
fn section_length_is_capped() {
    let mut raw = String::from("## Recommendations\n");
    for i in 0..20 {
        raw.push_str(&format!(
            "- Consider refactoring the helper in cell {i} into a named function.\n"
        ));
    }

    let result = extractor().extract(&raw, &rubric());
    assert_eq!(
        result.feedback.recommendations.len(),
        AssessmentConfig::default().max_section_lines()
    );
}
