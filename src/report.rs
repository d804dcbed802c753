#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Assessment emission: terminal breakdown tables, a markdown feedback
//! document per submission, and a JSON assessment file.

use std::{fmt::Write as _, fs, path::Path};

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::{
    Table,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};

use crate::grade::{
    batch::BatchSummary,
    results::FinalAssessment,
};

/// Prints the per-dimension and penalty breakdown tables for one
/// assessment.
pub fn show_assessment(assessment: &FinalAssessment) {
    eprintln!(
        "{}",
        Table::new(&assessment.dimensions)
            .with(Panel::header(format!(
                "{} — {}",
                assessment.submission, assessment.rubric_title
            )))
            .with(Panel::footer(format!("Total: {}", assessment.total)))
            .with(Modify::new(Rows::new(1..)).with(Width::wrap(32).keep_words(true)))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(
                Modify::new(Rows::last())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
    );

    if !assessment.penalties.is_empty() {
        eprintln!(
            "{}",
            Table::new(&assessment.penalties)
                .with(Panel::header("Deductions"))
                .with(Modify::new(Rows::new(1..)).with(Width::wrap(48).keep_words(true)))
                .with(Style::modern())
        );
    }

    if assessment.manual_review {
        eprintln!("{}", "This assessment is flagged for manual review.".yellow().bold());
    }
}

/// Prints one summary table for a batch run.
pub fn show_batch(summary: &BatchSummary) {
    /// One row of the batch overview table.
    #[derive(tabled::Tabled)]
    struct Row {
        /// Submission identifier.
        #[tabled(rename = "Submission")]
        submission: String,
        /// Final grade or failure status.
        #[tabled(rename = "Result")]
        status:     String,
    }

    let rows: Vec<Row> = summary
        .entries
        .iter()
        .map(|entry| Row {
            submission: entry.submission.clone(),
            status:     entry.outcome.status_line(),
        })
        .collect();

    eprintln!(
        "{}",
        Table::new(rows)
            .with(Panel::header("Batch Overview"))
            .with(Panel::footer(format!(
                "{} assessed, {} not graded",
                summary.assessed(),
                summary.failed()
            )))
            .with(Style::modern())
    );
}

/// Renders the student-facing markdown feedback document.
pub fn feedback_markdown(assessment: &FinalAssessment) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Feedback: {}", assessment.rubric_title);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "**Score: {} ({:.1}%)**",
        assessment.total,
        assessment.percentage()
    );
    let _ = writeln!(out);

    for dim in &assessment.dimensions {
        let _ = writeln!(out, "- {}: {}", dim.dimension, dim.points);
    }
    let _ = writeln!(out);

    let _ = write!(out, "{}", assessment.feedback);

    if !assessment.flags.is_empty() {
        let _ = writeln!(out, "### Completion issues");
        for flag in &assessment.flags {
            let _ = writeln!(out, "- {flag}");
        }
        let _ = writeln!(out);
    }

    if !assessment.fixes.is_empty() {
        let _ = writeln!(out, "### Repairs applied before assessment");
        for fix in &assessment.fixes {
            let _ = writeln!(out, "- {fix}");
        }
        let _ = writeln!(out);
    }

    if let Some(comparison) = &assessment.comparison {
        let _ = writeln!(out, "### Output comparison");
        let _ = writeln!(out, "- {comparison}");
        let _ = writeln!(out);
    }

    out
}

/// Writes the markdown feedback document and the JSON assessment file
/// for one submission into `out_dir`.
pub fn write_assessment(assessment: &FinalAssessment, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Could not create {}", out_dir.display()))?;

    let feedback_path = out_dir.join(format!("{}_FEEDBACK.md", assessment.submission));
    fs::write(&feedback_path, feedback_markdown(assessment))
        .with_context(|| format!("Could not write {}", feedback_path.display()))?;

    let json_path = out_dir.join(format!("{}.json", assessment.submission));
    let json = serde_json::to_string_pretty(assessment)
        .context("Could not serialize the assessment")?;
    fs::write(&json_path, json)
        .with_context(|| format!("Could not write {}", json_path.display()))?;

    tracing::info!(
        "wrote {} and {}",
        feedback_path.display(),
        json_path.display()
    );
    Ok(())
}
