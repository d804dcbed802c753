#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # nbgrade
//!
//! Command-line driver for the notebook assessment pipeline: grade one
//! submission, batch-grade a directory, inspect a parsed notebook, or
//! check workspace and scoring-backend health.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use bpaf::*;
use dotenvy::dotenv;
use nbgrade::{
    grade::{batch::BatchRunner, pipeline::AssessmentPipeline},
    health, notebook, report,
    rubric::Rubric,
};
use tabled::{
    Table,
    settings::{Panel, Style},
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade one submission.
    Grade {
        /// Path to the submission notebook.
        submission: PathBuf,
        /// Optional reference solution notebook.
        reference:  Option<PathBuf>,
        /// Optional rubric file.
        rubric:     Option<PathBuf>,
        /// Optional output directory for feedback and JSON files.
        out:        Option<PathBuf>,
    },
    /// Grade a directory of submissions.
    Batch {
        /// Directory scanned for submission notebooks.
        dir:       PathBuf,
        /// Optional reference solution notebook.
        reference: Option<PathBuf>,
        /// Optional rubric file.
        rubric:    Option<PathBuf>,
        /// Optional output directory for feedback and JSON files.
        out:       Option<PathBuf>,
        /// Per-submission deadline, seconds.
        deadline:  u64,
    },
    /// Print a summary of a parsed notebook.
    Inspect(PathBuf),
    /// Check the submissions directory and the scoring backend.
    Health(PathBuf),
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses an optional rubric file path
    fn rubric() -> impl Parser<Option<PathBuf>> {
        long("rubric")
            .help("Path to a rubric JSON file (defaults to the standard rubric)")
            .argument::<PathBuf>("PATH")
            .optional()
    }

    /// parses an optional reference notebook path
    fn reference() -> impl Parser<Option<PathBuf>> {
        long("reference")
            .help("Path to the reference solution notebook")
            .argument::<PathBuf>("PATH")
            .optional()
    }

    /// parses an optional output directory
    fn out() -> impl Parser<Option<PathBuf>> {
        long("out")
            .help("Directory to write feedback and JSON assessment files into")
            .argument::<PathBuf>("DIR")
            .optional()
    }

    let grade = {
        /// parses the submission notebook path
        fn submission() -> impl Parser<PathBuf> {
            positional::<PathBuf>("NOTEBOOK").help("Path to the submission notebook")
        }

        construct!(Cmd::Grade {
            reference(),
            rubric(),
            out(),
            submission(),
        })
        .to_options()
        .command("grade")
        .help("Grade one submission notebook")
    };

    let batch = {
        /// parses the submissions directory
        fn dir() -> impl Parser<PathBuf> {
            positional::<PathBuf>("DIR").help("Directory containing submission notebooks")
        }

        /// parses the per-submission deadline
        fn deadline() -> impl Parser<u64> {
            long("deadline")
                .help("Per-submission deadline in seconds")
                .argument::<u64>("SECS")
                .fallback(600)
        }

        construct!(Cmd::Batch {
            reference(),
            rubric(),
            out(),
            deadline(),
            dir(),
        })
        .to_options()
        .command("batch")
        .help("Grade every notebook in a directory")
    };

    let inspect = {
        let notebook = positional::<PathBuf>("NOTEBOOK").help("Path to a notebook");
        construct!(Cmd::Inspect(notebook))
            .to_options()
            .command("inspect")
            .help("Print a summary of a parsed notebook")
    };

    let check = {
        let dir = positional::<PathBuf>("DIR")
            .help("Directory containing submission notebooks")
            .fallback(PathBuf::from("."));
        construct!(Cmd::Health(dir))
            .to_options()
            .command("health")
            .help("Check the submissions directory and the scoring backend")
    };

    let cmd = construct!([grade, batch, inspect, check]);

    cmd.to_options()
        .descr("Notebook autograder")
        .run()
}

/// Loads the rubric from `path`, or the standard rubric when no path is
/// given.
fn load_rubric(path: Option<&PathBuf>) -> Result<Rubric> {
    match path {
        Some(path) => Rubric::from_path(path)
            .with_context(|| format!("Could not load rubric from {}", path.display())),
        None => Ok(Rubric::standard()),
    }
}

/// Builds a pipeline from the environment, attaching a reference
/// solution when one is given.
fn build_pipeline(rubric: Rubric, reference: Option<&PathBuf>) -> Result<AssessmentPipeline> {
    let mut pipeline = AssessmentPipeline::from_env(rubric)?;
    if let Some(path) = reference {
        let artifact = notebook::read_artifact(path)
            .with_context(|| format!("Could not parse reference at {}", path.display()))?;
        pipeline = pipeline.with_reference(artifact);
    }
    Ok(pipeline)
}

/// Prints a per-cell summary table for a parsed notebook.
fn inspect(path: &PathBuf) -> Result<()> {
    /// One row of the inspection table.
    #[derive(tabled::Tabled)]
    struct Row {
        /// Document position.
        #[tabled(rename = "Cell")]
        index:    usize,
        /// Narrative or code.
        #[tabled(rename = "Kind")]
        kind:     &'static str,
        /// Kernel execution index, if the cell ran.
        #[tabled(rename = "Executed")]
        executed: String,
        /// Number of captured output fragments.
        #[tabled(rename = "Outputs")]
        outputs:  usize,
        /// Source length in characters.
        #[tabled(rename = "Source chars")]
        chars:    usize,
    }

    let artifact = notebook::read_artifact(path)
        .with_context(|| format!("Could not parse {}", path.display()))?;

    let rows: Vec<Row> = artifact
        .cells()
        .iter()
        .enumerate()
        .map(|(index, cell)| Row {
            index,
            kind: if cell.is_executable() { "code" } else { "narrative" },
            executed: match cell {
                notebook::Cell::Executable {
                    execution_index: Some(n),
                    ..
                } => format!("[{n}]"),
                notebook::Cell::Executable { .. } => "no".to_string(),
                notebook::Cell::Narrative { .. } => String::new(),
            },
            outputs: cell.outputs().len(),
            chars: cell.source().chars().count(),
        })
        .collect();

    println!(
        "{}",
        Table::new(rows)
            .with(Panel::header(format!("{}", path.display())))
            .with(Style::modern())
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    match options() {
        Cmd::Grade {
            submission,
            reference,
            rubric,
            out,
        } => {
            let rubric = load_rubric(rubric.as_ref())?;
            let pipeline = build_pipeline(rubric, reference.as_ref())?;

            let assessment = pipeline
                .assess_path(&submission)
                .await
                .with_context(|| format!("Could not grade {}", submission.display()))?;

            report::show_assessment(&assessment);
            if let Some(out_dir) = out {
                report::write_assessment(&assessment, &out_dir)?;
            }
        }
        Cmd::Batch {
            dir,
            reference,
            rubric,
            out,
            deadline,
        } => {
            let rubric = load_rubric(rubric.as_ref())?;
            let pipeline = build_pipeline(rubric, reference.as_ref())?;

            let runner = BatchRunner::new(pipeline, Duration::from_secs(deadline));
            let summary = runner.run(&dir).await?;

            report::show_batch(&summary);
            if let Some(out_dir) = out {
                for entry in &summary.entries {
                    if let Some(assessment) = entry.outcome.assessment() {
                        report::write_assessment(assessment, &out_dir)?;
                    }
                }
            }
        }
        Cmd::Inspect(path) => inspect(&path)?,
        Cmd::Health(dir) => {
            health::check_submissions(&dir).await?;
            if let Err(e) = health::check_scoring_backend().await {
                tracing::warn!("{e:#}");
            }
        }
    };

    Ok(())
}
