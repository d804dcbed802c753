//! # nbgrade
//!
//! An autograder for computational-notebook coursework. Submissions are
//! parsed into ordered cells, validated for completion, repaired where a
//! known defect catalog applies, compared against a reference solution
//! under tolerance rules, scored by a generative service, and folded
//! into one bounded, explainable assessment with sanitized feedback.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Run configuration, environment, and prompt assets
pub mod config;
/// The assessment pipeline and its stages
pub mod grade;
/// Workspace and scoring-backend health checks
pub mod health;
/// Notebook artifact model and parsing
pub mod notebook;
/// Numeric-token grammar for captured outputs
pub mod parsers;
/// Assessment emission: tables, markdown, JSON
pub mod report;
/// Rubric model and loading
pub mod rubric;
/// Utility functions for convenience
pub mod util;
