#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Notebook artifact model and parsing.

/// Cell and artifact data model.
pub mod cell;
/// Parser for notebook JSON documents.
pub mod parser;

pub use cell::{Artifact, Cell, OutputFragment};
pub use parser::{NotebookError, parse_artifact, read_artifact};
