#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Parser for notebook JSON documents.
//!
//! Accepts the on-disk nbformat v4 layout and produces the pipeline's
//! [`Artifact`] model. Parsing is tolerant of the representational
//! quirks real documents carry (joined vs. line-array text, missing
//! execution counts, rich output payloads) but rejects documents the
//! pipeline cannot assess at all.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use super::cell::{Artifact, Cell, OutputFragment};

/// Errors produced while reading or parsing a notebook document.
#[derive(thiserror::Error, Debug)]
pub enum NotebookError {
    /// The document could not be read from disk.
    #[error("Could not read notebook at {path}")]
    Io {
        /// Path that failed to read.
        path:   PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid JSON.
    #[error("Notebook is not valid JSON")]
    Json(#[from] serde_json::Error),
    /// The document parsed but holds no cells.
    #[error("Notebook contains no cells")]
    Empty,
    /// A cell type the pipeline does not understand.
    #[error("Unsupported cell type `{0}`")]
    UnsupportedCellType(String),
}

/// nbformat stores `source` and stream `text` either as one joined
/// string or as a list of line strings.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum TextLines {
    /// Single joined string.
    Joined(String),
    /// One string per line, newlines included.
    Lines(Vec<String>),
}

impl Default for TextLines {
    fn default() -> Self {
        TextLines::Joined(String::new())
    }
}

impl TextLines {
    /// Joins the representation into a single string.
    fn into_string(self) -> String {
        match self {
            TextLines::Joined(text) => text,
            TextLines::Lines(lines) => lines.concat(),
        }
    }
}

/// Raw output entry as stored in the document.
#[derive(Deserialize, Debug)]
struct RawOutput {
    /// nbformat output discriminator (`stream`, `execute_result`, ...).
    output_type: String,
    /// Stream text, present on `stream` outputs.
    #[serde(default)]
    text:        Option<TextLines>,
    /// MIME bundle, present on `execute_result` and `display_data`.
    #[serde(default)]
    data:        Option<serde_json::Map<String, serde_json::Value>>,
    /// Exception class name, present on `error` outputs.
    #[serde(default)]
    ename:       Option<String>,
    /// Exception message, present on `error` outputs.
    #[serde(default)]
    evalue:      Option<String>,
}

/// Raw cell entry as stored in the document.
#[derive(Deserialize, Debug)]
struct RawCell {
    /// nbformat cell discriminator (`code`, `markdown`, `raw`).
    cell_type:       String,
    /// Cell source text.
    #[serde(default)]
    source:          TextLines,
    /// Kernel execution counter; null when the cell never ran.
    #[serde(default)]
    execution_count: Option<u32>,
    /// Captured outputs; absent on narrative cells.
    #[serde(default)]
    outputs:         Vec<RawOutput>,
}

/// Top-level notebook document.
#[derive(Deserialize, Debug)]
struct RawNotebook {
    /// Cells in document order.
    #[serde(default)]
    cells: Vec<RawCell>,
}

/// Reads and parses the notebook document at `path`.
pub fn read_artifact(path: &Path) -> Result<Artifact, NotebookError> {
    let json = fs::read_to_string(path).map_err(|source| NotebookError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_artifact(&json)
}

/// Parses a notebook document from its JSON text.
pub fn parse_artifact(json: &str) -> Result<Artifact, NotebookError> {
    let raw: RawNotebook = serde_json::from_str(json)?;

    if raw.cells.is_empty() {
        return Err(NotebookError::Empty);
    }

    let cells = raw
        .cells
        .into_iter()
        .map(convert_cell)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Artifact::from_cells(cells))
}

/// Converts one raw cell into the pipeline model.
fn convert_cell(raw: RawCell) -> Result<Cell, NotebookError> {
    match raw.cell_type.as_str() {
        "markdown" | "raw" => Ok(Cell::narrative(raw.source.into_string())),
        "code" => {
            let outputs = raw
                .outputs
                .into_iter()
                .filter_map(convert_output)
                .collect();

            Ok(Cell::executable(
                raw.source.into_string(),
                raw.execution_count,
                outputs,
            ))
        }
        other => Err(NotebookError::UnsupportedCellType(other.to_string())),
    }
}

/// Converts one raw output entry. Output types the pipeline does not
/// assess (widget views, javascript payloads) are dropped rather than
/// failing the parse.
fn convert_output(raw: RawOutput) -> Option<OutputFragment> {
    match raw.output_type.as_str() {
        "stream" => Some(OutputFragment::Stream {
            text: raw.text.map(TextLines::into_string).unwrap_or_default(),
        }),
        "execute_result" | "display_data" => {
            let text = raw
                .data
                .and_then(|bundle| plain_text_rendering(&bundle))
                .or_else(|| raw.text.map(TextLines::into_string))
                .unwrap_or_default();

            Some(OutputFragment::Value { text })
        }
        "error" => Some(OutputFragment::Error {
            ename:  raw.ename.unwrap_or_default(),
            evalue: raw.evalue.unwrap_or_default(),
        }),
        _ => None,
    }
}

/// Extracts the `text/plain` rendering from a MIME bundle, honoring
/// both string and line-array encodings.
fn plain_text_rendering(bundle: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    match bundle.get("text/plain")? {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Array(lines) => Some(
            lines
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect::<String>(),
        ),
        _ => None,
    }
}
