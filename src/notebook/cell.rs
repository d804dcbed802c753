#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Cell and artifact model for parsed notebook documents.

use serde::{Deserialize, Serialize};

/// One captured output fragment from an executed cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputFragment {
    /// Plain stream output (stdout or stderr).
    Stream {
        /// Captured stream text.
        text: String,
    },
    /// A rendered value (execute result or display data, text/plain form).
    Value {
        /// The text/plain rendering of the value.
        text: String,
    },
    /// An error raised while the cell executed.
    Error {
        /// Exception class name.
        ename:  String,
        /// Exception message.
        evalue: String,
    },
}

impl OutputFragment {
    /// Returns the textual content of this fragment.
    pub fn text(&self) -> String {
        match self {
            OutputFragment::Stream { text } | OutputFragment::Value { text } => text.clone(),
            OutputFragment::Error { ename, evalue } => format!("{ename}: {evalue}"),
        }
    }

    /// Returns true when this fragment captures an error.
    pub fn is_error(&self) -> bool {
        matches!(self, OutputFragment::Error { .. })
    }
}

/// A single cell of a parsed artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Cell {
    /// Free-text narrative (markdown) cell.
    Narrative {
        /// Raw markdown text.
        text: String,
    },
    /// Executable (code) cell with optional captured execution state.
    Executable {
        /// Source text as submitted.
        source:          String,
        /// Kernel execution index, if the cell ever ran.
        execution_index: Option<u32>,
        /// Captured output fragments, in kernel order.
        outputs:         Vec<OutputFragment>,
    },
}

impl Cell {
    /// Creates a narrative cell from markdown text.
    pub fn narrative(text: impl Into<String>) -> Self {
        Cell::Narrative { text: text.into() }
    }

    /// Creates an executable cell with captured execution state.
    pub fn executable(
        source: impl Into<String>,
        execution_index: Option<u32>,
        outputs: Vec<OutputFragment>,
    ) -> Self {
        Cell::Executable {
            source: source.into(),
            execution_index,
            outputs,
        }
    }

    /// Returns true for executable (code) cells.
    pub fn is_executable(&self) -> bool {
        matches!(self, Cell::Executable { .. })
    }

    /// Returns true for narrative (markdown) cells.
    pub fn is_narrative(&self) -> bool {
        matches!(self, Cell::Narrative { .. })
    }

    /// Returns the cell's text content: source for executable cells,
    /// markdown for narrative cells.
    pub fn source(&self) -> &str {
        match self {
            Cell::Narrative { text } => text,
            Cell::Executable { source, .. } => source,
        }
    }

    /// Returns true when the cell shows evidence of having run (an
    /// execution index or at least one captured output).
    pub fn executed(&self) -> bool {
        match self {
            Cell::Narrative { .. } => false,
            Cell::Executable {
                execution_index,
                outputs,
                ..
            } => execution_index.is_some() || !outputs.is_empty(),
        }
    }

    /// Returns true when any captured output is an error.
    pub fn has_error(&self) -> bool {
        self.outputs().iter().any(OutputFragment::is_error)
    }

    /// Returns the captured outputs; empty for narrative cells.
    pub fn outputs(&self) -> &[OutputFragment] {
        match self {
            Cell::Narrative { .. } => &[],
            Cell::Executable { outputs, .. } => outputs,
        }
    }

    /// Returns the joined text of all captured outputs, or `None` when
    /// nothing was captured.
    pub fn output_text(&self) -> Option<String> {
        let outputs = self.outputs();
        if outputs.is_empty() {
            return None;
        }
        Some(
            outputs
                .iter()
                .map(OutputFragment::text)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Returns a copy of this cell with replaced source text; captured
    /// execution state is preserved.
    pub fn with_source(&self, new_source: String) -> Self {
        match self {
            Cell::Narrative { .. } => Cell::Narrative { text: new_source },
            Cell::Executable {
                execution_index,
                outputs,
                ..
            } => Cell::Executable {
                source:          new_source,
                execution_index: *execution_index,
                outputs:         outputs.clone(),
            },
        }
    }
}

/// An ordered sequence of parsed cells; immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Cells in document order.
    cells: Vec<Cell>,
}

impl Artifact {
    /// Builds an artifact from already-parsed cells.
    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Returns all cells in document order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true when the artifact holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterates executable cells with their document positions.
    pub fn executable_cells(&self) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_executable())
    }

    /// Iterates narrative cells with their document positions.
    pub fn narrative_cells(&self) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_narrative())
    }

    /// Returns the joined output text of every executable cell that
    /// captured at least one output, in document order.
    pub fn captured_outputs(&self) -> Vec<String> {
        self.cells
            .iter()
            .filter_map(Cell::output_text)
            .collect()
    }

    /// Returns the size of this artifact's JSON serialization in bytes.
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(self).map_or(0, |bytes| bytes.len())
    }
}
