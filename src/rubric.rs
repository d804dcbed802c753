#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Rubric definitions: the scored dimensions of an assignment, their
//! weights, and the points at stake.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Tolerance when checking that dimension weights sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Errors produced while loading or validating a rubric.
#[derive(thiserror::Error, Debug)]
pub enum RubricError {
    /// The rubric file could not be read from disk.
    #[error("Could not read rubric at {path}")]
    Io {
        /// Path that failed to read.
        path:   PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The rubric file is not valid JSON.
    #[error("Rubric is not valid JSON")]
    Json(#[from] serde_json::Error),
    /// The rubric declares no dimensions.
    #[error("Rubric declares no dimensions")]
    Empty,
    /// A dimension name appears more than once.
    #[error("Duplicate rubric dimension `{0}`")]
    DuplicateDimension(String),
    /// A dimension carries a non-positive weight.
    #[error("Dimension `{name}` has non-positive weight {weight}")]
    InvalidWeight {
        /// Offending dimension name.
        name:   String,
        /// The weight as declared.
        weight: f64,
    },
    /// The dimension weights do not sum to one.
    #[error("Rubric weights sum to {sum}, expected 1.0")]
    UnbalancedWeights {
        /// The actual weight sum.
        sum: f64,
    },
    /// The rubric total is non-positive.
    #[error("Rubric total of {0} points is not assessable")]
    InvalidTotal(f64),
}

/// One scored dimension of a rubric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricDimension {
    /// Dimension name, used verbatim as the score key.
    name:       String,
    /// Fraction of the rubric total carried by this dimension.
    weight:     f64,
    /// Points at stake for this dimension.
    max_points: f64,
}

impl RubricDimension {
    /// Returns the dimension name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dimension's weight fraction.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns the points at stake for this dimension.
    pub fn max_points(&self) -> f64 {
        self.max_points
    }
}

/// A dimension as declared in a rubric file, before points are derived.
#[derive(Debug, Deserialize)]
struct RawDimension {
    /// Dimension name.
    name:   String,
    /// Fraction of the rubric total carried by this dimension.
    weight: f64,
}

/// A rubric file's on-disk layout.
#[derive(Debug, Deserialize)]
struct RawRubric {
    /// Human-readable rubric title.
    #[serde(default)]
    title:        Option<String>,
    /// Total points at stake across all dimensions.
    #[serde(default)]
    total_points: Option<f64>,
    /// Declared dimensions.
    dimensions:   Vec<RawDimension>,
}

/// A validated rubric: the dimensions an assignment is scored on.
#[derive(Debug, Clone, Serialize)]
pub struct Rubric {
    /// Human-readable rubric title.
    title:        String,
    /// Total points at stake.
    total_points: f64,
    /// Scored dimensions, in declaration order.
    dimensions:   Vec<RubricDimension>,
}

impl Rubric {
    /// Returns the default rubric used when an assignment does not ship
    /// its own.
    pub fn standard() -> Self {
        // Weights mirror the course's published grading policy.
        Self::from_weights(
            "Notebook Assessment",
            100.0,
            &[
                ("Technical Execution", 0.40),
                ("Analysis Depth", 0.35),
                ("Communication", 0.25),
            ],
        )
    }

    /// Builds a rubric from `(name, weight)` pairs, deriving each
    /// dimension's points from the rubric total.
    fn from_weights(title: &str, total_points: f64, weights: &[(&str, f64)]) -> Self {
        let dimensions = weights
            .iter()
            .map(|(name, weight)| RubricDimension {
                name:       (*name).to_string(),
                weight:     *weight,
                max_points: weight * total_points,
            })
            .collect();

        Self {
            title: title.to_string(),
            total_points,
            dimensions,
        }
    }

    /// Reads and validates the rubric file at `path`.
    pub fn from_path(path: &Path) -> Result<Self, RubricError> {
        let json = std::fs::read_to_string(path).map_err(|source| RubricError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Parses and validates a rubric from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, RubricError> {
        let raw: RawRubric = serde_json::from_str(json)?;

        if raw.dimensions.is_empty() {
            return Err(RubricError::Empty);
        }

        let total_points = raw.total_points.unwrap_or(100.0);
        if total_points <= 0.0 {
            return Err(RubricError::InvalidTotal(total_points));
        }

        let mut seen = Vec::with_capacity(raw.dimensions.len());
        let mut sum = 0.0;
        for dim in &raw.dimensions {
            if dim.weight <= 0.0 {
                return Err(RubricError::InvalidWeight {
                    name:   dim.name.clone(),
                    weight: dim.weight,
                });
            }
            if seen.contains(&dim.name) {
                return Err(RubricError::DuplicateDimension(dim.name.clone()));
            }
            seen.push(dim.name.clone());
            sum += dim.weight;
        }

        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RubricError::UnbalancedWeights { sum });
        }

        let dimensions = raw
            .dimensions
            .into_iter()
            .map(|dim| RubricDimension {
                max_points: dim.weight * total_points,
                name:       dim.name,
                weight:     dim.weight,
            })
            .collect();

        Ok(Self {
            title: raw.title.unwrap_or_else(|| "Notebook Assessment".to_string()),
            total_points,
            dimensions,
        })
    }

    /// Returns the rubric title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the total points at stake.
    pub fn total_points(&self) -> f64 {
        self.total_points
    }

    /// Returns the scored dimensions in declaration order.
    pub fn dimensions(&self) -> &[RubricDimension] {
        &self.dimensions
    }

    /// Returns the dimension names in declaration order.
    pub fn dimension_names(&self) -> Vec<String> {
        self.dimensions
            .iter()
            .map(|dim| dim.name.clone())
            .collect()
    }

    /// Looks up a dimension by exact name.
    pub fn find(&self, name: &str) -> Option<&RubricDimension> {
        self.dimensions.iter().find(|dim| dim.name == name)
    }
}
