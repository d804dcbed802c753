#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Defect preprocessing: rewrites known submission defects (dead pandas
//! indexers, Python 2 print statements, typographic quotes) so later
//! stages see runnable code, and records a small penalty for each
//! behavior-changing fix.

use std::fmt::Display;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    config::AssessmentConfig,
    notebook::Artifact,
};

/// One known defect: an identifier, rewrite rules, and the penalty a
/// fix carries.
pub struct DefectPattern {
    /// Stable defect identifier, reported with every fix.
    id:          String,
    /// Human-readable description of the rewrite.
    description: String,
    /// Rewrite rules applied in order.
    rules:       Vec<(Regex, String)>,
    /// Points deducted when this defect is fixed in a cell; zero for
    /// cosmetic rewrites.
    penalty:     f64,
}

impl DefectPattern {
    /// Creates a pattern with no rules yet.
    pub fn new(id: &str, description: &str, penalty: f64) -> Self {
        Self {
            id:          id.to_string(),
            description: description.to_string(),
            rules:       Vec::new(),
            penalty,
        }
    }

    /// Adds one rewrite rule. Replacement strings use `${n}` group
    /// references.
    pub fn with_rule(mut self, pattern: &str, replacement: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .with_context(|| format!("Defect rule for `{}` failed to compile", self.id))?;
        self.rules.push((regex, replacement.to_string()));
        Ok(self)
    }

    /// Returns the defect identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the rewrite description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the per-fix penalty.
    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    /// Returns true when fixing this defect carries no penalty.
    pub fn is_cosmetic(&self) -> bool {
        self.penalty == 0.0
    }

    /// Applies every rule to `source`, returning the rewritten text and
    /// the number of replaced occurrences.
    fn apply(&self, source: &str) -> (String, usize) {
        let mut current = source.to_string();
        let mut occurrences = 0;

        for (regex, replacement) in &self.rules {
            let count = regex.find_iter(&current).count();
            if count > 0 {
                current = regex.replace_all(&current, replacement.as_str()).into_owned();
                occurrences += count;
            }
        }

        (current, occurrences)
    }
}

/// The ordered set of defect patterns applied to every submission.
pub struct DefectCatalog {
    /// Patterns in application order.
    patterns: Vec<DefectPattern>,
}

impl DefectCatalog {
    /// Builds the standard catalog for course submissions.
    pub fn standard(config: &AssessmentConfig) -> Result<Self> {
        let penalty = config.defect_fix_penalty();

        let patterns = vec![
            DefectPattern::new(
                "chained-ix-indexer",
                "removed pandas `.ix` indexer replaced with `.loc`",
                penalty,
            )
            .with_rule(r"\.ix\[", ".loc[")?,
            DefectPattern::new(
                "py2-print-statement",
                "Python 2 print statement rewritten as a call",
                penalty,
            )
            .with_rule(r"(?m)^(\s*)print\s+([^(>\s].*?)\s*$", "${1}print(${2})")?,
            DefectPattern::new(
                "smart-quotes",
                "typographic quotes replaced with straight quotes",
                penalty,
            )
            .with_rule("[\u{201C}\u{201D}]", "\"")?
            .with_rule("[\u{2018}\u{2019}]", "'")?,
            DefectPattern::new(
                "trailing-whitespace",
                "trailing whitespace stripped",
                0.0,
            )
            .with_rule(r"(?m)[ \t]+$", "")?,
        ];

        Ok(Self { patterns })
    }

    /// Returns the patterns in application order.
    pub fn patterns(&self) -> &[DefectPattern] {
        &self.patterns
    }

    /// Appends a custom pattern after the standard ones.
    pub fn with_pattern(mut self, pattern: DefectPattern) -> Self {
        self.patterns.push(pattern);
        self
    }
}

/// One defect fixed in one cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedFix {
    /// Defect identifier from the catalog.
    pub defect:      String,
    /// Document position of the rewritten cell.
    pub cell_index:  usize,
    /// Number of occurrences replaced in the cell.
    pub occurrences: usize,
    /// Points deducted for this fix.
    pub penalty:     f64,
    /// Human-readable description of the rewrite.
    pub description: String,
}

impl Display for AppliedFix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[cell {}] {} ({} occurrence{})",
            self.cell_index,
            self.defect,
            self.occurrences,
            if self.occurrences == 1 { "" } else { "s" }
        )
    }
}

/// Everything the preprocessor changed, with the capped penalty already
/// computed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessingReport {
    /// Fixes in (cell, catalog) order.
    pub fixes:   Vec<AppliedFix>,
    /// Summed fix penalties before the cap, points.
    pub raw_sum: f64,
    /// Penalty after the cap, points.
    pub penalty: f64,
}

impl PreprocessingReport {
    /// Returns true when nothing was rewritten.
    pub fn is_clean(&self) -> bool {
        self.fixes.is_empty()
    }

    /// Returns one summary line per fix, for reports.
    pub fn summaries(&self) -> Vec<String> {
        self.fixes.iter().map(AppliedFix::to_string).collect()
    }
}

/// Rewrites known defects in executable cells. Applying the
/// preprocessor to its own output changes nothing.
pub struct DefectPreprocessor {
    /// Ordered defect patterns.
    catalog: DefectCatalog,
    /// Ceiling on the summed fix penalty, points.
    cap:     f64,
}

impl DefectPreprocessor {
    /// Creates a preprocessor with the standard catalog.
    pub fn standard(config: &AssessmentConfig) -> Result<Self> {
        Ok(Self {
            catalog: DefectCatalog::standard(config)?,
            cap:     config.preprocess_cap(),
        })
    }

    /// Creates a preprocessor with a custom catalog.
    pub fn with_catalog(catalog: DefectCatalog, config: &AssessmentConfig) -> Self {
        Self {
            catalog,
            cap: config.preprocess_cap(),
        }
    }

    /// Rewrites `artifact` and reports every fix applied. Narrative
    /// cells pass through untouched.
    pub fn apply(&self, artifact: &Artifact) -> (Artifact, PreprocessingReport) {
        let mut fixes = Vec::new();
        let mut cells = Vec::with_capacity(artifact.len());

        for (index, cell) in artifact.cells().iter().enumerate() {
            if !cell.is_executable() {
                cells.push(cell.clone());
                continue;
            }

            let mut source = cell.source().to_string();
            for pattern in self.catalog.patterns() {
                let (rewritten, occurrences) = pattern.apply(&source);
                if occurrences > 0 {
                    fixes.push(AppliedFix {
                        defect:      pattern.id().to_string(),
                        cell_index:  index,
                        occurrences,
                        penalty:     pattern.penalty(),
                        description: pattern.description().to_string(),
                    });
                    source = rewritten;
                }
            }

            if source == cell.source() {
                cells.push(cell.clone());
            } else {
                cells.push(cell.with_source(source));
            }
        }

        let raw_sum: f64 = fixes.iter().map(|fix| fix.penalty).sum();
        let penalty = raw_sum.min(self.cap);

        (
            Artifact::from_cells(cells),
            PreprocessingReport {
                fixes,
                raw_sum,
                penalty,
            },
        )
    }
}
