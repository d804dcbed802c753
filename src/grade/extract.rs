#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Response extraction: turns raw scoring-service text into a
//! [`ScoringResult`]. Prefers the structured JSON layout; falls back to
//! salvaging scores and feedback lines from free text. Either way the
//! returned feedback never contains service self-references and never
//! has an empty section.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::{Regex, RegexSet};
use serde::Deserialize;

use crate::{
    config::AssessmentConfig,
    grade::results::{FeedbackSections, ScoringResult},
    rubric::Rubric,
};

/// Ceiling on how many JSON candidates one response is scanned for.
const MAX_JSON_CANDIDATES: usize = 32;

/// Phrases that must never reach a student. Lines containing one are
/// dropped, not rewritten. Covers service self-reference, first-person
/// planning, internal step markers, raw score restatements, and
/// third-person narration about the student.
const FORBIDDEN_PATTERNS: &[&str] = &[
    r"(?i)as an ai\b",
    r"(?i)language model",
    r"(?i)\bai (assistant|model|system)\b",
    r"(?i)system prompt",
    r"(?i)\bmy (instructions|training|guidelines)\b",
    r"(?i)i cannot assist",
    r"(?i)\bllm\b",
    r"(?i)^(i|we)('ll| will| am going to| need to| should)\b",
    r"(?i)\blet me (start|begin|analyze|evaluate|look|review|examine)\b",
    r"(?i)\b(first|next|now),? (i|we) (will|need|look|examine|check)\b",
    r"(?i)^#*\s*step \d",
    r"(?i)\bstep \d+\s*[:.]",
    r"(?i)\bscores?\s*[:=]\s*\d",
    r"(?i)\b(final|overall|total) score\b.{0,20}\d",
    r"(?i):\s*\d{1,3}(?:\.\d+)?\s*(?:/\s*100)?\s*$",
    r"(?i)\bout of 100\b",
    r"(?i)\bthe student('s)?\b",
];

/// The feedback section a salvaged line lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    /// Things the submission does well.
    Strengths,
    /// Shortcomings.
    Gaps,
    /// Actionable next steps.
    Recommendations,
}

impl SectionKind {
    /// Recognizes a section header line, tolerant of markdown
    /// decoration and common synonyms.
    fn from_header(line: &str) -> Option<Self> {
        let normalized = line
            .trim_start_matches(['#', '*', '-', ' '])
            .trim_end_matches(['*', ':', ' '])
            .to_ascii_lowercase();

        match normalized.as_str() {
            "strengths" | "strength" | "what went well" => Some(SectionKind::Strengths),
            "gaps" | "weaknesses" | "areas for improvement" | "areas to improve" => {
                Some(SectionKind::Gaps)
            }
            "recommendations" | "suggestions" | "next steps" => Some(SectionKind::Recommendations),
            _ => None,
        }
    }
}

/// The structured response layout the service is asked for.
#[derive(Debug, Deserialize)]
struct RawResponse {
    /// Dimension name to reported score.
    scores:   BTreeMap<String, serde_json::Value>,
    /// Sectioned feedback, if provided.
    #[serde(default)]
    feedback: Option<RawFeedback>,
}

/// Feedback sections as they appear in the structured layout.
#[derive(Debug, Default, Deserialize)]
struct RawFeedback {
    /// Things the submission does well.
    #[serde(default)]
    strengths:       Vec<String>,
    /// Shortcomings.
    #[serde(default)]
    gaps:            Vec<String>,
    /// Actionable next steps.
    #[serde(default)]
    recommendations: Vec<String>,
}

/// Extracts scores and feedback from raw scoring responses.
pub struct ResponseExtractor {
    /// Threshold bundle, for line-length and section-size limits.
    config:    AssessmentConfig,
    /// Compiled forbidden-phrase patterns.
    forbidden: RegexSet,
}

impl ResponseExtractor {
    /// Creates an extractor with the given thresholds.
    pub fn new(config: AssessmentConfig) -> Result<Self> {
        let forbidden = RegexSet::new(FORBIDDEN_PATTERNS)
            .context("Forbidden-phrase patterns failed to compile")?;

        Ok(Self { config, forbidden })
    }

    /// Extracts a scoring result from `raw`. Sets `salvaged` when the
    /// structured layout could not be used.
    pub fn extract(&self, raw: &str, rubric: &Rubric) -> ScoringResult {
        if let Some(result) = self.extract_structured(raw, rubric) {
            return result;
        }
        self.extract_filtered(raw, rubric)
    }

    /// Tries every JSON candidate in the response; succeeds on the
    /// first whose scores name at least one rubric dimension.
    fn extract_structured(&self, raw: &str, rubric: &Rubric) -> Option<ScoringResult> {
        for candidate in json_candidates(raw) {
            let Ok(parsed) = serde_json::from_str::<RawResponse>(candidate) else {
                continue;
            };

            let scores = self.canonical_scores(&parsed.scores, rubric);
            if scores.is_empty() {
                continue;
            }

            let feedback = parsed.feedback.unwrap_or_default();
            let feedback = FeedbackSections {
                strengths:       self.sanitize_lines(feedback.strengths),
                gaps:            self.sanitize_lines(feedback.gaps),
                recommendations: self.sanitize_lines(feedback.recommendations),
            }
            .fill_empty_sections();

            return Some(
                ScoringResult::builder()
                    .scores(scores)
                    .feedback(feedback)
                    .build(),
            );
        }

        None
    }

    /// Salvages what it can from a response that failed structured
    /// extraction.
    fn extract_filtered(&self, raw: &str, rubric: &Rubric) -> ScoringResult {
        let scores = self.salvage_scores(raw, rubric);
        let feedback = self.harvest_sections(raw).fill_empty_sections();

        ScoringResult::builder()
            .scores(scores)
            .feedback(feedback)
            .salvaged(true)
            .build()
    }

    /// Maps raw score keys onto rubric dimension names, coercing values
    /// and clamping them to the 0-100 scale.
    fn canonical_scores(
        &self,
        raw: &BTreeMap<String, serde_json::Value>,
        rubric: &Rubric,
    ) -> BTreeMap<String, f64> {
        let mut scores = BTreeMap::new();

        for (key, value) in raw {
            let Some(dimension) = rubric
                .dimensions()
                .iter()
                .find(|dim| dim.name().eq_ignore_ascii_case(key.trim()))
            else {
                continue;
            };
            let Some(score) = coerce_score(value) else {
                continue;
            };
            scores.insert(dimension.name().to_string(), score.clamp(0.0, 100.0));
        }

        scores
    }

    /// Looks for each dimension's score near its name in free text.
    fn salvage_scores(&self, raw: &str, rubric: &Rubric) -> BTreeMap<String, f64> {
        let mut scores = BTreeMap::new();

        for dimension in rubric.dimensions() {
            let pattern = format!(
                r"(?i){}\D{{0,40}}?(\d+(?:\.\d+)?)",
                regex::escape(dimension.name())
            );
            let Ok(regex) = Regex::new(&pattern) else {
                continue;
            };
            let Some(captures) = regex.captures(raw) else {
                continue;
            };
            if let Some(score) = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                scores.insert(dimension.name().to_string(), score.clamp(0.0, 100.0));
            }
        }

        scores
    }

    /// Routes free-text lines into feedback sections. Lines before any
    /// recognized header land in gaps.
    fn harvest_sections(&self, raw: &str) -> FeedbackSections {
        let mut sections = FeedbackSections::default();
        let mut current = SectionKind::Gaps;

        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("```") {
                continue;
            }
            if let Some(kind) = SectionKind::from_header(trimmed) {
                current = kind;
                continue;
            }

            let cleaned = strip_bullet(trimmed);
            if cleaned.len() < self.config.min_feedback_line_len()
                || looks_like_json(cleaned)
                || self.forbidden.is_match(cleaned)
            {
                continue;
            }

            let target = match current {
                SectionKind::Strengths => &mut sections.strengths,
                SectionKind::Gaps => &mut sections.gaps,
                SectionKind::Recommendations => &mut sections.recommendations,
            };
            if target.len() < self.config.max_section_lines() {
                target.push(cleaned.to_string());
            }
        }

        sections
    }

    /// Drops forbidden or empty lines and caps the section length.
    fn sanitize_lines(&self, lines: Vec<String>) -> Vec<String> {
        lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .filter(|line| !self.forbidden.is_match(line))
            .take(self.config.max_section_lines())
            .collect()
    }
}

/// Coerces a JSON value into a score, accepting numbers and numeric
/// strings.
fn coerce_score(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Returns every JSON object candidate in the response: fenced blocks
/// first, then balanced-brace spans, bounded in number.
fn json_candidates(raw: &str) -> Vec<&str> {
    let mut candidates = fenced_candidates(raw);
    candidates.extend(balanced_candidates(raw, MAX_JSON_CANDIDATES));
    candidates.truncate(MAX_JSON_CANDIDATES);
    candidates
}

/// Returns the contents of fenced code blocks that look like objects.
fn fenced_candidates(raw: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut rest = raw;

    while let Some(start) = rest.find("```") {
        let after_fence = &rest[start + 3..];
        let Some(end) = after_fence.find("```") else {
            break;
        };

        let block = &after_fence[..end];
        // Drop the info string ("json") on the opening fence line.
        let body = block.split_once('\n').map_or(block, |(_, tail)| tail);
        let body = body.trim();
        if body.starts_with('{') {
            candidates.push(body);
        }

        rest = &after_fence[end + 3..];
    }

    candidates
}

/// Scans for brace-balanced spans, honoring JSON string syntax.
fn balanced_candidates(raw: &str, limit: usize) -> Vec<&str> {
    let bytes = raw.as_bytes();
    let mut candidates = Vec::new();
    let mut search_from = 0;

    while candidates.len() < limit {
        let Some(open_rel) = raw[search_from..].find('{') else {
            break;
        };
        let open = search_from + open_rel;

        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        let mut close = None;

        for (offset, byte) in bytes[open..].iter().enumerate() {
            if escaped {
                escaped = false;
                continue;
            }
            match byte {
                b'\\' if in_string => escaped = true,
                b'"' => in_string = !in_string,
                b'{' if !in_string => depth += 1,
                b'}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + offset);
                        break;
                    }
                }
                _ => {}
            }
        }

        match close {
            Some(end) => {
                candidates.push(&raw[open..=end]);
                search_from = open + 1;
            }
            None => break,
        }
    }

    candidates
}

/// Strips leading markdown bullet decoration from a salvaged line.
fn strip_bullet(line: &str) -> &str {
    let stripped = line.trim_start_matches(['-', '*', '•']).trim_start();

    let digits = stripped.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &stripped[digits..];
        if let Some(tail) = rest.strip_prefix(['.', ')']) {
            return tail.trim_start();
        }
    }

    stripped
}

/// Returns true for lines that are JSON debris rather than prose.
fn looks_like_json(line: &str) -> bool {
    line.starts_with(['{', '}', '[', ']'])
        || (line.starts_with('"') && line.contains("\":"))
}
