#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Prompt truncation length for rendered scoring payloads.
pub const PROMPT_TRUNCATE: usize = 60_000;

/// Prompt templates for automated scoring and feedback generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentPrompts {
    /// System message framing the scoring task.
    system_message:         String,
    /// Instructions describing the structured response layout.
    response_format:        String,
    /// Per-dimension scoring instructions appended to each request.
    dimension_instructions: String,
}

impl Default for AssessmentPrompts {
    fn default() -> Self {
        Self {
            system_message:         include_str!("prompts/system.md").to_string(),
            response_format:        include_str!("prompts/response_format.md").to_string(),
            dimension_instructions: include_str!("prompts/dimension_instructions.md").to_string(),
        }
    }
}

impl AssessmentPrompts {
    /// Returns the system message prompt.
    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    /// Returns the structured response layout instructions.
    pub fn response_format(&self) -> &str {
        &self.response_format
    }

    /// Returns the per-dimension scoring instructions.
    pub fn dimension_instructions(&self) -> &str {
        &self.dimension_instructions
    }
}

/// Default wall-clock budget for one output comparison pass, seconds.
const DEFAULT_COMPARE_TIMEOUT_SECS: u64 = 30;

/// Default wall-clock budget for one scoring request, seconds.
const DEFAULT_SCORING_TIMEOUT_SECS: u64 = 240;

/// Tunable thresholds and weights used across the assessment pipeline.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentConfig {
    /// Relative tolerance for numeric output equivalence.
    numeric_tolerance:        f64,
    /// Normalized-similarity threshold for text output equivalence.
    similarity_threshold:     f64,
    /// Serialized artifact size above which comparison is skipped.
    size_guard_bytes:         usize,
    /// Wall-clock budget for one full comparison pass.
    compare_timeout:          Duration,
    /// Wall-clock budget for one scoring request.
    scoring_timeout:          Duration,
    /// Number of scoring retries allowed after a failed attempt.
    scoring_retry_budget:     u32,
    /// Points deducted per behavior-changing defect fix.
    defect_fix_penalty:       f64,
    /// Ceiling on the summed validation penalty, percent.
    validation_cap:           f64,
    /// Ceiling on the summed preprocessing penalty, points.
    preprocess_cap:           f64,
    /// Points at stake for output mismatches.
    comparison_weight:        f64,
    /// Per-dimension score substituted when scoring is unavailable.
    baseline_dimension_score: f64,
    /// Minimum length for a salvaged feedback line to be kept.
    min_feedback_line_len:    usize,
    /// Maximum number of lines retained per feedback section.
    max_section_lines:        usize,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            numeric_tolerance:        0.01,
            similarity_threshold:     0.5,
            size_guard_bytes:         200 * 1024,
            compare_timeout:          Duration::from_secs(DEFAULT_COMPARE_TIMEOUT_SECS),
            scoring_timeout:          Duration::from_secs(DEFAULT_SCORING_TIMEOUT_SECS),
            scoring_retry_budget:     1,
            defect_fix_penalty:       0.5,
            validation_cap:           90.0,
            preprocess_cap:           10.0,
            comparison_weight:        15.0,
            baseline_dimension_score: 50.0,
            min_feedback_line_len:    20,
            max_section_lines:        6,
        }
    }
}

impl AssessmentConfig {
    /// Returns the relative tolerance for numeric equivalence.
    pub fn numeric_tolerance(&self) -> f64 {
        self.numeric_tolerance
    }

    /// Returns the similarity threshold for text equivalence.
    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    /// Returns the serialized-size ceiling for comparison.
    pub fn size_guard_bytes(&self) -> usize {
        self.size_guard_bytes
    }

    /// Returns the wall-clock budget for one comparison pass.
    pub fn compare_timeout(&self) -> Duration {
        self.compare_timeout
    }

    /// Returns the wall-clock budget for one scoring request.
    pub fn scoring_timeout(&self) -> Duration {
        self.scoring_timeout
    }

    /// Returns the number of scoring retries allowed.
    pub fn scoring_retry_budget(&self) -> u32 {
        self.scoring_retry_budget
    }

    /// Returns the penalty per behavior-changing defect fix.
    pub fn defect_fix_penalty(&self) -> f64 {
        self.defect_fix_penalty
    }

    /// Returns the validation penalty ceiling, percent.
    pub fn validation_cap(&self) -> f64 {
        self.validation_cap
    }

    /// Returns the preprocessing penalty ceiling, points.
    pub fn preprocess_cap(&self) -> f64 {
        self.preprocess_cap
    }

    /// Returns the points at stake for output mismatches.
    pub fn comparison_weight(&self) -> f64 {
        self.comparison_weight
    }

    /// Returns the substitute per-dimension score used when scoring is
    /// unavailable.
    pub fn baseline_dimension_score(&self) -> f64 {
        self.baseline_dimension_score
    }

    /// Returns the minimum length for a salvaged feedback line.
    pub fn min_feedback_line_len(&self) -> usize {
        self.min_feedback_line_len
    }

    /// Returns the per-section feedback line limit.
    pub fn max_section_lines(&self) -> usize {
        self.max_section_lines
    }

    /// Returns a new config with a custom numeric tolerance.
    pub fn with_numeric_tolerance(mut self, value: f64) -> Self {
        self.numeric_tolerance = value;
        self
    }

    /// Returns a new config with a custom similarity threshold.
    pub fn with_similarity_threshold(mut self, value: f64) -> Self {
        self.similarity_threshold = value;
        self
    }

    /// Returns a new config with a custom size guard.
    pub fn with_size_guard_bytes(mut self, value: usize) -> Self {
        self.size_guard_bytes = value;
        self
    }

    /// Returns a new config with a custom comparison budget.
    pub fn with_compare_timeout(mut self, timeout: Duration) -> Self {
        self.compare_timeout = timeout;
        self
    }

    /// Returns a new config with a custom scoring budget.
    pub fn with_scoring_timeout(mut self, timeout: Duration) -> Self {
        self.scoring_timeout = timeout;
        self
    }

    /// Returns a new config with a custom scoring retry budget.
    pub fn with_scoring_retry_budget(mut self, value: u32) -> Self {
        self.scoring_retry_budget = value;
        self
    }
}

/// Scoring service credentials and tuning parameters sourced from the
/// environment.
#[derive(Clone)]
pub struct ScoringEnv {
    /// Base URL for the OpenAI-compatible API endpoint.
    api_base:        String,
    /// API key used to authenticate scoring requests.
    api_key:         String,
    /// Model identifier for chat completions.
    model:           String,
    /// Optional temperature override, if provided.
    temperature:     Option<f32>,
    /// Optional top-p override, if provided.
    top_p:           Option<f32>,
    /// Optional health-probe URL override, if provided.
    health_endpoint: Option<String>,
}

impl ScoringEnv {
    /// Construct a `ScoringEnv` from environment variables; returns
    /// `None` if any required field is missing.
    fn from_env() -> Option<Self> {
        let api_base = std::env::var("OPENAI_ENDPOINT").ok()?.trim().to_owned();
        let api_key = std::env::var("OPENAI_API_KEY").ok()?.trim().to_owned();
        let model = std::env::var("OPENAI_MODEL").ok()?.trim().to_owned();

        if api_base.is_empty() || api_key.is_empty() || model.is_empty() {
            return None;
        }

        let temperature = std::env::var("OPENAI_TEMPERATURE")
            .ok()
            .and_then(|s| s.parse::<f32>().ok());
        let top_p = std::env::var("OPENAI_TOP_P")
            .ok()
            .and_then(|s| s.parse::<f32>().ok());
        let health_endpoint = std::env::var("NBGRADE_HEALTH_ENDPOINT")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        Some(Self {
            api_base,
            api_key,
            model,
            temperature,
            top_p,
            health_endpoint,
        })
    }

    /// Returns the API base URL used for scoring requests.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns the API key used for scoring requests.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the configured temperature, if any.
    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    /// Returns the configured top_p, if any.
    pub fn top_p(&self) -> Option<f32> {
        self.top_p
    }

    /// Returns the URL probed for service availability. Defaults to the
    /// endpoint's model listing when no override is configured.
    pub fn health_endpoint(&self) -> String {
        self.health_endpoint
            .clone()
            .unwrap_or_else(|| format!("{}/models", self.api_base.trim_end_matches('/')))
    }
}

/// Runtime, prompt, and threshold configuration shared across the crate.
pub struct ConfigState {
    /// Shared reqwest HTTP client reused across network helpers.
    http_client: Client,
    /// Prompt templates for automated scoring.
    prompts:     AssessmentPrompts,
    /// Pipeline thresholds and weights.
    assessment:  Mutex<AssessmentConfig>,
    /// Cached scoring service configuration, if available.
    scoring:     Option<ScoringEnv>,
    /// Course identifier carried into generated reports.
    course:      String,
    /// Academic term identifier carried into generated reports.
    term:        String,
}

impl ConfigState {
    /// Construct a new configuration instance by reading environment and
    /// prompt assets.
    fn new() -> Result<Self> {
        let http_client = Client::builder()
            // Avoid macOS dynamic store lookups that fail in sandboxed
            // environments.
            .no_proxy()
            .build()
            .context("Failed to construct shared HTTP client")?;

        let assessment = AssessmentConfig::default()
            .with_compare_timeout(read_timeout_secs(
                "NBGRADE_COMPARE_TIMEOUT_SECS",
                DEFAULT_COMPARE_TIMEOUT_SECS,
            ))
            .with_scoring_timeout(read_timeout_secs(
                "NBGRADE_SCORING_TIMEOUT_SECS",
                DEFAULT_SCORING_TIMEOUT_SECS,
            ));

        let course = std::env::var("NBGRADE_COURSE").unwrap_or_else(|_| "DATA 1511".to_string());
        let term = std::env::var("NBGRADE_TERM").unwrap_or_else(|_| "Fall 2025".to_string());

        Ok(Self {
            http_client,
            prompts: AssessmentPrompts::default(),
            assessment: Mutex::new(assessment),
            scoring: ScoringEnv::from_env(),
            course,
            term,
        })
    }

    /// Returns a clone of the shared reqwest HTTP client.
    pub fn http_client(&self) -> Client {
        self.http_client.clone()
    }

    /// Returns the prompt bundle.
    pub fn prompts(&self) -> &AssessmentPrompts {
        &self.prompts
    }

    /// Returns the scoring service configuration, if all required
    /// environment variables are present.
    pub fn scoring(&self) -> Option<&ScoringEnv> {
        self.scoring.as_ref()
    }

    /// Returns the course identifier.
    pub fn course(&self) -> &str {
        &self.course
    }

    /// Returns the academic term identifier.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Returns the current assessment thresholds.
    pub fn assessment_defaults(&self) -> AssessmentConfig {
        *self.assessment.lock().expect("assessment config poisoned")
    }

    /// Replaces the assessment thresholds wholesale.
    pub fn set_assessment_defaults(&self, cfg: AssessmentConfig) {
        *self.assessment.lock().expect("assessment config poisoned") = cfg;
    }

    /// Returns the configured numeric tolerance.
    pub fn numeric_tolerance(&self) -> f64 {
        self.assessment_defaults().numeric_tolerance()
    }

    /// Sets the configured numeric tolerance.
    pub fn set_numeric_tolerance(&self, value: f64) {
        let cfg = self.assessment_defaults().with_numeric_tolerance(value);
        self.set_assessment_defaults(cfg);
    }

    /// Returns the configured similarity threshold.
    pub fn similarity_threshold(&self) -> f64 {
        self.assessment_defaults().similarity_threshold()
    }

    /// Sets the configured similarity threshold.
    pub fn set_similarity_threshold(&self, value: f64) {
        let cfg = self.assessment_defaults().with_similarity_threshold(value);
        self.set_assessment_defaults(cfg);
    }

    /// Returns the configured comparison budget.
    pub fn compare_timeout(&self) -> Duration {
        self.assessment_defaults().compare_timeout()
    }

    /// Returns the configured scoring budget.
    pub fn scoring_timeout(&self) -> Duration {
        self.assessment_defaults().scoring_timeout()
    }
}

/// Borrowed view of the prompt catalog that keeps the underlying
/// configuration alive.
pub struct PromptsRef(ConfigHandle);

impl std::ops::Deref for PromptsRef {
    type Target = AssessmentPrompts;

    fn deref(&self) -> &Self::Target {
        self.0.prompts()
    }
}

/// Borrowed view of the scoring service configuration tied to the
/// global config.
pub struct ScoringRef(ConfigHandle);

impl std::ops::Deref for ScoringRef {
    type Target = ScoringEnv;

    fn deref(&self) -> &Self::Target {
        self.0.scoring.as_ref().expect("scoring config missing")
    }
}

/// Shared configuration handle used throughout the crate.
#[derive(Clone)]
pub struct ConfigHandle(Arc<ConfigState>);

impl std::ops::Deref for ConfigHandle {
    type Target = ConfigState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Global storage for the lazily constructed configuration state.
static CONFIG_SLOT: OnceLock<Mutex<Option<Arc<ConfigState>>>> = OnceLock::new();

/// Returns the mutex guarding the global configuration slot.
fn slot() -> &'static Mutex<Option<Arc<ConfigState>>> {
    CONFIG_SLOT.get_or_init(|| Mutex::new(None))
}

/// Builds a fresh configuration instance and wraps it in an `Arc`.
fn build_default() -> Result<Arc<ConfigState>> {
    ConfigState::new().map(Arc::new)
}

/// Ensure the global configuration has been initialized and return a
/// handle.
pub fn ensure_initialized() -> Result<ConfigHandle> {
    let slot = slot();
    let mut guard = slot.lock().expect("config slot poisoned");
    if let Some(cfg) = guard.as_ref() {
        return Ok(ConfigHandle(Arc::clone(cfg)));
    }

    let cfg = build_default()?;
    *guard = Some(Arc::clone(&cfg));
    Ok(ConfigHandle(cfg))
}

/// Returns the active configuration, initializing it on demand.
pub fn get() -> ConfigHandle {
    ensure_initialized().expect("configuration initialization failed")
}

/// Returns a clone of the shared reqwest HTTP client.
pub fn http_client() -> Client {
    get().http_client()
}

/// Returns the configured prompt bundle.
pub fn prompts() -> PromptsRef {
    PromptsRef(get())
}

/// Returns the configured scoring environment, if set.
pub fn scoring_config() -> Option<ScoringRef> {
    let handle = get();
    if handle.scoring.is_some() {
        Some(ScoringRef(handle))
    } else {
        None
    }
}

/// Returns the configured course identifier.
pub fn course() -> String {
    get().course.clone()
}

/// Returns the configured term identifier.
pub fn term() -> String {
    get().term.clone()
}

/// Returns the current assessment thresholds.
pub fn assessment_defaults() -> AssessmentConfig {
    get().assessment_defaults()
}

/// Overrides the assessment thresholds wholesale.
pub fn set_assessment_defaults(cfg: AssessmentConfig) {
    get().set_assessment_defaults(cfg);
}

/// Returns the configured numeric tolerance.
pub fn numeric_tolerance() -> f64 {
    get().numeric_tolerance()
}

/// Sets the configured numeric tolerance.
pub fn set_numeric_tolerance(value: f64) {
    get().set_numeric_tolerance(value);
}

/// Returns the configured similarity threshold.
pub fn similarity_threshold() -> f64 {
    get().similarity_threshold()
}

/// Sets the configured similarity threshold.
pub fn set_similarity_threshold(value: f64) {
    get().set_similarity_threshold(value);
}

/// Returns the configured comparison budget.
pub fn compare_timeout() -> Duration {
    get().compare_timeout()
}

/// Returns the configured scoring budget.
pub fn scoring_timeout() -> Duration {
    get().scoring_timeout()
}

/// Parses an environment variable into a `Duration`, falling back to
/// `default_secs` when parsing fails or the variable is missing.
fn read_timeout_secs(env: &str, default_secs: u64) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}
