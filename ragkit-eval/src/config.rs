//! Harness and metric configuration.

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// Default judge model for every metric.
pub const DEFAULT_JUDGE_MODEL: &str = "gpt-4o";

/// Settings shared by every LLM-judged metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Judge model (or Azure deployment) requested for every call.
    pub model: String,
    /// Minimum score, in `[0, 1]`, counted as a pass.
    pub threshold: f64,
    /// Ask the judge for a textual justification.
    pub include_reason: bool,
}

impl MetricConfig {
    /// Create a config with the given threshold and the default judge model.
    pub fn new(threshold: f64, include_reason: bool) -> Self {
        Self { model: DEFAULT_JUDGE_MODEL.to_string(), threshold, include_reason }
    }

    /// Correctness defaults: threshold 0.5, with reason.
    pub fn correctness() -> Self {
        Self::new(0.5, true)
    }

    /// Faithfulness defaults: threshold 0.7, no reason.
    pub fn faithfulness() -> Self {
        Self::new(0.7, false)
    }

    /// Contextual relevancy defaults: threshold 1.0 (strict), with reason.
    pub fn contextual_relevancy() -> Self {
        Self::new(1.0, true)
    }

    /// Use a different judge model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use a different pass threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Whether a score passes this metric.
    pub fn passes(&self, score: f64) -> bool {
        score >= self.threshold
    }

    /// Check that the threshold lies in `[0, 1]` and a model is named.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::ConfigError`] naming the offending value.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(EvalError::ConfigError(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.model.trim().is_empty() {
            return Err(EvalError::ConfigError("judge model must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Harness settings.
///
/// `num_questions` has no default: callers state how many questions to
/// evaluate instead of silently getting a debugging-sized run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Upper bound on questions evaluated; longer question sets are truncated.
    pub num_questions: usize,
    /// Questions (and later record/metric pairs) in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    1
}

impl EvalConfig {
    /// Evaluate up to `num_questions`, one at a time.
    pub fn new(num_questions: usize) -> Self {
        Self { num_questions, concurrency: default_concurrency() }
    }

    /// Allow up to `concurrency` questions in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::ConfigError`] if `num_questions` or
    /// `concurrency` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.num_questions == 0 {
            return Err(EvalError::ConfigError(
                "num_questions must be greater than zero".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(EvalError::ConfigError("concurrency must be greater than zero".to_string()));
        }
        Ok(())
    }
}
