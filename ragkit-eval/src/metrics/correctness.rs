use std::sync::Arc;

use async_trait::async_trait;
use ragkit_model::{OutputSchema, StructuredLlm};
use serde_json::json;

use super::{Judge, Metric, MetricScore};
use crate::config::MetricConfig;
use crate::error::{EvalError, Result};
use crate::record::EvaluationRecord;

/// Step used when no custom evaluation steps are given.
pub const DEFAULT_CORRECTNESS_STEP: &str =
    "Determine whether the actual output is factually correct based on the expected output.";

const MAX_SCORE: u64 = 10;

/// Rubric-driven factual agreement between the generated and expected answer.
///
/// The judge follows a list of evaluation steps, compares only the expected
/// and actual outputs, and returns an integer from 0 to 10 that is scaled
/// to `[0, 1]`.
pub struct CorrectnessMetric {
    judge: Judge,
    steps: Vec<String>,
    schema: OutputSchema,
}

impl CorrectnessMetric {
    /// Create the metric with the default evaluation step.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::ConfigError`] for an invalid config.
    pub fn new(llm: Arc<dyn StructuredLlm>, config: MetricConfig) -> Result<Self> {
        let mut properties = serde_json::Map::new();
        properties.insert("score".into(), json!({ "type": "integer", "minimum": 0, "maximum": MAX_SCORE }));
        let mut required = vec!["score"];
        if config.include_reason {
            properties.insert("reason".into(), json!({ "type": "string" }));
            required.push("reason");
        }
        let schema = OutputSchema::new(
            "correctness_judgement",
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false
            }),
        )?;
        Ok(Self {
            judge: Judge::new(llm, config)?,
            steps: vec![DEFAULT_CORRECTNESS_STEP.to_string()],
            schema,
        })
    }

    /// Replace the evaluation steps.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::ConfigError`] if `steps` is empty.
    pub fn with_steps<I, S>(mut self, steps: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps: Vec<String> = steps.into_iter().map(Into::into).collect();
        if steps.is_empty() {
            return Err(EvalError::ConfigError("correctness needs at least one step".to_string()));
        }
        self.steps = steps;
        Ok(self)
    }

    /// The evaluation steps given to the judge.
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    fn prompt(&self, record: &EvaluationRecord) -> String {
        let steps = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {s}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        let reason = if self.judge.config().include_reason {
            " and a concise reason that cites the specific agreements or discrepancies"
        } else {
            ""
        };
        format!(
            "Evaluation steps:\n{steps}\n\n\
             Expected output:\n{}\n\n\
             Actual output:\n{}\n\n\
             Follow the evaluation steps and return a score from 0 (completely incorrect) \
             to {MAX_SCORE} (fully correct){reason}.",
            record.expected_output, record.actual_output
        )
    }
}

#[async_trait]
impl Metric for CorrectnessMetric {
    fn name(&self) -> &str {
        "Correctness"
    }

    fn config(&self) -> &MetricConfig {
        self.judge.config()
    }

    async fn measure(&self, record: &EvaluationRecord) -> Result<MetricScore> {
        let value = self.judge.ask(self.prompt(record), &self.schema).await?;
        let raw = value.get("score").and_then(|s| s.as_u64()).ok_or_else(|| {
            EvalError::InvalidJudgement {
                metric: self.name().to_string(),
                message: "score is not a non-negative integer".to_string(),
            }
        })?;
        let reason = if self.judge.config().include_reason {
            value.get("reason").and_then(|r| r.as_str()).map(str::to_string)
        } else {
            None
        };
        Ok(MetricScore { score: raw.min(MAX_SCORE) as f64 / MAX_SCORE as f64, reason })
    }
}
