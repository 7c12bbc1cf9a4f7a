//! LLM-judged evaluation metrics.
//!
//! Each metric scores one [`EvaluationRecord`] at a time and returns a value
//! in `[0, 1]`. Passing is decided by the harness from the metric's
//! configured threshold, so a low score and a failed scoring call stay
//! distinguishable.

mod correctness;
mod faithfulness;
mod relevancy;

use std::sync::Arc;

use async_trait::async_trait;
use ragkit_model::{GenerationConfig, OutputSchema, StructuredLlm, StructuredRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

pub use correctness::{CorrectnessMetric, DEFAULT_CORRECTNESS_STEP};
pub use faithfulness::FaithfulnessMetric;
pub use relevancy::ContextualRelevancyMetric;

use crate::config::MetricConfig;
use crate::error::{EvalError, Result};
use crate::record::EvaluationRecord;

/// System instruction sent with every judge request.
pub const JUDGE_INSTRUCTION: &str =
    "You are a strict evaluator. Respond only with JSON matching the schema.";

/// A metric's judgement of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Justification, when the metric is configured to give one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Scores evaluation records.
///
/// Implementations must treat each call independently so the harness can
/// score record/metric pairs in any order or concurrently.
#[async_trait]
pub trait Metric: Send + Sync {
    /// Display name used in reports.
    fn name(&self) -> &str;

    /// Threshold, judge model, and reason settings.
    fn config(&self) -> &MetricConfig;

    /// Score one record.
    async fn measure(&self, record: &EvaluationRecord) -> Result<MetricScore>;
}

/// Verdict labels used by claim- and statement-level judges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Verdict {
    Yes,
    No,
    Idk,
}

/// Shared plumbing for metrics that ask a judge model for JSON.
pub(crate) struct Judge {
    llm: Arc<dyn StructuredLlm>,
    config: MetricConfig,
}

impl Judge {
    pub(crate) fn new(llm: Arc<dyn StructuredLlm>, config: MetricConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { llm, config })
    }

    pub(crate) fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// One deterministic structured call against the configured judge model.
    pub(crate) async fn ask(&self, prompt: String, schema: &OutputSchema) -> Result<Value> {
        let request = StructuredRequest::new(prompt, schema.clone())
            .with_instruction(JUDGE_INSTRUCTION)
            .with_config(GenerationConfig::deterministic())
            .with_model(self.config.model.clone());
        let value = self.llm.generate_structured(request).await?;
        debug!(schema = schema.name(), model = %self.config.model, "judge responded");
        Ok(value)
    }
}

/// Schema for a `{"verdicts": [{"verdict", "reason"}, ...]}` response.
///
/// `reason` is nullable but always present. `extra` adds further required
/// string fields to each verdict object.
pub(crate) fn verdicts_schema(name: &str, labels: &[&str], extra: &[&str]) -> Result<OutputSchema> {
    let mut properties = serde_json::Map::new();
    properties.insert("verdict".into(), json!({ "type": "string", "enum": labels }));
    properties.insert("reason".into(), json!({ "type": ["string", "null"] }));
    let mut required = vec!["verdict".to_string(), "reason".to_string()];
    for field in extra {
        properties.insert((*field).into(), json!({ "type": "string" }));
        required.push((*field).to_string());
    }
    Ok(OutputSchema::new(
        name,
        json!({
            "type": "object",
            "properties": {
                "verdicts": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": properties,
                        "required": required,
                        "additionalProperties": false
                    }
                }
            },
            "required": ["verdicts"],
            "additionalProperties": false
        }),
    )?)
}

/// A judged item: its verdict plus the judge's optional explanation.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JudgedItem {
    pub verdict: Verdict,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub statement: Option<String>,
}

/// Decode the `verdicts` array of a judge response.
pub(crate) fn parse_verdicts(metric: &str, value: Value) -> Result<Vec<JudgedItem>> {
    #[derive(Deserialize)]
    struct Verdicts {
        verdicts: Vec<JudgedItem>,
    }
    serde_json::from_value::<Verdicts>(value)
        .map(|v| v.verdicts)
        .map_err(|e| EvalError::InvalidJudgement { metric: metric.to_string(), message: e.to_string() })
}

/// Render the retrieval context as a numbered list for judge prompts.
pub(crate) fn numbered(context: &[String]) -> String {
    if context.is_empty() {
        return "(no context)".to_string();
    }
    context
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {c}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
