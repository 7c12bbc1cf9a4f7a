use std::sync::Arc;

use async_trait::async_trait;
use ragkit_model::{OutputSchema, StructuredLlm};
use serde_json::json;
use tracing::debug;

use super::{Judge, Metric, MetricScore, Verdict, numbered, parse_verdicts, verdicts_schema};
use crate::config::MetricConfig;
use crate::error::{EvalError, Result};
use crate::record::EvaluationRecord;

/// Share of the answer's claims that the retrieved context does not contradict.
///
/// The judge first lists the factual claims in the generated answer, then
/// gives each claim a `yes`, `no`, or `idk` verdict against the retrieval
/// context. Only `no` counts against the answer. An answer with no claims
/// scores 1.0.
pub struct FaithfulnessMetric {
    judge: Judge,
    claims_schema: OutputSchema,
    verdicts_schema: OutputSchema,
}

impl FaithfulnessMetric {
    /// Create the metric.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::ConfigError`] for an invalid config.
    pub fn new(llm: Arc<dyn StructuredLlm>, config: MetricConfig) -> Result<Self> {
        let claims_schema = OutputSchema::new(
            "faithfulness_claims",
            json!({
                "type": "object",
                "properties": {
                    "claims": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["claims"],
                "additionalProperties": false
            }),
        )?;
        let verdicts_schema = verdicts_schema("faithfulness_verdicts", &["yes", "no", "idk"], &[])?;
        Ok(Self { judge: Judge::new(llm, config)?, claims_schema, verdicts_schema })
    }

    async fn claims(&self, answer: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Extract every factual claim made in the text below as a list of short, \
             self-contained statements. Do not add information that is not in the text.\n\n\
             Text:\n{answer}"
        );
        let value = self.judge.ask(prompt, &self.claims_schema).await?;
        let claims = value
            .get("claims")
            .and_then(|c| c.as_array())
            .map(|items| items.iter().filter_map(|c| c.as_str()).map(str::to_string).collect())
            .unwrap_or_default();
        Ok(claims)
    }
}

#[async_trait]
impl Metric for FaithfulnessMetric {
    fn name(&self) -> &str {
        "Faithfulness"
    }

    fn config(&self) -> &MetricConfig {
        self.judge.config()
    }

    async fn measure(&self, record: &EvaluationRecord) -> Result<MetricScore> {
        let claims = self.claims(&record.actual_output).await?;
        if claims.is_empty() {
            let reason = self
                .judge
                .config()
                .include_reason
                .then(|| "The answer makes no factual claims.".to_string());
            return Ok(MetricScore { score: 1.0, reason });
        }

        let listed =
            claims.iter().enumerate().map(|(i, c)| format!("{}. {c}", i + 1)).collect::<Vec<_>>();
        let prompt = format!(
            "For each claim, answer 'yes' if the context supports it, 'no' if the context \
             contradicts it, or 'idk' if the context does not say. Return exactly one verdict \
             per claim, in order, with a reason for every 'no'.\n\n\
             Context:\n{}\n\nClaims:\n{}",
            numbered(&record.retrieval_context),
            listed.join("\n")
        );
        let verdicts = parse_verdicts(self.name(), self.judge.ask(prompt, &self.verdicts_schema).await?)?;
        if verdicts.len() != claims.len() {
            return Err(EvalError::InvalidJudgement {
                metric: self.name().to_string(),
                message: format!("{} verdicts for {} claims", verdicts.len(), claims.len()),
            });
        }

        let contradicted: Vec<_> = verdicts.iter().filter(|v| v.verdict == Verdict::No).collect();
        let score = (claims.len() - contradicted.len()) as f64 / claims.len() as f64;
        debug!(claims = claims.len(), contradicted = contradicted.len(), score, "faithfulness scored");

        let reason = self.judge.config().include_reason.then(|| {
            if contradicted.is_empty() {
                format!("All {} claims are consistent with the retrieval context.", claims.len())
            } else {
                let why: Vec<&str> = contradicted.iter().filter_map(|v| v.reason.as_deref()).collect();
                format!(
                    "{} of {} claims contradict the retrieval context. {}",
                    contradicted.len(),
                    claims.len(),
                    why.join(" ")
                )
                .trim_end()
                .to_string()
            }
        });
        Ok(MetricScore { score, reason })
    }
}
