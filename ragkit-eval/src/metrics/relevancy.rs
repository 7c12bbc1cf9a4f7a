use std::sync::Arc;

use async_trait::async_trait;
use ragkit_model::{OutputSchema, StructuredLlm};
use tracing::debug;

use super::{Judge, JudgedItem, Metric, MetricScore, Verdict, parse_verdicts, verdicts_schema};
use crate::config::MetricConfig;
use crate::error::Result;
use crate::record::EvaluationRecord;

/// Share of retrieved statements that are relevant to the question.
///
/// Each context passage is judged separately: the judge splits it into
/// statements and marks each `yes` or `no` for relevance. The score is the
/// relevant fraction over all passages. Empty context scores 0.0.
pub struct ContextualRelevancyMetric {
    judge: Judge,
    schema: OutputSchema,
}

impl ContextualRelevancyMetric {
    /// Create the metric.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::ConfigError`](crate::EvalError::ConfigError) for
    /// an invalid config.
    pub fn new(llm: Arc<dyn StructuredLlm>, config: MetricConfig) -> Result<Self> {
        let schema = verdicts_schema("contextual_relevancy_verdicts", &["yes", "no"], &["statement"])?;
        Ok(Self { judge: Judge::new(llm, config)?, schema })
    }

    async fn judge_passage(&self, question: &str, passage: &str) -> Result<Vec<JudgedItem>> {
        let prompt = format!(
            "Split the context below into individual statements. For each statement answer \
             'yes' if it is relevant to the question or 'no' if it is not, quoting the \
             statement and giving a reason for every 'no'.\n\n\
             Question:\n{question}\n\nContext:\n{passage}"
        );
        parse_verdicts(self.name(), self.judge.ask(prompt, &self.schema).await?)
    }
}

#[async_trait]
impl Metric for ContextualRelevancyMetric {
    fn name(&self) -> &str {
        "Contextual Relevancy"
    }

    fn config(&self) -> &MetricConfig {
        self.judge.config()
    }

    async fn measure(&self, record: &EvaluationRecord) -> Result<MetricScore> {
        let include_reason = self.judge.config().include_reason;
        if record.retrieval_context.is_empty() {
            let reason = include_reason.then(|| "No context was retrieved.".to_string());
            return Ok(MetricScore { score: 0.0, reason });
        }

        let mut items = Vec::new();
        for passage in &record.retrieval_context {
            items.extend(self.judge_passage(&record.question, passage).await?);
        }

        let relevant = items.iter().filter(|i| i.verdict == Verdict::Yes).count();
        let score = if items.is_empty() { 0.0 } else { relevant as f64 / items.len() as f64 };
        debug!(statements = items.len(), relevant, score, "contextual relevancy scored");

        let reason = include_reason.then(|| {
            let irrelevant: Vec<String> = items
                .iter()
                .filter(|i| i.verdict != Verdict::Yes)
                .map(|i| match (&i.statement, &i.reason) {
                    (Some(s), Some(r)) => format!("\"{s}\": {r}"),
                    (Some(s), None) => format!("\"{s}\""),
                    (None, Some(r)) => r.clone(),
                    (None, None) => "unexplained".to_string(),
                })
                .collect();
            let mut reason =
                format!("{relevant} of {} statements are relevant to the question.", items.len());
            if !irrelevant.is_empty() {
                reason.push_str(" Irrelevant: ");
                reason.push_str(&irrelevant.join("; "));
            }
            reason
        });
        Ok(MetricScore { score, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_model::MockLlm;
    use serde_json::json;

    fn record(context: Vec<String>) -> EvaluationRecord {
        EvaluationRecord {
            question: "Why is the sky blue?".into(),
            expected_output: "Rayleigh scattering".into(),
            actual_output: "Rayleigh scattering".into(),
            retrieval_context: context,
        }
    }

    #[tokio::test]
    async fn judges_each_passage_and_pools_statements() {
        let llm = Arc::new(MockLlm::new("judge"));
        llm.push_response(Ok(json!({"verdicts": [
            {"statement": "The sky is blue.", "verdict": "yes", "reason": null},
            {"statement": "Because of Rayleigh scattering.", "verdict": "yes", "reason": null}
        ]})));
        llm.push_response(Ok(json!({"verdicts": [
            {"statement": "Grass is green.", "verdict": "no", "reason": "about grass"}
        ]})));
        let metric = ContextualRelevancyMetric::new(llm.clone(), MetricConfig::contextual_relevancy()).unwrap();

        let score = metric.measure(&record(vec!["sky".into(), "grass".into()])).await.unwrap();
        assert!((score.score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            score.reason.as_deref(),
            Some("2 of 3 statements are relevant to the question. Irrelevant: \"Grass is green.\": about grass")
        );
        assert_eq!(llm.call_count(), 2);
        assert!(!MetricConfig::contextual_relevancy().passes(score.score));
    }

    #[tokio::test]
    async fn empty_context_scores_zero_without_calls() {
        let llm = Arc::new(MockLlm::new("judge"));
        let metric = ContextualRelevancyMetric::new(llm.clone(), MetricConfig::contextual_relevancy()).unwrap();

        let score = metric.measure(&record(vec![])).await.unwrap();
        assert_eq!(score.score, 0.0);
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn schema_is_strict() {
        let metric =
            ContextualRelevancyMetric::new(Arc::new(MockLlm::new("judge")), MetricConfig::contextual_relevancy()).unwrap();
        assert_eq!(metric.schema.strict_violations(), Vec::<String>::new());
    }
}
