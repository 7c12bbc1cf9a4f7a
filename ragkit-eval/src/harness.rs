//! The evaluation harness.
//!
//! For each selected question: retrieve context, generate an answer, record
//! the result. Then every record is scored by every metric. Questions run up
//! to `concurrency` at a time; output order always matches question order.

use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use ragkit_rag::Retriever;
use tracing::{debug, info, warn};

use crate::config::EvalConfig;
use crate::error::{EvalError, Result};
use crate::generator::{AnswerGenerator, join_context};
use crate::metrics::Metric;
use crate::questions::{QuestionAnswer, load_question_set};
use crate::record::EvaluationRecord;
use crate::report::{
    EvaluationReport, FailureStage, MetricOutcome, MetricResult, QuestionFailure, RecordResult,
};

/// Runs a question set through retrieval, generation, and scoring.
///
/// # Example
///
/// ```rust,ignore
/// let harness = EvaluationHarness::builder()
///     .retriever(Arc::new(retriever))
///     .generator(AnswerGenerator::new(llm.clone())?)
///     .metric(Arc::new(CorrectnessMetric::new(judge.clone(), MetricConfig::correctness())?))
///     .config(EvalConfig::new(5))
///     .build()?;
///
/// let report = harness.run_file("data/q_a.json").await?;
/// assert!(report.all_passed());
/// ```
pub struct EvaluationHarness {
    retriever: Arc<dyn Retriever>,
    generator: AnswerGenerator,
    metrics: Vec<Arc<dyn Metric>>,
    config: EvalConfig,
}

impl EvaluationHarness {
    /// Create a new [`EvaluationHarnessBuilder`].
    pub fn builder() -> EvaluationHarnessBuilder {
        EvaluationHarnessBuilder::default()
    }

    /// The harness configuration.
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Load a question set from disk and evaluate it.
    ///
    /// # Errors
    ///
    /// Returns the question-set loading error; per-question and per-metric
    /// failures are reported inside the [`EvaluationReport`] instead.
    pub async fn run_file(&self, path: impl AsRef<Path>) -> Result<EvaluationReport> {
        let questions = load_question_set(path).await?;
        Ok(self.run(&questions).await)
    }

    /// Evaluate the first `num_questions` entries of `questions`.
    pub async fn run(&self, questions: &[QuestionAnswer]) -> EvaluationReport {
        let selected = &questions[..questions.len().min(self.config.num_questions)];
        info!(
            available = questions.len(),
            selected = selected.len(),
            metrics = self.metrics.len(),
            concurrency = self.config.concurrency,
            "starting evaluation"
        );

        let answered: Vec<std::result::Result<(usize, EvaluationRecord), QuestionFailure>> =
            stream::iter(selected.iter().enumerate())
                .map(|(index, qa)| self.answer(index, qa))
                .buffered(self.config.concurrency)
                .collect()
                .await;

        let mut indices = Vec::new();
        let mut records = Vec::new();
        let mut failures = Vec::new();
        for outcome in answered {
            match outcome {
                Ok((index, record)) => {
                    indices.push(index);
                    records.push(record);
                }
                Err(failure) => failures.push(failure),
            }
        }

        let scores = self.score(&records).await;
        let results = indices
            .into_iter()
            .zip(records)
            .zip(scores)
            .map(|((index, record), metrics)| RecordResult { index, record, metrics })
            .collect();

        let metric_names: Vec<(String, f64)> =
            self.metrics.iter().map(|m| (m.name().to_string(), m.config().threshold)).collect();
        let report = EvaluationReport::new(results, failures, &metric_names);
        report.log_summary();
        report
    }

    /// Score each record with each metric.
    ///
    /// Pairs are scored independently: a failed pair becomes
    /// [`MetricOutcome::Errored`] and the rest continue. The result has one
    /// entry per record, each with one [`MetricResult`] per metric in
    /// metric order.
    pub async fn score(&self, records: &[EvaluationRecord]) -> Vec<Vec<MetricResult>> {
        if self.metrics.is_empty() {
            return vec![Vec::new(); records.len()];
        }

        let pairs = records
            .iter()
            .enumerate()
            .flat_map(|(index, record)| self.metrics.iter().map(move |m| (index, record, m)));
        let flat: Vec<MetricResult> = stream::iter(pairs)
            .map(|(index, record, metric)| async move {
                let config = metric.config();
                let outcome = match metric.measure(record).await {
                    Ok(score) => MetricOutcome::Scored {
                        passed: config.passes(score.score),
                        score: score.score,
                        reason: score.reason,
                    },
                    Err(e) => {
                        warn!(metric = metric.name(), record = index, error = %e, "metric scoring failed");
                        MetricOutcome::Errored { message: e.to_string() }
                    }
                };
                MetricResult { metric: metric.name().to_string(), threshold: config.threshold, outcome }
            })
            .buffered(self.config.concurrency)
            .collect()
            .await;

        flat.chunks(self.metrics.len()).map(<[MetricResult]>::to_vec).collect()
    }

    async fn answer(
        &self,
        index: usize,
        qa: &QuestionAnswer,
    ) -> std::result::Result<(usize, EvaluationRecord), QuestionFailure> {
        let failure = |stage: FailureStage, err: EvalError| {
            warn!(index, ?stage, error = %err, "question failed");
            QuestionFailure { index, question: qa.question.clone(), stage, message: err.to_string() }
        };

        let context = self.retriever.retrieve(&qa.question).await.map_err(|e| {
            failure(FailureStage::Retrieval, EvalError::Retrieval { index, message: e.to_string() })
        })?;
        if context.is_empty() {
            debug!(index, "no context retrieved; answering from empty context");
        }

        let answer = self.generator.generate(&qa.question, &join_context(&context)).await.map_err(|e| {
            failure(FailureStage::Generation, EvalError::Generation { index, message: e.to_string() })
        })?;

        debug!(index, context_items = context.len(), "recorded answer");
        Ok((
            index,
            EvaluationRecord {
                question: qa.question.clone(),
                expected_output: qa.answer.clone(),
                actual_output: answer,
                retrieval_context: context,
            },
        ))
    }
}

/// Builder for an [`EvaluationHarness`].
///
/// `retriever`, `generator`, and `config` are required. Metrics are scored
/// in the order they are added.
#[derive(Default)]
pub struct EvaluationHarnessBuilder {
    retriever: Option<Arc<dyn Retriever>>,
    generator: Option<AnswerGenerator>,
    metrics: Vec<Arc<dyn Metric>>,
    config: Option<EvalConfig>,
}

impl EvaluationHarnessBuilder {
    /// Set the retriever.
    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: AnswerGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Add a metric.
    pub fn metric(mut self, metric: Arc<dyn Metric>) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Add several metrics.
    pub fn metrics(mut self, metrics: impl IntoIterator<Item = Arc<dyn Metric>>) -> Self {
        self.metrics.extend(metrics);
        self
    }

    /// Set the harness configuration.
    pub fn config(mut self, config: EvalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the harness.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::ConfigError`] if a required field is missing,
    /// the configuration is invalid, or two metrics share a name.
    pub fn build(self) -> Result<EvaluationHarness> {
        let retriever =
            self.retriever.ok_or_else(|| EvalError::ConfigError("retriever is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| EvalError::ConfigError("generator is required".to_string()))?;
        let config = self.config.ok_or_else(|| {
            EvalError::ConfigError("config is required (num_questions has no default)".to_string())
        })?;
        config.validate()?;

        for (i, metric) in self.metrics.iter().enumerate() {
            if self.metrics[..i].iter().any(|m| m.name() == metric.name()) {
                return Err(EvalError::ConfigError(format!(
                    "metric '{}' is configured twice",
                    metric.name()
                )));
            }
        }

        Ok(EvaluationHarness { retriever, generator, metrics: self.metrics, config })
    }
}
