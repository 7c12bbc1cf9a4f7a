//! Evaluation results.
//!
//! The report keeps three kinds of outcome apart: a metric that scored and
//! passed, a metric that scored below its threshold, and a metric that
//! produced no score because scoring failed. Questions that never produced
//! a record are listed separately as [`QuestionFailure`]s.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::record::EvaluationRecord;

/// Outcome of one metric on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    /// The metric produced a score.
    Scored {
        /// Score in `[0, 1]`.
        score: f64,
        /// Whether the score met the threshold.
        passed: bool,
        /// Judge justification, if requested.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Scoring failed; there is no score.
    Errored {
        /// The scoring failure.
        message: String,
    },
}

impl MetricOutcome {
    /// The score, if one was produced.
    pub fn score(&self) -> Option<f64> {
        match self {
            MetricOutcome::Scored { score, .. } => Some(*score),
            MetricOutcome::Errored { .. } => None,
        }
    }

    /// True only for a score at or above threshold.
    pub fn passed(&self) -> bool {
        matches!(self, MetricOutcome::Scored { passed: true, .. })
    }
}

/// One metric's outcome on a record, with the threshold it was judged by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Metric name.
    pub metric: String,
    /// Pass threshold in effect.
    pub threshold: f64,
    /// What happened.
    pub outcome: MetricOutcome,
}

/// A record with every metric's outcome, in metric order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    /// Zero-based position of the question in the evaluated set.
    pub index: usize,
    /// The scored record.
    pub record: EvaluationRecord,
    /// One entry per configured metric.
    pub metrics: Vec<MetricResult>,
}

impl RecordResult {
    /// The outcome for a metric by name.
    pub fn outcome(&self, metric: &str) -> Option<&MetricOutcome> {
        self.metrics.iter().find(|m| m.metric == metric).map(|m| &m.outcome)
    }
}

/// Where a question failed before it could be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The retriever failed.
    Retrieval,
    /// The answer generator failed.
    Generation,
}

/// A question that produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionFailure {
    /// Zero-based position of the question in the evaluated set.
    pub index: usize,
    /// The question text.
    pub question: String,
    /// Which step failed.
    pub stage: FailureStage,
    /// The failure.
    pub message: String,
}

/// Aggregate over one metric's outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Metric name.
    pub metric: String,
    /// Pass threshold in effect.
    pub threshold: f64,
    /// Mean over scored records; `None` when nothing scored.
    pub mean: Option<f64>,
    /// Records at or above threshold.
    pub passed: usize,
    /// Records scored below threshold.
    pub failed: usize,
    /// Records with no score.
    pub errored: usize,
}

/// The result of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Scored records, in question order.
    pub records: Vec<RecordResult>,
    /// Questions that produced no record, in question order.
    pub failures: Vec<QuestionFailure>,
    /// One summary per metric, in metric order.
    pub summaries: Vec<MetricSummary>,
}

impl EvaluationReport {
    /// Assemble a report and compute per-metric summaries.
    ///
    /// `metrics` lists `(name, threshold)` in the order metrics ran.
    pub fn new(
        records: Vec<RecordResult>,
        failures: Vec<QuestionFailure>,
        metrics: &[(String, f64)],
    ) -> Self {
        let summaries = metrics
            .iter()
            .map(|(name, threshold)| {
                let outcomes: Vec<&MetricOutcome> =
                    records.iter().filter_map(|r| r.outcome(name)).collect();
                let scores: Vec<f64> = outcomes.iter().filter_map(|o| o.score()).collect();
                let mean = (!scores.is_empty())
                    .then(|| scores.iter().sum::<f64>() / scores.len() as f64);
                let passed = outcomes.iter().filter(|o| o.passed()).count();
                MetricSummary {
                    metric: name.clone(),
                    threshold: *threshold,
                    mean,
                    passed,
                    failed: scores.len() - passed,
                    errored: outcomes.len() - scores.len(),
                }
            })
            .collect();
        Self { records, failures, summaries }
    }

    /// The summary for a metric by name.
    pub fn summary(&self, metric: &str) -> Option<&MetricSummary> {
        self.summaries.iter().find(|s| s.metric == metric)
    }

    /// True when every question produced a record and every metric passed.
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
            && self.summaries.iter().all(|s| s.failed == 0 && s.errored == 0)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Emit one log line per metric and one per failed question.
    pub fn log_summary(&self) {
        info!(
            records = self.records.len(),
            failures = self.failures.len(),
            all_passed = self.all_passed(),
            "evaluation finished"
        );
        for s in &self.summaries {
            info!(
                metric = %s.metric,
                threshold = s.threshold,
                mean = ?s.mean,
                passed = s.passed,
                failed = s.failed,
                errored = s.errored,
                "metric summary"
            );
        }
        for f in &self.failures {
            warn!(index = f.index, stage = ?f.stage, error = %f.message, "question failed");
        }
    }
}
