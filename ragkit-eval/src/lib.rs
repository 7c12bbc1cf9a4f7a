//! # ragkit-eval
//!
//! Evaluate a retrieval-augmented generation pipeline against a question set
//! with ground-truth answers.
//!
//! ## Overview
//!
//! - [`load_question_set`] reads `[{"question", "answer"}, ...]` JSON
//! - [`AnswerGenerator`] answers a question from retrieved context only
//! - [`CorrectnessMetric`], [`FaithfulnessMetric`], and
//!   [`ContextualRelevancyMetric`] judge each record with a language model
//! - [`EvaluationHarness`] wires retrieval, generation, and scoring together
//!   and returns an [`EvaluationReport`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragkit_eval::*;
//!
//! let harness = EvaluationHarness::builder()
//!     .retriever(Arc::new(retriever))
//!     .generator(AnswerGenerator::new(llm.clone())?)
//!     .metric(Arc::new(FaithfulnessMetric::new(judge, MetricConfig::faithfulness())?))
//!     .config(EvalConfig::new(10))
//!     .build()?;
//!
//! let report = harness.run_file("q_a.json").await?;
//! println!("{}", report.to_json()?);
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod harness;
pub mod metrics;
pub mod questions;
pub mod record;
pub mod report;

pub use config::{DEFAULT_JUDGE_MODEL, EvalConfig, MetricConfig};
pub use error::{EvalError, Result};
pub use generator::{AnswerGenerator, join_context, render_prompt};
pub use harness::{EvaluationHarness, EvaluationHarnessBuilder};
pub use metrics::{
    ContextualRelevancyMetric, CorrectnessMetric, DEFAULT_CORRECTNESS_STEP, FaithfulnessMetric,
    JUDGE_INSTRUCTION, Metric, MetricScore,
};
pub use questions::{QuestionAnswer, from_json_str, load_question_set};
pub use record::EvaluationRecord;
pub use report::{
    EvaluationReport, FailureStage, MetricOutcome, MetricResult, MetricSummary, QuestionFailure,
    RecordResult,
};
