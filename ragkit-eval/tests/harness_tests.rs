//! End-to-end harness tests against scripted models.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use ragkit_eval::{
    AnswerGenerator, ContextualRelevancyMetric, CorrectnessMetric, EvalConfig, EvalError,
    EvaluationHarness, EvaluationRecord, FailureStage, FaithfulnessMetric, JUDGE_INSTRUCTION,
    Metric, MetricConfig, MetricOutcome, MetricScore, QuestionAnswer,
};
use ragkit_model::{MockLlm, ModelError, StructuredRequest};
use ragkit_rag::{
    Document, HashingEmbeddingProvider, RagConfig, RagError, RagPipeline, Retriever,
    StaticRetriever,
};
use serde_json::{Value, json};

fn between<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
    let from = text.find(start).map(|i| i + start.len()).unwrap_or(0);
    let rest = &text[from..];
    let to = rest.find(end).unwrap_or(rest.len());
    &rest[..to]
}

fn sentences(text: &str) -> Vec<String> {
    text.replace('\n', " ")
        .split(". ")
        .map(|s| s.trim().trim_end_matches('.').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Answers only from the prompt's context; says it does not know otherwise.
fn answering_llm() -> Arc<MockLlm> {
    Arc::new(MockLlm::with_responder("answerer", |request: &StructuredRequest| {
        let context = between(&request.prompt, "provided context:\n", "\nQuestion\n").trim();
        let answer = if context.is_empty() { "I don't know." } else { context };
        Ok(json!({ "answer": answer }))
    }))
}

/// A literal-minded judge: substring containment stands in for understanding.
fn judge_llm() -> Arc<MockLlm> {
    Arc::new(MockLlm::with_responder("judge", |request: &StructuredRequest| {
        let prompt = &request.prompt;
        let value: Value = match request.schema.name() {
            "correctness_judgement" => {
                let expected = between(prompt, "Expected output:\n", "\n\nActual output:");
                let actual = between(prompt, "Actual output:\n", "\n\nFollow");
                let correct = actual.contains(expected);
                json!({
                    "score": if correct { 10 } else { 0 },
                    "reason": if correct { "matches the expected output" } else { "does not state the expected output" }
                })
            }
            "faithfulness_claims" => {
                let text = between(prompt, "Text:\n", "\u{0}");
                let claims: Vec<String> =
                    sentences(text).into_iter().filter(|c| c != "I don't know").collect();
                json!({ "claims": claims })
            }
            "faithfulness_verdicts" => {
                let context = between(prompt, "Context:\n", "\n\nClaims:\n").to_lowercase();
                let claims = between(prompt, "\n\nClaims:\n", "\u{0}");
                let verdicts: Vec<Value> = claims
                    .lines()
                    .map(|line| line.split_once(". ").map(|(_, c)| c).unwrap_or(line).to_lowercase())
                    .map(|claim| {
                        if context.contains(&claim) {
                            json!({ "verdict": "yes", "reason": null })
                        } else {
                            json!({ "verdict": "idk", "reason": null })
                        }
                    })
                    .collect();
                json!({ "verdicts": verdicts })
            }
            "contextual_relevancy_verdicts" => {
                let passage = between(prompt, "Context:\n", "\u{0}");
                json!({ "verdicts": [{ "statement": passage, "verdict": "yes", "reason": null }] })
            }
            other => return Err(ModelError::Config(format!("unexpected schema {other}"))),
        };
        Ok(value)
    }))
}

fn metrics(judge: Arc<MockLlm>) -> Vec<Arc<dyn Metric>> {
    vec![
        Arc::new(CorrectnessMetric::new(judge.clone(), MetricConfig::correctness()).unwrap()),
        Arc::new(FaithfulnessMetric::new(judge.clone(), MetricConfig::faithfulness()).unwrap()),
        Arc::new(ContextualRelevancyMetric::new(judge, MetricConfig::contextual_relevancy()).unwrap()),
    ]
}

fn harness(retriever: Arc<dyn Retriever>, config: EvalConfig) -> EvaluationHarness {
    EvaluationHarness::builder()
        .retriever(retriever)
        .generator(AnswerGenerator::new(answering_llm()).unwrap())
        .metrics(metrics(judge_llm()))
        .config(config)
        .build()
        .unwrap()
}

#[tokio::test]
async fn empty_context_answer_fails_correctness() {
    let harness = harness(Arc::new(StaticRetriever::empty()), EvalConfig::new(1));
    let report = harness.run(&[QuestionAnswer::new("What is 2+2?", "4")]).await;

    assert_eq!(report.records.len(), 1);
    let result = &report.records[0];
    assert!(result.record.retrieval_context.is_empty());
    assert_eq!(result.record.actual_output, "I don't know.");
    assert_eq!(result.record.expected_output, "4");

    let correctness = result.outcome("Correctness").unwrap();
    assert_eq!(correctness.score(), Some(0.0));
    assert!(!correctness.passed());
    assert_eq!(result.outcome("Contextual Relevancy").unwrap().score(), Some(0.0));
    assert!(!report.all_passed());
}

#[tokio::test]
async fn ground_truth_in_context_passes_correctness_and_faithfulness() {
    let retriever = StaticRetriever::new(vec!["The answer is 4.".to_string()]);
    let harness = harness(Arc::new(retriever), EvalConfig::new(1));
    let report = harness.run(&[QuestionAnswer::new("What is 2+2?", "4")]).await;

    let result = &report.records[0];
    assert_eq!(result.record.actual_output, "The answer is 4.");
    assert!(result.outcome("Correctness").unwrap().passed());

    let faithfulness = result.outcome("Faithfulness").unwrap();
    assert!(faithfulness.score().unwrap() >= 0.7);
    assert!(faithfulness.passed());
    assert!(result.outcome("Contextual Relevancy").unwrap().passed());
    assert!(report.all_passed());
}

/// Delays each question so later questions finish first.
struct SlowRetriever;

#[async_trait]
impl Retriever for SlowRetriever {
    async fn retrieve(&self, question: &str) -> ragkit_rag::Result<Vec<String>> {
        let n: u64 = question.trim_start_matches('q').parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(n * 10))).await;
        if question == "q3" {
            return Err(RagError::PipelineError("index unavailable".into()));
        }
        Ok(vec![format!("context for {question}")])
    }
}

#[tokio::test]
async fn truncates_and_keeps_question_order_under_concurrency() {
    let questions: Vec<QuestionAnswer> =
        (0..6).map(|i| QuestionAnswer::new(format!("q{i}"), format!("a{i}"))).collect();
    let harness = harness(Arc::new(SlowRetriever), EvalConfig::new(3).with_concurrency(3));

    let report = harness.run(&questions).await;

    let asked: Vec<&str> = report.records.iter().map(|r| r.record.question.as_str()).collect();
    assert_eq!(asked, vec!["q0", "q1", "q2"]);
    assert_eq!(report.records.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn failed_question_is_reported_and_others_continue() {
    let questions: Vec<QuestionAnswer> =
        (0..5).map(|i| QuestionAnswer::new(format!("q{i}"), format!("a{i}"))).collect();
    let harness = harness(Arc::new(SlowRetriever), EvalConfig::new(5).with_concurrency(2));

    let report = harness.run(&questions).await;

    assert_eq!(report.records.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 3);
    assert_eq!(report.failures[0].stage, FailureStage::Retrieval);
    assert!(report.failures[0].message.contains("index unavailable"));
}

#[tokio::test]
async fn schema_violation_fails_only_that_question() {
    let llm = Arc::new(MockLlm::with_responder("answerer", |_| Ok(json!({"answer": "fine"}))));
    llm.push_response(Ok(json!({"reply": "wrong shape"})));
    let harness = EvaluationHarness::builder()
        .retriever(Arc::new(StaticRetriever::new(vec!["ctx".into()])))
        .generator(AnswerGenerator::new(llm).unwrap())
        .config(EvalConfig::new(2))
        .build()
        .unwrap();

    let report = harness
        .run(&[QuestionAnswer::new("first", "x"), QuestionAnswer::new("second", "y")])
        .await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, FailureStage::Generation);
    assert_eq!(report.failures[0].question, "first");
    assert_eq!(report.records[0].record.actual_output, "fine");
    assert_eq!(report.records[0].index, 1);
}

/// Fails on one specific question to show scoring isolation.
struct FlakyMetric {
    config: MetricConfig,
}

#[async_trait]
impl Metric for FlakyMetric {
    fn name(&self) -> &str {
        "Flaky"
    }

    fn config(&self) -> &MetricConfig {
        &self.config
    }

    async fn measure(&self, record: &EvaluationRecord) -> ragkit_eval::Result<MetricScore> {
        if record.question == "q1" {
            return Err(EvalError::InvalidJudgement { metric: "Flaky".into(), message: "garbled".into() });
        }
        Ok(MetricScore { score: 0.4, reason: None })
    }
}

#[tokio::test]
async fn metric_errors_are_isolated_and_distinguished_from_failures() {
    let questions: Vec<QuestionAnswer> =
        (0..3).map(|i| QuestionAnswer::new(format!("q{i}"), "context")).collect();
    let mut all_metrics = metrics(judge_llm());
    all_metrics.push(Arc::new(FlakyMetric { config: MetricConfig::new(0.5, false) }));
    let harness = EvaluationHarness::builder()
        .retriever(Arc::new(StaticRetriever::new(vec!["shared context".into()])))
        .generator(AnswerGenerator::new(answering_llm()).unwrap())
        .metrics(all_metrics)
        .config(EvalConfig::new(3).with_concurrency(4))
        .build()
        .unwrap();

    let report = harness.run(&questions).await;

    for result in &report.records {
        assert_eq!(result.metrics.len(), 4);
        assert!(result.outcome("Correctness").unwrap().passed());
    }
    assert!(matches!(report.records[1].outcome("Flaky"), Some(MetricOutcome::Errored { .. })));

    let flaky = report.summary("Flaky").unwrap();
    assert_eq!((flaky.passed, flaky.failed, flaky.errored), (0, 2, 1));
    assert_eq!(flaky.mean, Some(0.4));
    assert_eq!(report.summary("Correctness").unwrap().passed, 3);
}

#[tokio::test]
async fn run_file_reads_and_truncates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("q_a.json");
    std::fs::write(
        &path,
        r#"[{"question": "What is 2+2?", "answer": "4"}, {"question": "What is 3+3?", "answer": "6"}]"#,
    )
    .unwrap();

    let harness = harness(Arc::new(StaticRetriever::empty()), EvalConfig::new(1));
    let report = harness.run_file(&path).await.unwrap();
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].record.question, "What is 2+2?");
}

#[tokio::test]
async fn malformed_question_file_is_rejected_with_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("q_a.json");
    std::fs::write(&path, r#"[{"question": "ok", "answer": "ok"}, {"question": "missing"}]"#).unwrap();

    let harness = harness(Arc::new(StaticRetriever::empty()), EvalConfig::new(5));
    let err = harness.run_file(&path).await.unwrap_err();
    assert!(matches!(err, EvalError::InvalidQuestionSet { index: 1, .. }));
}

#[test]
fn builder_requires_explicit_config() {
    let result = EvaluationHarness::builder()
        .retriever(Arc::new(StaticRetriever::empty()))
        .generator(AnswerGenerator::new(answering_llm()).unwrap())
        .build();
    assert!(matches!(result, Err(EvalError::ConfigError(_))));
}

#[test]
fn builder_rejects_duplicate_metric_names() {
    let judge = judge_llm();
    let result = EvaluationHarness::builder()
        .retriever(Arc::new(StaticRetriever::empty()))
        .generator(AnswerGenerator::new(answering_llm()).unwrap())
        .metric(Arc::new(CorrectnessMetric::new(judge.clone(), MetricConfig::correctness()).unwrap()))
        .metric(Arc::new(CorrectnessMetric::new(judge, MetricConfig::correctness()).unwrap()))
        .config(EvalConfig::new(1))
        .build();
    assert!(matches!(result, Err(EvalError::ConfigError(_))));
}

#[tokio::test]
async fn evaluates_a_real_index() {
    let pipeline = RagPipeline::builder()
        .config(RagConfig::builder().chunk_size(60).chunk_overlap(10).top_k(1).build().unwrap())
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .build()
        .unwrap();
    let document = Document::from_text(
        "facts",
        "The sky is blue because of Rayleigh scattering.\n\nThe capital of France is Paris.",
    );
    let retriever = pipeline.ingest(&document).await.unwrap();

    let harness = harness(Arc::new(retriever), EvalConfig::new(1));
    let report = harness.run(&[QuestionAnswer::new("What is the capital of France?", "Paris")]).await;

    let result = &report.records[0];
    assert_eq!(result.record.retrieval_context.len(), 1);
    assert!(result.record.retrieval_context[0].contains("Paris"));
    assert!(result.outcome("Correctness").unwrap().passed());
    assert!(result.outcome("Faithfulness").unwrap().passed());
}

#[tokio::test]
async fn every_judge_request_uses_a_strict_schema() {
    let judge = judge_llm();
    let harness = EvaluationHarness::builder()
        .retriever(Arc::new(StaticRetriever::new(vec!["The answer is 4.".into()])))
        .generator(AnswerGenerator::new(answering_llm()).unwrap())
        .metrics(metrics(judge.clone()))
        .config(EvalConfig::new(1))
        .build()
        .unwrap();
    harness.run(&[QuestionAnswer::new("What is 2+2?", "4")]).await;

    let requests = judge.requests();
    let schemas: Vec<&str> = requests.iter().map(|r| r.schema.name()).collect();
    for name in ["correctness_judgement", "faithfulness_claims", "faithfulness_verdicts", "contextual_relevancy_verdicts"] {
        assert!(schemas.contains(&name), "{name} was never requested");
    }
    for request in &requests {
        assert_eq!(request.schema.strict_violations(), Vec::<String>::new(), "{}", request.schema.name());
        assert_eq!(request.instruction.as_deref(), Some(JUDGE_INSTRUCTION));
    }
}

/// Finishes questions out of order: delays cycle through 0..5 ms.
struct ShuffledRetriever;

#[async_trait]
impl Retriever for ShuffledRetriever {
    async fn retrieve(&self, question: &str) -> ragkit_rag::Result<Vec<String>> {
        let n: u64 = question.trim_start_matches('q').parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis((n * 7) % 5)).await;
        Ok(vec![format!("context for {question}")])
    }
}

/// *For any* question set of size N and configured count M <= N, the
/// harness SHALL produce exactly M records for the first M questions, in
/// their original order, whatever the concurrency.
mod prop_truncation {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn first_m_questions_in_order(
            (total, take) in (1usize..12).prop_flat_map(|n| (Just(n), 1..=n)),
            concurrency in 1usize..5,
        ) {
            let questions: Vec<QuestionAnswer> =
                (0..total).map(|i| QuestionAnswer::new(format!("q{i}"), format!("a{i}"))).collect();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let report = rt.block_on(async {
                let harness = EvaluationHarness::builder()
                    .retriever(Arc::new(ShuffledRetriever))
                    .generator(AnswerGenerator::new(answering_llm()).unwrap())
                    .config(EvalConfig::new(take).with_concurrency(concurrency))
                    .build()
                    .unwrap();
                harness.run(&questions).await
            });

            prop_assert!(report.failures.is_empty());
            let asked: Vec<String> = report.records.iter().map(|r| r.record.question.clone()).collect();
            let expected: Vec<String> = (0..take).map(|i| format!("q{i}")).collect();
            prop_assert_eq!(asked, expected);
            let indices: Vec<usize> = report.records.iter().map(|r| r.index).collect();
            prop_assert_eq!(indices, (0..take).collect::<Vec<_>>());
        }
    }
}
