//! # RAG Evaluation Example (offline)
//!
//! Loads a document and a question set from `demos/data`, builds an index,
//! answers each question from retrieved context, and scores the answers
//! with correctness, faithfulness, and contextual relevancy judges.
//!
//! Both the answering model and the judge are scripted `MockLlm`s, so this
//! runs with **zero API keys**. See `openai_evaluate` for the real thing.
//!
//! Run: `cargo run --example rag_evaluate`

use std::path::Path;
use std::sync::Arc;

use ragkit_eval::{
    AnswerGenerator, ContextualRelevancyMetric, CorrectnessMetric, EvalConfig, EvaluationHarness,
    FaithfulnessMetric, MetricConfig,
};
use ragkit_model::{CallLimiter, MockLlm, ModelError, StructuredRequest};
use ragkit_rag::{DocumentLoader, HashingEmbeddingProvider, RagConfig, RagPipeline, TextFileLoader};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

fn section<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
    let from = text.find(start).map_or(0, |i| i + start.len());
    let rest = &text[from..];
    &rest[..rest.find(end).unwrap_or(rest.len())]
}

/// Answers with the first retrieved sentence.
fn answerer() -> MockLlm {
    MockLlm::with_responder("scripted-answerer", |request: &StructuredRequest| {
        let context = section(&request.prompt, "provided context:\n", "\nQuestion\n").trim();
        let answer = context.split(". ").next().filter(|s| !s.is_empty()).unwrap_or("I don't know.");
        Ok(json!({ "answer": answer }))
    })
}

/// Judges by word overlap.
fn judge() -> MockLlm {
    MockLlm::with_responder("scripted-judge", |request: &StructuredRequest| {
        let prompt = request.prompt.to_lowercase();
        let value: Value = match request.schema.name() {
            "correctness_judgement" => {
                let expected = section(&prompt, "expected output:\n", "\n\nactual output:");
                let actual = section(&prompt, "actual output:\n", "\n\nfollow");
                let hits = expected.split_whitespace().filter(|w| actual.contains(w)).count();
                let total = expected.split_whitespace().count().max(1);
                json!({ "score": hits * 10 / total, "reason": format!("{hits} of {total} expected words present") })
            }
            "faithfulness_claims" => {
                let text = section(&request.prompt, "Text:\n", "\u{0}");
                json!({ "claims": [text.trim()] })
            }
            "faithfulness_verdicts" => {
                let context = section(&prompt, "context:\n", "\n\nclaims:\n");
                let claim = section(&prompt, "\n\nclaims:\n1. ", "\u{0}");
                let verdict = if context.contains(claim.trim()) { "yes" } else { "idk" };
                json!({ "verdicts": [{ "verdict": verdict, "reason": null }] })
            }
            "contextual_relevancy_verdicts" => {
                let question = section(&prompt, "question:\n", "\n\ncontext:");
                let passage = section(&prompt, "\n\ncontext:\n", "\u{0}");
                let relevant = question.split_whitespace().filter(|w| w.len() > 4).any(|w| passage.contains(w));
                json!({ "verdicts": [{
                    "statement": passage,
                    "verdict": if relevant { "yes" } else { "no" },
                    "reason": "keyword overlap"
                }] })
            }
            other => return Err(ModelError::Config(format!("unexpected schema {other}"))),
        };
        Ok(value)
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let data = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");

    // -- 1. Index the document --------------------------------------------
    let limiter = CallLimiter::new(4);
    let pipeline = RagPipeline::builder()
        .config(RagConfig::builder().chunk_size(300).chunk_overlap(60).top_k(2).build()?)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .limiter(limiter)
        .build()?;
    let document = TextFileLoader.load(&data.join("climate.txt")).await?;
    let retriever = pipeline.ingest(&document).await?;

    // -- 2. Wire the harness ----------------------------------------------
    let judge: Arc<MockLlm> = Arc::new(judge());
    let harness = EvaluationHarness::builder()
        .retriever(Arc::new(retriever))
        .generator(AnswerGenerator::new(Arc::new(answerer()))?)
        .metric(Arc::new(CorrectnessMetric::new(judge.clone(), MetricConfig::correctness())?))
        .metric(Arc::new(FaithfulnessMetric::new(judge.clone(), MetricConfig::faithfulness())?))
        .metric(Arc::new(ContextualRelevancyMetric::new(
            judge,
            MetricConfig::contextual_relevancy(),
        )?))
        .config(EvalConfig::new(3).with_concurrency(2))
        .build()?;

    // -- 3. Run and print -------------------------------------------------
    let report = harness.run_file(data.join("q_a.json")).await?;
    for result in &report.records {
        println!("\nQ{}: {}", result.index + 1, result.record.question);
        println!("  answer:   {}", result.record.actual_output);
        println!("  expected: {}", result.record.expected_output);
        for metric in &result.metrics {
            println!("  {:<22} {:?}", metric.metric, metric.outcome);
        }
    }
    println!("\n{}", serde_json::to_string_pretty(&report.summaries)?);
    println!("all passed: {}", report.all_passed());
    Ok(())
}
