//! # RAG Evaluation against OpenAI / Azure OpenAI
//!
//! Indexes an extracted-text document with the embeddings API, answers each
//! question with a chat model, and judges the answers with the same model.
//!
//! Reads credentials from the environment (a `.env` file is honoured):
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! # or, for Azure:
//! export AZURE_OPENAI_ENDPOINT=https://my-resource.openai.azure.com/
//! export AZURE_OPENAI_API_KEY=...
//! export AZURE_OPENAI_DEPLOYMENT_ID=gpt-4o
//! export AZURE_OPENAI_EMBEDDING_DEPLOYMENT_ID=text-embedding-ada-002
//!
//! cargo run --example openai_evaluate --features openai -- <document.txt> <q_a.json> <num_questions>
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ragkit_eval::{
    AnswerGenerator, ContextualRelevancyMetric, CorrectnessMetric, EvalConfig, EvaluationHarness,
    FaithfulnessMetric, MetricConfig,
};
use ragkit_model::openai::OpenAIChatModel;
use ragkit_model::{CallLimiter, ResilientLlm, RetryPolicy, StructuredLlm};
use ragkit_rag::openai::OpenAIEmbeddingProvider;
use ragkit_rag::{DocumentLoader, RagConfig, RagPipeline, TextFileLoader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let document_path: PathBuf = args.next().context("usage: <document.txt> <q_a.json> <num_questions>")?.into();
    let questions_path: PathBuf = args.next().context("missing question-set path")?.into();
    let num_questions: usize =
        args.next().context("missing num_questions")?.parse().context("num_questions must be a number")?;

    // One limiter and policy for every backend call, embeddings included.
    let limiter = CallLimiter::new(4);
    let policy = RetryPolicy::default();

    // -- 1. Index ---------------------------------------------------------
    let pipeline = RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_env()?))
        .retry_policy(policy.clone())
        .limiter(limiter.clone())
        .build()?;
    let document = TextFileLoader.load(&document_path).await?;
    let retriever = pipeline.ingest(&document).await?;
    info!(chunks = retriever.index().len(), "index ready");

    // -- 2. Models --------------------------------------------------------
    // Judges use the same model; on Azure that is the configured deployment.
    let chat = OpenAIChatModel::from_env()?;
    let judge_model = chat.name().to_string();
    let llm: Arc<dyn StructuredLlm> = Arc::new(ResilientLlm::new(Arc::new(chat), policy, limiter));

    let harness = EvaluationHarness::builder()
        .retriever(Arc::new(retriever))
        .generator(AnswerGenerator::new(llm.clone())?)
        .metric(Arc::new(CorrectnessMetric::new(llm.clone(), MetricConfig::correctness().with_model(&judge_model))?))
        .metric(Arc::new(FaithfulnessMetric::new(llm.clone(), MetricConfig::faithfulness().with_model(&judge_model))?))
        .metric(Arc::new(ContextualRelevancyMetric::new(
            llm,
            MetricConfig::contextual_relevancy().with_model(judge_model),
        )?))
        .config(EvalConfig::new(num_questions).with_concurrency(4))
        .build()?;

    // -- 3. Evaluate ------------------------------------------------------
    let report = harness.run_file(&questions_path).await?;
    println!("{}", report.to_json()?);

    if !report.all_passed() {
        anyhow::bail!("evaluation did not pass");
    }
    Ok(())
}
