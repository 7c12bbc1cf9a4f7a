//! # RAG Basic Example
//!
//! Demonstrates the build-time and query-time halves of the pipeline: chunk
//! one document, embed it into a read-only index, then retrieve context for
//! a few questions.
//!
//! Uses the offline `HashingEmbeddingProvider`, so it runs with **zero API
//! keys**.
//!
//! Run: `cargo run --example rag_basic`

use std::sync::Arc;

use ragkit_rag::{
    Document, HashingEmbeddingProvider, RagConfig, RagPipeline, Retriever, format_context,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // -- 1. Configure the pipeline ----------------------------------------
    // Small chunks keep the demo readable; top_k=2 matches the default.
    let config = RagConfig::builder().chunk_size(200).chunk_overlap(40).top_k(2).build()?;

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .build()?;

    // -- 2. Build the index -----------------------------------------------
    let document = Document::new(
        "climate",
        vec![
            "Climate change is driven mainly by greenhouse gases such as carbon dioxide \
             and methane. Burning fossil fuels releases carbon dioxide into the atmosphere."
                .into(),
            "Deforestation also contributes to climate change, because trees absorb \
             carbon dioxide while they grow. Agriculture adds methane from livestock."
                .into(),
            "Rising global temperatures melt glaciers and raise sea levels. Coastal \
             cities face more frequent flooding as a result."
                .into(),
        ],
    )
    .with_source_uri("data/climate.txt")
    .with_metadata("topic", "climate");

    let index = Arc::new(pipeline.build_index(&document).await?);
    println!("Indexed '{}' into {} chunk(s)", document.id, index.len());

    // -- 3. Query the index -----------------------------------------------
    let queries = ["What gases drive climate change?", "Why do sea levels rise?"];
    for query in &queries {
        println!("\nQuery: \"{query}\"");
        for (i, result) in index.query(query, 2).await?.iter().enumerate() {
            println!("  {}. [score={:.4}] chunk={}", i + 1, result.score, result.chunk.id);
        }
    }

    // -- 4. The retriever hands plain texts to the generator --------------
    let retriever = pipeline.retriever(index);
    let context = retriever.retrieve(queries[0]).await?;
    println!("\n{}", format_context(&context));

    println!("Done.");
    Ok(())
}
