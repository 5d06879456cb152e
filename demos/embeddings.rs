//! Embed a small batch of documents.
//!
//! Run with:
//! ```bash
//! export USAI_API_KEY="your-api-key"
//! export USAI_BASE_URL="https://your-agency.usai.gov"
//! cargo run --example embeddings
//! ```

use tracing_subscriber::EnvFilter;
use usai::client::UsaiClient;
use usai::model::{EmbeddingRequest, InputType};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = UsaiClient::from_env()?;

    let documents = vec![
        "The Federal Acquisition Regulation governs procurement.".to_string(),
        "Agencies publish solicitations on SAM.gov.".to_string(),
    ];
    let request = EmbeddingRequest::new("cohere-english-v3", documents)
        .with_input_type(InputType::SearchDocument);

    let response = client.create_embedding(request).await?;
    for embedding in &response.data {
        println!(
            "#{}: {} dimensions, first values {:?}",
            embedding.index,
            embedding.embedding.len(),
            &embedding.embedding[..embedding.embedding.len().min(3)]
        );
    }

    Ok(())
}
