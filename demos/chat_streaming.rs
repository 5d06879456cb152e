//! Stream a chat completion token by token.
//!
//! Run with:
//! ```bash
//! export USAI_API_KEY="your-api-key"
//! export USAI_BASE_URL="https://your-agency.usai.gov"
//! RUST_LOG=usai=debug cargo run --example chat_streaming
//! ```

use std::io::Write;

use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use usai::client::{CompletionOptions, UsaiClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = UsaiClient::from_env()?;

    let mut stream = client
        .complete_stream(
            "claude-3-5-haiku",
            "Write a haiku about public service.",
            &CompletionOptions::default(),
        )
        .await?;

    while let Some(text) = stream.next().await {
        print!("{}", text?);
        std::io::stdout().flush()?;
    }
    println!();

    Ok(())
}
