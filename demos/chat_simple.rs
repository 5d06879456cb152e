//! List models and run a simple chat completion.
//!
//! Run with:
//! ```bash
//! export USAI_API_KEY="your-api-key"
//! export USAI_BASE_URL="https://your-agency.usai.gov"
//! cargo run --example chat_simple
//! ```

use tracing_subscriber::EnvFilter;
use usai::client::{CompletionOptions, UsaiClient};
use usai::model::{ChatCompletionRequest, ChatMessage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = UsaiClient::from_env()?;

    println!("Available models:");
    let models = client.get_models().await?;
    for model in &models.data {
        println!("  - {} ({})", model.id, model.owned_by);
    }

    let options = CompletionOptions {
        system_prompt: Some("You are a helpful government education assistant.".to_string()),
        temperature: Some(0.3),
        max_tokens: Some(200),
        top_p: None,
    };
    let answer = client
        .complete(
            "claude-3-5-haiku",
            "Explain the three branches of the US government in 2 sentences.",
            &options,
        )
        .await?;
    println!("\n=== Completion ===\n{}", answer);

    let request = ChatCompletionRequest::new(
        "claude-3-5-haiku",
        vec![
            ChatMessage::system("You are an expert on federal procurement processes."),
            ChatMessage::user("What is a GSA schedule?"),
        ],
    )
    .with_max_tokens(300);

    match client.create_chat_completion(request).await {
        Ok(response) => {
            println!("\n=== Chat ===\n{}", response.first_text());
            if let Some(usage) = response.usage {
                println!(
                    "Tokens: {} prompt, {} completion",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(retry_after) = e.api_error().and_then(|api| api.retry_after()) {
                eprintln!("Server asked to retry after {:?}", retry_after);
            }
        }
    }

    Ok(())
}
