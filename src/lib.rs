//! # usai - Resilient client for OpenAI-style APIs
//!
//! A small Rust client for services exposing an OpenAI-compatible REST API:
//! model listing, chat completion, streaming chat completion and embeddings.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Bounded automatic retries with exponential backoff and `Retry-After`
//! - Classified errors with a single exhaustive [`ErrorKind`]
//! - Streaming support via Server-Sent Events, robust to arbitrary chunking
//!
//! ## Architecture
//!
//! 1. **[`http::HttpEngine`]** issues one logical request, retrying failed
//!    physical attempts, and returns parsed JSON or an open body.
//! 2. **[`sse::decode_events`]** turns an open body into a lazy sequence of
//!    frames, ending at `data: [DONE]` or end of input.
//! 3. **[`client::UsaiClient`]** puts typed endpoints on top of both.
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use usai::client::{CompletionOptions, UsaiClient};
//! use usai::options::ClientOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = UsaiClient::new(ClientOptions::new(
//!         "your-api-key",
//!         "https://your-agency.usai.gov",
//!     ))?;
//!
//!     let mut stream = client
//!         .complete_stream("claude-3-5-haiku", "Hello!", &CompletionOptions::default())
//!         .await?;
//!
//!     while let Some(text) = stream.next().await {
//!         print!("{}", text?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod model;
pub mod options;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{CompletionOptions, UsaiClient};
pub use error::{ApiError, ClientError, ErrorKind};
pub use http::{EngineResponse, HttpEngine, Method, Payload, RateLimitInfo, RequestDescriptor};
pub use options::{ClientOptions, SecretString};
pub use stream::{ChatCompletionStream, TextStream};
