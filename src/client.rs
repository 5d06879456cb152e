//! High-level client for the models, chat completion and embedding
//! endpoints.
//!
//! Every method builds a [`RequestDescriptor`] and hands it to the
//! [`HttpEngine`], which owns retries and error classification.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ClientError;
use crate::http::{EngineResponse, HttpEngine, RequestDescriptor};
use crate::model::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    EmbeddingRequest, EmbeddingResponse, ModelsResponse,
};
use crate::options::ClientOptions;
use crate::sse::SSEResponseExt;
use crate::stream::{text_deltas, ChatCompletionStream, TextStream};

const MODELS_PATH: &str = "/api/v1/models";
const CHAT_COMPLETIONS_PATH: &str = "/api/v1/chat/completions";
const EMBEDDINGS_PATH: &str = "/api/v1/embeddings";

/// Sampling settings for [`UsaiClient::complete`].
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Client for an OpenAI-style API.
///
/// Clones share the connection pool. Configuration is read-only after
/// construction, so one client can serve many concurrent calls.
///
/// # Example
/// ```no_run
/// use usai::client::UsaiClient;
/// use usai::model::{ChatCompletionRequest, ChatMessage};
/// use usai::options::ClientOptions;
///
/// # async fn example() -> Result<(), usai::ClientError> {
/// let client = UsaiClient::new(ClientOptions::new("key", "https://api.example.gov"))?;
///
/// let request = ChatCompletionRequest::new(
///     "claude-3-5-haiku",
///     vec![ChatMessage::user("Hello!")],
/// );
/// let response = client.create_chat_completion(request).await?;
/// println!("{}", response.first_text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct UsaiClient {
    engine: HttpEngine,
}

impl UsaiClient {
    /// Create a client. Fails fast on missing credentials.
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        Ok(Self {
            engine: HttpEngine::new(options)?,
        })
    }

    /// Create a client from `USAI_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientOptions::from_env()?)
    }

    pub fn engine(&self) -> &HttpEngine {
        &self.engine
    }

    /// Issue a raw request through the engine.
    pub async fn request(&self, request: &RequestDescriptor) -> Result<EngineResponse, ClientError> {
        Ok(self.engine.execute(request).await?)
    }

    /// List available models.
    pub async fn get_models(&self) -> Result<ModelsResponse, ClientError> {
        self.json(&RequestDescriptor::get(MODELS_PATH)).await
    }

    /// Create a chat completion.
    pub async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ClientError> {
        if request.stream == Some(true) {
            return Err(ClientError::InvalidRequest(
                "Use create_chat_completion_stream for streaming responses".to_string(),
            ));
        }

        let descriptor = RequestDescriptor::post(CHAT_COMPLETIONS_PATH, to_body(&request)?);
        self.json(&descriptor).await
    }

    /// Create a streaming chat completion.
    ///
    /// The request is sent and checked before this returns; frames are then
    /// decoded lazily as they arrive.
    pub async fn create_chat_completion_stream(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<ChatCompletionStream, ClientError> {
        request.stream = Some(true);

        let descriptor =
            RequestDescriptor::post(CHAT_COMPLETIONS_PATH, to_body(&request)?).streaming();
        let response = self.request(&descriptor).await?.into_stream()?;

        Ok(Box::pin(response.sse_events::<ChatCompletionChunk>()))
    }

    /// Create embeddings.
    pub async fn create_embedding(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, ClientError> {
        let descriptor = RequestDescriptor::post(EMBEDDINGS_PATH, to_body(&request)?);
        self.json(&descriptor).await
    }

    /// Single-turn completion returning the first choice's text.
    pub async fn complete(
        &self,
        model: &str,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ClientError> {
        let response = self
            .create_chat_completion(completion_request(model, prompt, options))
            .await?;
        Ok(response.first_text())
    }

    /// Single-turn completion streamed as text deltas.
    pub async fn complete_stream(
        &self,
        model: &str,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<TextStream, ClientError> {
        let chunks = self
            .create_chat_completion_stream(completion_request(model, prompt, options))
            .await?;
        Ok(text_deltas(chunks))
    }

    async fn json<T: DeserializeOwned>(&self, request: &RequestDescriptor) -> Result<T, ClientError> {
        let value = self.request(request).await?.into_json()?;
        Ok(serde_json::from_value(value)?)
    }
}

fn to_body<B: Serialize>(body: &B) -> Result<serde_json::Value, ClientError> {
    Ok(serde_json::to_value(body)?)
}

fn completion_request(
    model: &str,
    prompt: &str,
    options: &CompletionOptions,
) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system_prompt) = &options.system_prompt {
        messages.push(ChatMessage::system(system_prompt.as_str()));
    }
    messages.push(ChatMessage::user(prompt));

    ChatCompletionRequest {
        temperature: options.temperature,
        max_tokens: options.max_tokens,
        top_p: options.top_p,
        ..ChatCompletionRequest::new(model, messages)
    }
}
