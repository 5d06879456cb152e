//! Streaming support types and utilities.

use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::error::ClientError;
use crate::model::ChatCompletionChunk;

/// Lazy sequence of chat completion frames.
///
/// Single-consumer: dropping it releases the underlying response body.
pub type ChatCompletionStream =
    Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, ClientError>> + Send>>;

/// Lazy sequence of text deltas.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// Keep only the non-empty content deltas of the first choice.
pub fn text_deltas(chunks: ChatCompletionStream) -> TextStream {
    Box::pin(chunks.filter_map(|result| async move {
        match result {
            Ok(chunk) => chunk
                .content()
                .filter(|content| !content.is_empty())
                .map(|content| Ok(content.to_string())),
            Err(e) => Some(Err(e)),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use futures::stream;
    use serde_json::json;

    fn chunk(content: Option<&str>) -> ChatCompletionChunk {
        serde_json::from_value(json!({
            "id": "c",
            "created": 1,
            "model": "m",
            "choices": [{"index": 0, "delta": {"content": content}}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_text_deltas_skip_empty() {
        let chunks: ChatCompletionStream = Box::pin(stream::iter(vec![
            Ok::<_, ClientError>(chunk(Some("Hel"))),
            Ok(chunk(None)),
            Ok(chunk(Some(""))),
            Ok(chunk(Some("lo"))),
        ]));

        let text: Vec<String> = text_deltas(chunks).map(|r| r.unwrap()).collect().await;
        assert_eq!(text, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_text_deltas_pass_errors() {
        let chunks: ChatCompletionStream = Box::pin(stream::iter(vec![
            Ok(chunk(Some("a"))),
            Err(ClientError::Api(ApiError::connection("reset"))),
        ]));

        let results: Vec<_> = text_deltas(chunks).collect().await;
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }
}
