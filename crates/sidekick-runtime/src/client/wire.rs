//! Request and response bodies of the engine HTTP API.

use serde::{Deserialize, Serialize};
use sidekick_core::{ChatMessage, ChatOptions};

pub(crate) const EMBEDDING_PATH: &str = "/embedding";
pub(crate) const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Serialize)]
pub(crate) struct EmbeddingRequest<'a> {
    pub content: &'a str,
}

/// The engine answers with either shape depending on its version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum EmbeddingResponse {
    Direct { embedding: Vec<f32> },
    List { data: Vec<EmbeddingItem> },
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingItem {
    pub embedding: Vec<f32>,
}

impl EmbeddingResponse {
    pub(crate) fn into_vector(self) -> Option<Vec<f32>> {
        let vector = match self {
            Self::Direct { embedding } => embedding,
            Self::List { data } => data.into_iter().next()?.embedding,
        };
        if vector.is_empty() { None } else { Some(vector) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

impl ChatRequest {
    pub(crate) fn new(messages: &[ChatMessage], options: ChatOptions, stream: bool) -> Self {
        Self {
            messages: messages.to_vec(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    pub(crate) fn into_content(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest::new(
            &[ChatMessage::user("hi")],
            ChatOptions::default().with_max_tokens(64),
            true,
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"], json!([{ "role": "user", "content": "hi" }]));
        assert_eq!(value["max_tokens"], 64);
        assert_eq!(value["stream"], true);
        assert!((value["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_embedding_shapes() {
        let direct: EmbeddingResponse =
            serde_json::from_value(json!({ "embedding": [0.5, 1.0] })).unwrap();
        assert_eq!(direct.into_vector(), Some(vec![0.5, 1.0]));

        let list: EmbeddingResponse =
            serde_json::from_value(json!({ "data": [{ "embedding": [2.0] }] })).unwrap();
        assert_eq!(list.into_vector(), Some(vec![2.0]));

        let empty: EmbeddingResponse = serde_json::from_value(json!({ "data": [] })).unwrap();
        assert_eq!(empty.into_vector(), None);

        assert!(serde_json::from_value::<EmbeddingResponse>(json!({ "foo": 1 })).is_err());
    }

    #[test]
    fn test_chat_response_content() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hello" } }]
        }))
        .unwrap();
        assert_eq!(response.into_content().as_deref(), Some("Hello"));
    }
}
