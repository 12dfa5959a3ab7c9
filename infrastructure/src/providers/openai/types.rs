//! Wire types for the OpenAI-compatible HTTP API
//!
//! Only the fields sensemaker reads or writes are modelled; unknown fields
//! in responses are ignored.

use sensemaker_application::{EmbeddingError, GatewayError};
use sensemaker_domain::Embedding;
use serde::{Deserialize, Serialize};

// ─── Chat completions ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice.
    ///
    /// A missing or empty choice is an invalid response; a `length` finish
    /// still returns the text since the validator copes with truncation.
    pub fn into_text(self) -> Result<String, GatewayError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::InvalidResponse("no choices in response".to_string()))?;
        match choice.message.content {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(GatewayError::InvalidResponse(format!(
                "empty message content (finish_reason: {})",
                choice.finish_reason.as_deref().unwrap_or("unknown")
            ))),
        }
    }
}

// ─── Embeddings ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingDatum {
    pub index: usize,
    pub embedding: Embedding,
}

impl EmbeddingResponse {
    /// Vectors in input order.
    ///
    /// The API tags each vector with its input index; the list is sorted by
    /// it and must cover `0..expected` exactly.
    pub fn into_vectors(mut self, expected: usize) -> Result<Vec<Embedding>, EmbeddingError> {
        if self.data.len() != expected {
            return Err(EmbeddingError::CountMismatch {
                expected,
                got: self.data.len(),
            });
        }
        self.data.sort_by_key(|d| d.index);
        if self.data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(EmbeddingError::InvalidResponse(
                "embedding indexes do not cover the input".to_string(),
            ));
        }
        Ok(self.data.into_iter().map(|d| d.embedding).collect())
    }
}

// ─── Models & errors ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ModelEntry {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Human-readable message from an error body, falling back to the raw text.
pub fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.chars().take(300).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_omits_unset_fields() {
        let messages = vec![ChatMessage::system("rules"), ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: 0.0,
            max_tokens: None,
            response_format: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("max_tokens").is_none());
        assert!(value.get("response_format").is_none());
        assert_eq!(value["messages"][0]["role"], "system");
    }

    #[test]
    fn test_chat_request_json_mode() {
        let request = ChatRequest {
            model: "gpt-4o",
            messages: &[],
            temperature: 0.2,
            max_tokens: Some(512),
            response_format: Some(ResponseFormat::json_object()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["max_tokens"], 512);
    }

    #[test]
    fn test_chat_response_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"buckets\":[]}"},"finish_reason":"stop"}]}"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.into_text().unwrap(), r#"{"buckets":[]}"#);
    }

    #[test]
    fn test_chat_response_without_content() {
        let body = r#"{"choices":[{"message":{"content":null},"finish_reason":"content_filter"}]}"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        let err = response.into_text().unwrap_err();
        assert!(err.to_string().contains("content_filter"));
    }

    #[test]
    fn test_chat_response_without_choices() {
        let response: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            response.into_text(),
            Err(GatewayError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_embeddings_reordered_by_index() {
        let body = r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#;
        let response: EmbeddingResponse = serde_json::from_str(body).unwrap();
        let vectors = response.into_vectors(2).unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_embeddings_count_mismatch() {
        let body = r#"{"data":[{"index":0,"embedding":[1.0]}]}"#;
        let response: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            response.into_vectors(3),
            Err(EmbeddingError::CountMismatch {
                expected: 3,
                got: 1
            })
        ));
    }

    #[test]
    fn test_embeddings_duplicate_index() {
        let body = r#"{"data":[{"index":0,"embedding":[1.0]},{"index":0,"embedding":[2.0]}]}"#;
        let response: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            response.into_vectors(2),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(api_error_message(body), "Incorrect API key provided");
        assert_eq!(api_error_message("Bad Gateway"), "Bad Gateway");
    }
}
