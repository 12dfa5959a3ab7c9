//! Shared HTTP plumbing for the OpenAI-compatible providers

use super::types::api_error_message;
use sensemaker_application::{EmbeddingError, GatewayError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("sensemaker/", env!("CARGO_PKG_VERSION"));

/// Transport-level failures, mapped onto each port's error type.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpError::Timeout
        } else if e.is_connect() {
            HttpError::Connect(e.to_string())
        } else if e.is_decode() {
            HttpError::Decode(e.to_string())
        } else {
            HttpError::Other(e.to_string())
        }
    }
}

impl From<HttpError> for GatewayError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Timeout => GatewayError::Timeout,
            HttpError::Connect(msg) => GatewayError::ConnectionError(msg),
            HttpError::Status {
                status: 404,
                message,
            } => GatewayError::ModelNotAvailable(message),
            HttpError::Status { .. } => GatewayError::RequestFailed(e.to_string()),
            HttpError::Decode(msg) => GatewayError::InvalidResponse(msg),
            HttpError::Other(msg) => GatewayError::Other(msg),
        }
    }
}

impl From<HttpError> for EmbeddingError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Timeout => EmbeddingError::Timeout,
            HttpError::Decode(msg) => EmbeddingError::InvalidResponse(msg),
            other => EmbeddingError::RequestFailed(other.to_string()),
        }
    }
}

/// Authenticated JSON client rooted at a base URL such as
/// `https://api.openai.com/v1`.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, HttpError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, HttpError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self
            .authorize(self.http.post(&url))
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, HttpError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.authorize(self.http.get(&url)).send().await?;
        Self::decode(response).await
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, HttpError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Status {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = OpenAiClient::new("http://localhost:8080/v1/", None, None).unwrap();
        assert_eq!(
            client.url("/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(client.url("models"), "http://localhost:8080/v1/models");
    }

    #[test]
    fn test_not_found_means_model_unavailable() {
        let err: GatewayError = HttpError::Status {
            status: 404,
            message: "The model `gpt-9` does not exist".to_string(),
        }
        .into();
        assert!(matches!(err, GatewayError::ModelNotAvailable(_)));
    }

    #[test]
    fn test_status_error_keeps_code() {
        let err: GatewayError = HttpError::Status {
            status: 429,
            message: "Rate limit reached".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Request failed: HTTP 429: Rate limit reached"
        );
    }

    #[test]
    fn test_embedding_error_mapping() {
        assert!(matches!(
            EmbeddingError::from(HttpError::Timeout),
            EmbeddingError::Timeout
        ));
        assert!(matches!(
            EmbeddingError::from(HttpError::Connect("refused".into())),
            EmbeddingError::RequestFailed(_)
        ));
    }
}
