//! Chat-completions transport.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::llm::error::{CompletionError, CompletionResult};
use crate::llm::transport::{CompletionFuture, CompletionTransport};

/// Error code the provider uses for rate-limit responses.
const RATE_LIMIT_CODE: &str = "rate_limit_exceeded";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    code: Option<String>,
    message: String,
}

/// Single-attempt chat-completions client.
pub struct OpenAiTransport {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiTransport {
    /// Build a transport from the completion settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &CompletionConfig) -> CompletionResult<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_response_tokens,
        })
    }

    async fn post(&self, prompt: &str) -> CompletionResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(classify_error(status.as_u16(), &body));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::MalformedResponse("no message content".to_string()))
    }
}

impl CompletionTransport for OpenAiTransport {
    fn send(&self, prompt: String) -> CompletionFuture<'_, CompletionResult<String>> {
        Box::pin(async move { self.post(&prompt).await })
    }
}

/// Map a non-success response body onto the error taxonomy.
fn classify_error(status: u16, body: &str) -> CompletionError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if envelope.error.code.as_deref() == Some(RATE_LIMIT_CODE) => {
            CompletionError::RateLimited {
                message: envelope.error.message,
            }
        }
        Ok(envelope) => CompletionError::Provider {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) if status == 429 => CompletionError::RateLimited {
            message: body.to_string(),
        },
        Err(_) => CompletionError::Provider {
            status,
            code: None,
            message: body.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        let body = r#"{"error":{"message":"Rate limit reached. Please try again in 2.5s.","type":"tokens","param":null,"code":"rate_limit_exceeded"}}"#;
        let err = classify_error(429, body);
        assert_eq!(
            err.rate_limit_message(),
            Some("Rate limit reached. Please try again in 2.5s.")
        );
    }

    #[test]
    fn test_classify_quota_is_not_rate_limit() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let err = classify_error(429, body);
        assert!(!err.is_rate_limit());
        assert!(matches!(
            err,
            CompletionError::Provider { status: 429, code: Some(ref code), .. } if code == "insufficient_quota"
        ));
    }

    #[test]
    fn test_classify_unstructured_bodies() {
        assert!(classify_error(429, "slow down").is_rate_limit());
        assert!(matches!(
            classify_error(502, "<html>bad gateway</html>"),
            CompletionError::Provider { status: 502, code: None, .. }
        ));
    }

    #[test]
    fn test_endpoint_from_config() {
        let mut config = CompletionConfig::default();
        config.base_url = "http://localhost:8080/v1/".to_string();
        let transport = OpenAiTransport::new(&config);
        assert!(transport.is_ok());
        let endpoint = transport.map(|t| t.endpoint).unwrap_or_default();
        assert_eq!(endpoint, "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 4096,
        };
        let json = serde_json::to_value(&request).unwrap_or_default();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["max_tokens"], 4096);
    }
}
