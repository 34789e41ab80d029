//! OpenAI-compatible API client
//!
//! Single-shot completions against `<endpoint>/chat/completions`. No retries.

use super::LlmError;
use crate::domain::config::AiConfig;
use crate::domain::traits::LlmProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.resolve_api_key(),
            api_key_env: config.api_key_env.clone(),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn complete(&self, model: &str, max_tokens: u32, prompt: &str) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::MissingApiKey(self.api_key_env.clone()))?;

        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            // Prefer the provider's own error message when present
            let message = serde_json::from_str::<serde_json::Value>(&error_text)
                .ok()
                .and_then(|json| {
                    json.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or(error_text);

            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str, key: Option<&str>) -> AiConfig {
        AiConfig {
            endpoint: endpoint.to_string(),
            api_key: key.map(str::to_string),
            api_key_env: "ASH_TEST_UNSET_KEY".to_string(),
            timeout: 5,
        }
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "model": "openai/gpt-oss-120b",
                "max_tokens": 300
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  hello there \n"}}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config(&server.uri(), Some("secret"))).unwrap();
        let answer = client
            .complete("openai/gpt-oss-120b", 300, "say hi")
            .await
            .unwrap();
        assert_eq!(answer, "hello there");
    }

    #[tokio::test]
    async fn test_complete_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": []
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "rate limited"}
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config(&server.uri(), Some("secret"))).unwrap();
        assert!(matches!(
            client.complete("m", 10, "p").await,
            Err(LlmError::EmptyResponse)
        ));
        match client.complete("m", 10, "p").await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limited");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_key() {
        let client = OpenAiClient::new(&config("http://127.0.0.1:1", None)).unwrap();
        assert!(matches!(
            client.complete("m", 10, "p").await,
            Err(LlmError::MissingApiKey(_))
        ));
    }
}
