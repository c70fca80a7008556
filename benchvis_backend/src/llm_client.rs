use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http_client::build_http_client_with_timeout;

/// Anything that can turn a role-tagged conversation into one reply.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: Vec<Message>, temperature: f32) -> Result<String>;
}

#[derive(Clone)]
pub struct LlmClient {
    api_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
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

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

impl LlmClient {
    pub fn new(api_url: String, api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            client: build_http_client_with_timeout(Some(timeout)),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a completion using the OpenAI API format
    pub async fn generate(&self, messages: Vec<Message>, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_url);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(temperature),
            max_tokens: Some(2000),
        };

        let mut req = self.client.post(&url).json(&request);

        // Local models do not need a key
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = req.send().await.context("Failed to send LLM request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            anyhow::bail!("LLM API returned error {}: {}", status, body);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?;

        Ok(content)
    }

    /// Cheap reachability probe run once at startup.
    pub async fn ping(&self) -> Result<()> {
        let probe = vec![Message::user("teste")];
        self.generate(probe, 0.0).await.map(|_| ())
    }
}

#[async_trait]
impl ChatProvider for LlmClient {
    async fn complete(&self, messages: Vec<Message>, temperature: f32) -> Result<String> {
        tracing::debug!(
            "Sending {} message(s) to {} (temperature {})",
            messages.len(),
            self.model,
            temperature
        );
        self.generate(messages, temperature).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_unset_sampling_fields() {
        let request = ChatCompletionRequest {
            model: "llama3.2".to_string(),
            messages: vec![Message::system("regras"), Message::user("oi")],
            temperature: None,
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "oi");
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn response_parses_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Olá!"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).expect("parse response");
        assert_eq!(parsed.choices[0].message, Message::assistant("Olá!"));
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let client = LlmClient::new(
            "http://localhost:11434/v1/".to_string(),
            String::new(),
            "llama3.2".to_string(),
            Duration::from_secs(5),
        );
        assert_eq!(client.api_url, "http://localhost:11434/v1");
        assert_eq!(client.model(), "llama3.2");
    }
}
