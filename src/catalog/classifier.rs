//! Review classification.
//!
//! The catalog only needs "given this text and these labels, pick a label".
//! `OpenAiClassifier` answers that with one chat completion request against
//! an OpenAI-compatible endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ClassifierConfig, RANKINGS_PLACEHOLDER};

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("classifier returned {0}: {1}")]
    Status(u16, String),
    #[error("classifier returned no answer")]
    EmptyResponse,
    #[error("classifier timed out")]
    Timeout,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Pick one of `labels` for `text`. The answer is not guaranteed to be
    /// one of the labels.
    async fn classify(&self, text: &str, labels: &[String]) -> Result<String, ClassifierError>;
}

/// Fill the `{rankings}` placeholder with the comma-joined labels and append the text.
pub fn build_prompt(template: &str, labels: &[String], text: &str) -> String {
    let prompt = template.replacen(RANKINGS_PLACEHOLDER, &labels.join(","), 1);
    format!("{}{}", prompt, text)
}

pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    prompt_template: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl OpenAiClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            prompt_template: config.prompt_template.clone(),
            timeout,
        })
    }

    async fn complete(&self, prompt: String) -> Result<String, ClassifierError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status(status.as_u16(), text));
        }

        let result: ChatResponse = response.json().await?;
        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ClassifierError::EmptyResponse)
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, text: &str, labels: &[String]) -> Result<String, ClassifierError> {
        let prompt = build_prompt(&self.prompt_template, labels, text);
        tokio::time::timeout(self.timeout, self.complete(prompt))
            .await
            .map_err(|_| ClassifierError::Timeout)?
    }
}
