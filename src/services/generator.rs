//! LLM-backed content generation
//!
//! The pipeline treats the LLM as a narrow capability: write an article
//! body for a title, or caption a code snippet. Both sit behind traits so
//! the rest of the pipeline tests without a backend.
//!
//! [`ChatCompletionClient`] implements both against any OpenAI-compatible
//! chat-completions endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::LlmConfig;

/// Content generation errors
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Network or timeout failure reaching the backend
    #[error("Generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with an error, surfaced verbatim
    #[error("Generation backend error: {0}")]
    Backend(String),

    /// The backend answered but produced no usable text
    #[error("Generation response was empty")]
    EmptyResponse,
}

/// Writes a full Markdown article for a title.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_article(&self, title: &str) -> Result<String, GenerationError>;
}

/// Captions a code snippet for use as image alt text.
#[async_trait]
pub trait AltTextGenerator: Send + Sync {
    async fn generate_alt_text(&self, code: &str, language: &str)
        -> Result<String, GenerationError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
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
    content: String,
}

const ARTICLE_SYSTEM_PROMPT: &str = "You are a professional technology writer \
specializing in creating in-depth articles for WeChat public accounts.";

const ALT_TEXT_SYSTEM_PROMPT: &str = "You are an AI assistant specialized in \
creating concise and descriptive alt texts for code snippets.";

/// Chat-completion client for OpenAI-compatible backends.
pub struct ChatCompletionClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl ChatCompletionClient {
    /// Creates a client with an explicit request timeout. Generation calls
    /// are the slowest network calls in the pipeline, so the timeout is
    /// configured separately from the platform client's.
    pub fn new(config: LlmConfig, timeout: Duration) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }

    async fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        debug!(model, "requesting chat completion");

        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
            temperature: 0.7,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Backend(format!("{status}: {body}")));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(content)
    }
}

#[async_trait]
impl ContentGenerator for ChatCompletionClient {
    async fn generate_article(&self, title: &str) -> Result<String, GenerationError> {
        let prompt = format!(
            "As a senior technology expert, write a WeChat article about \"{title}\" \
in the voice of a human practitioner. The article should:\n\
1. Build the topic up from basics to depth\n\
2. Explain the underlying concepts thoroughly\n\
3. Be comprehensive, detailed and progressive\n\
4. Include example code with explanations\n\
5. Avoid AI-sounding phrasing; use natural human language\n\
6. Use Markdown format\n\
7. Skip greeting openers\n\
8. Skip empty sign-off closers\n\
9. Avoid a lecturing tone\n\
10. Use current technology and perspectives\n\
11. After every code block, add a short but descriptive alt text in the form \
<!-- alt: your alt text -->\n\
12. Keep code blocks well formatted, at most 80 characters wide\n\
Structure the article clearly with an introduction, body sections and a summary."
        );

        self.complete(
            &self.config.model,
            ARTICLE_SYSTEM_PROMPT,
            &prompt,
            self.config.max_tokens,
        )
        .await
    }
}

#[async_trait]
impl AltTextGenerator for ChatCompletionClient {
    async fn generate_alt_text(
        &self,
        code: &str,
        language: &str,
    ) -> Result<String, GenerationError> {
        let prompt = format!(
            "Write a concise but descriptive alt text for the following {language} code, \
suitable for an image alt attribute. Summarize the code's main purpose in \
100-150 characters:\n\n```{language}\n{code}\n```"
        );

        self.complete(&self.config.alt_text_model, ALT_TEXT_SYSTEM_PROMPT, &prompt, 100)
            .await
    }
}
