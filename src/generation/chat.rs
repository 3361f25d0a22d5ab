//! OpenAI-compatible chat completion client
//!
//! One request shape serves both remote generators: a system message, the
//! user prompt, and sampling parameters, answered by
//! `choices[0].message.content`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::generation::GenerationParams;
use crate::query::GenerationFailure;

/// System message sent with every request.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Whole-request deadline, connection included.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// HTTP client for one chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(endpoint: String, api_key: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()
            .map_err(|e| RagError::Config(format!("http client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one completion request and extract the first choice.
    ///
    /// Failures are classified into [`GenerationFailure`] kinds; the caller
    /// turns them into degraded answers.
    pub async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationFailure> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationFailure::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationFailure::MalformedResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                GenerationFailure::MalformedResponse("response has no choices".to_string())
            })
    }
}

fn classify_send_error(e: reqwest::Error) -> GenerationFailure {
    if e.is_timeout() {
        GenerationFailure::Timeout
    } else {
        GenerationFailure::Transport(e.to_string())
    }
}
