//! Text completion clients.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slangmine_core::Pacer;
use tracing::{debug, info, warn};

use crate::GenerateError;
use crate::parse::{ParsedCompletion, parse_completion};
use crate::prompt::Prompt;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// A source of free-text completions for a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Complete `prompt` and parse the result into candidates.
pub async fn generate(
    generator: &dyn Generator,
    prompt: &Prompt,
) -> Result<ParsedCompletion, GenerateError> {
    let text = generator.complete(&prompt.text).await?;
    let parsed = parse_completion(&text);
    debug!(
        seed = %prompt.seed,
        candidates = parsed.candidates.len(),
        malformed = parsed.malformed.len(),
        "completion parsed"
    );
    Ok(parsed)
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-instruct".into(),
            temperature: 0.5,
            max_tokens: 2048,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    #[serde(flatten)]
    params: &'a SamplingParams,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    text: String,
}

/// Client for an OpenAI-compatible `/completions` endpoint.
///
/// Every attempt waits on the shared pacer first. Failed attempts are
/// retried up to `max_attempts` in total; cancellation is never retried.
pub struct CompletionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    params: SamplingParams,
    pacer: Arc<Pacer>,
    max_attempts: u32,
}

impl CompletionsClient {
    /// `base_url` should be like `https://api.openai.com/v1` (no trailing slash).
    pub fn new(
        base_url: String,
        api_key: String,
        params: SamplingParams,
        pacer: Arc<Pacer>,
        max_attempts: u32,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            params,
            pacer,
            max_attempts: max_attempts.max(1),
        }
    }

    fn request(&self, prompt: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/completions", self.base_url);
        self.client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                prompt,
                params: &self.params,
            })
    }

    async fn attempt(&self, prompt: &str) -> Result<String, GenerateError> {
        self.pacer.wait().await?;
        let resp = self.request(prompt).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerateError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        let parsed: CompletionResponse = serde_json::from_str(&body)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(GenerateError::EmptyResponse)
    }
}

#[async_trait]
impl Generator for CompletionsClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerateError> {
        let mut attempt = 1;
        loop {
            match self.attempt(prompt).await {
                Ok(text) => {
                    info!(model = %self.params.model, attempt, "completion received");
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(attempt, error = %e, "completion failed; retrying");
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(GenerateError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}
