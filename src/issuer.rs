//! # Request Issuers
//!
//! The boundary between the benchmark engine and the service under test. The
//! engine only ever sees a [`RequestIssuer`]: one call in, one
//! [`CompletionOutcome`] (latency plus token counts) or an error out.
//!
//! Every worker gets its own issuer from an [`IssuerFactory`], so workers never
//! share a connection pool or any other mutable state.

use crate::config::{BenchmarkSpec, Prompt};
use crate::metrics::RequestSample;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::trace;

/// Base URL used when a benchmark does not override it.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Result of one successful request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub sample: RequestSample,
    /// Text of the first choice, when the service returned one
    pub content: Option<String>,
}

/// Performs a single request/response cycle against the target service.
#[async_trait]
pub trait RequestIssuer: Send {
    /// Send `prompt` and wait for the full response.
    ///
    /// Implementations must give up after `timeout` and report an error; the
    /// worker additionally enforces the same bound.
    async fn complete(&mut self, prompt: &Prompt, timeout: Duration) -> Result<CompletionOutcome>;

    /// Issuer name for identification in logs
    fn name(&self) -> &'static str;
}

/// Builds one [`RequestIssuer`] per worker.
pub trait IssuerFactory: Send + Sync {
    fn create(&self, worker_id: usize, parallelism: usize) -> Result<Box<dyn RequestIssuer>>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [crate::config::ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Resolve the chat-completions endpoint for an optional base URL override.
pub fn completions_endpoint(base_url: Option<&str>) -> Result<Url> {
    let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
    let endpoint = format!("{}/chat/completions", base);
    Url::parse(&endpoint).with_context(|| format!("invalid endpoint URL: {}", endpoint))
}

/// Extract `(completion_tokens, prompt_tokens, content)` from a response body.
fn parse_completion(bytes: &[u8]) -> Result<(u64, u64, Option<String>)> {
    let response: ChatCompletionResponse =
        serde_json::from_slice(bytes).context("malformed chat completion response")?;
    let usage = response
        .usage
        .ok_or_else(|| anyhow!("response missing usage field"))?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);
    Ok((usage.completion_tokens, usage.prompt_tokens, content))
}

/// Issuer for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiIssuer {
    client: Client,
    endpoint: Url,
    headers: HeaderMap,
    model_id: String,
}

impl OpenAiIssuer {
    pub fn new(endpoint: Url, api_key: &str, model_id: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to construct HTTP client")?;

        let mut headers = HeaderMap::new();
        if !api_key.is_empty() {
            let header_value = HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("failed to build Authorization header from api_key")?;
            headers.insert(AUTHORIZATION, header_value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client,
            endpoint,
            headers,
            model_id: model_id.to_string(),
        })
    }
}

#[async_trait]
impl RequestIssuer for OpenAiIssuer {
    async fn complete(&mut self, prompt: &Prompt, timeout: Duration) -> Result<CompletionOutcome> {
        let body = ChatCompletionRequest {
            model: &self.model_id,
            messages: &prompt.messages,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.endpoint))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .context("failed to read response body")?;
        let latency = start.elapsed();

        if !status.is_success() {
            let snippet = String::from_utf8_lossy(&bytes);
            return Err(anyhow!("request failed ({}) {}", status, snippet));
        }

        let (output_tokens, input_tokens, content) = parse_completion(&bytes)?;
        trace!(
            "Completion in {:?}: {} output / {} input tokens",
            latency,
            output_tokens,
            input_tokens
        );

        Ok(CompletionOutcome {
            sample: RequestSample::new(latency, output_tokens, input_tokens),
            content,
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Factory producing an [`OpenAiIssuer`] (with its own HTTP client) per worker.
#[derive(Debug, Clone)]
pub struct OpenAiIssuerFactory {
    endpoint: Url,
    api_key: String,
    model_id: String,
}

impl OpenAiIssuerFactory {
    pub fn from_spec(spec: &BenchmarkSpec) -> Result<Self> {
        Ok(Self {
            endpoint: completions_endpoint(spec.base_url.as_deref())?,
            api_key: spec.api_key.clone(),
            model_id: spec.model_id.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl IssuerFactory for OpenAiIssuerFactory {
    fn create(&self, _worker_id: usize, _parallelism: usize) -> Result<Box<dyn RequestIssuer>> {
        Ok(Box::new(OpenAiIssuer::new(
            self.endpoint.clone(),
            &self.api_key,
            &self.model_id,
        )?))
    }
}
