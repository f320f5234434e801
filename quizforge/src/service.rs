//! The generation-service seam.
//!
//! The pipeline talks to the model through the [`GenerationService`] trait so
//! tests can inject scripted fakes. The production implementation speaks an
//! Anthropic-style messages API over HTTP; the model replies with contract
//! JSON, possibly wrapped in a markdown code fence, which is stripped before
//! parsing.
//!
//! Error surface: transport failures and non-success statuses are `Err`;
//! a body that arrived but does not parse is reported as data (`Malformed`
//! for synthesis, `Err` for extraction) so callers can apply the soft-skip
//! policy at the right loop site.

use std::env;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::generation::prompts;
use crate::generation::types::{GeneratedQuestion, TestableClaim};

/// Result of one MCQ synthesis call, modeled as a tagged outcome so callers
/// can distinguish "service declined" from "service broke"
#[derive(Debug, Clone)]
pub enum SynthesisOutcome {
    /// The service produced a structurally parsed question
    Accepted(GeneratedQuestion),
    /// The service explicitly signaled it cannot build a question from
    /// this claim; expected for thin claims, not an error
    Declined { reason: String },
    /// The service responded but the body did not match the contract
    Malformed { detail: String },
}

/// One generation call per chunk (claims) or per claim (questions)
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Extract up to `max_claims` testable claims from one chunk's text.
    ///
    /// Fewer claims is acceptable; fabrication is not. A transport failure
    /// or unparsable body is an `Err` the caller treats as a per-chunk soft
    /// failure.
    async fn extract_claims(
        &self,
        chunk_text: &str,
        position_label: &str,
        max_claims: usize,
    ) -> Result<Vec<TestableClaim>>;

    /// Produce one audited MCQ from a claim, or decline.
    async fn synthesize_mcq(
        &self,
        claim: &TestableClaim,
        topic_title: &str,
        chunk_text: &str,
    ) -> Result<SynthesisOutcome>;
}

// ============================================================================
// Wire payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClaimsPayload {
    claims: Vec<TestableClaim>,
}

#[derive(Debug, Deserialize)]
struct DeclinedPayload {
    cannot_create: bool,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SynthesisPayload {
    Declined(DeclinedPayload),
    Question(Box<GeneratedQuestion>),
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: usize,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

// ============================================================================
// HTTP implementation
// ============================================================================

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// HTTP generation service speaking an Anthropic-style messages API
pub struct HttpGenerationService {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    config: GenerationConfig,
}

impl HttpGenerationService {
    /// Create a service from an explicit API key
    pub fn new(api_key: impl Into<String>, config: GenerationConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            anyhow::bail!("generation service API key is empty");
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            api_key,
            config,
        })
    }

    /// Create a service reading the key from `QUIZFORGE_API_KEY` or
    /// `ANTHROPIC_API_KEY`
    pub fn from_env(config: GenerationConfig) -> Result<Self> {
        let api_key = env::var("QUIZFORGE_API_KEY")
            .or_else(|_| env::var("ANTHROPIC_API_KEY"))
            .context("QUIZFORGE_API_KEY or ANTHROPIC_API_KEY must be set")?;
        Self::new(api_key, config)
    }

    /// Point the service at a different endpoint (self-hosted proxies)
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// One request/response cycle; returns the model's text reply
    async fn complete(&self, prompt: String, temperature: f32) -> Result<String> {
        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("generation service request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("generation service returned {}: {}", status, body);
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .context("generation service returned a non-JSON body")?;
        parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .context("generation service response had no content")
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn extract_claims(
        &self,
        chunk_text: &str,
        position_label: &str,
        max_claims: usize,
    ) -> Result<Vec<TestableClaim>> {
        let prompt = prompts::claim_extraction_prompt(chunk_text, position_label, max_claims);
        let reply = self
            .complete(prompt, self.config.extraction_temperature)
            .await?;

        let json = extract_json(&reply);
        let payload: ClaimsPayload = serde_json::from_str(&json)
            .with_context(|| format!("claim extraction reply did not parse: {}", truncate(&json)))?;
        Ok(payload.claims)
    }

    async fn synthesize_mcq(
        &self,
        claim: &TestableClaim,
        topic_title: &str,
        chunk_text: &str,
    ) -> Result<SynthesisOutcome> {
        let prompt = prompts::mcq_synthesis_prompt(claim, topic_title, chunk_text);
        let reply = self
            .complete(prompt, self.config.synthesis_temperature)
            .await?;

        let json = extract_json(&reply);
        match serde_json::from_str::<SynthesisPayload>(&json) {
            Ok(SynthesisPayload::Declined(d)) if d.cannot_create => {
                Ok(SynthesisOutcome::Declined { reason: d.reason })
            }
            Ok(SynthesisPayload::Declined(_)) => Ok(SynthesisOutcome::Malformed {
                detail: "cannot_create present but false".to_string(),
            }),
            Ok(SynthesisPayload::Question(question)) => Ok(SynthesisOutcome::Accepted(*question)),
            Err(e) => Ok(SynthesisOutcome::Malformed {
                detail: format!("{}: {}", e, truncate(&json)),
            }),
        }
    }
}

/// Extract JSON content from markdown code fences
pub fn extract_json(text: &str) -> String {
    let trimmed = if text.contains("```json") {
        let start = text.find("```json").unwrap() + 7;
        let end = text[start..]
            .rfind("```")
            .map(|pos| pos + start)
            .unwrap_or(text.len());
        text[start..end].trim().to_string()
    } else if text.contains("```") {
        let start = text.find("```").unwrap() + 3;
        let end = text[start..]
            .rfind("```")
            .map(|pos| pos + start)
            .unwrap_or(text.len());
        text[start..end].trim().to_string()
    } else {
        text.trim().to_string()
    };
    trimmed
}

fn truncate(text: &str) -> String {
    text.chars().take(160).collect()
}
