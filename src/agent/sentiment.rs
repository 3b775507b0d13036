// SYNOID Sentiment Bridge
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Optional LLM-backed emotion/intensity estimate for a block of narration.
// The semantic analyzer treats this as a nullable capability: no estimator,
// a slow one, or a broken one all mean "use the rule engine alone".

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

/// Narration longer than this is cut before it is sent out.
const MAX_PROMPT_CHARS: usize = 200;

/// What an estimator thinks about a piece of narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentEstimate {
    #[serde(default)]
    pub emotion: Option<String>,
    /// 0–10 intensity on the same scale as the analyzer's energy level.
    pub intensity: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub visual_mood: Option<String>,
}

/// Injected estimation capability.
pub trait SentimentEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> anyhow::Result<SentimentEstimate>;
}

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Blocking on purpose: the analyzer runs on rayon worker threads, never on
/// the tokio runtime. The HTTP client is built on first use, on the worker
/// thread that needs it, since reqwest's blocking client must not be created
/// inside an async context.
pub struct ChatSentimentEstimator {
    client: OnceLock<reqwest::blocking::Client>,
    timeout: Duration,
    api_url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatSentimentEstimator {
    pub fn new(api_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: OnceLock::new(),
            timeout,
            api_url: api_url.to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    /// Build from `SYNOID_LLM_URL` / `SYNOID_LLM_MODEL` / `SYNOID_LLM_API_KEY`.
    /// Returns `None` when no endpoint is configured.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let api_url = std::env::var("SYNOID_LLM_URL").ok()?;
        let model = std::env::var("SYNOID_LLM_MODEL").unwrap_or_else(|_| "llama3:latest".to_string());
        let api_key = std::env::var("SYNOID_LLM_API_KEY").ok();
        info!("[SENTIMENT] Using {} at {}", model, api_url);
        Some(Self::new(&api_url, &model, api_key, timeout))
    }

    fn client(&self) -> anyhow::Result<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("building sentiment HTTP client")?;
        Ok(self.client.get_or_init(|| built))
    }

    fn prompt(text: &str) -> String {
        let clipped: String = text.chars().take(MAX_PROMPT_CHARS).collect();
        format!(
            "Analyse the emotion and energy of the following narration. Reply with JSON only.\n\n\
             Text: {}\n\n\
             Format:\n\
             {{\"emotion\": \"excitement/curiosity/calm/focus/inspired/satisfied\", \
             \"intensity\": 7.5, \"keywords\": [\"...\"], \"visual_mood\": \"dynamic/smooth/static\"}}",
            clipped
        )
    }
}

impl SentimentEstimator for ChatSentimentEstimator {
    fn estimate(&self, text: &str) -> anyhow::Result<SentimentEstimate> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a video pacing assistant. Respond with concise JSON only."
                },
                {
                    "role": "user",
                    "content": Self::prompt(text)
                }
            ],
            "temperature": 0.2
        });

        let endpoint = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));
        let mut request = self.client()?.post(&endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().context("sentiment request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("sentiment API error: {}", resp.status()));
        }
        let body: serde_json::Value = resp.json().context("sentiment response was not JSON")?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("sentiment response had no message content"))?;
        debug!("[SENTIMENT] Raw reply: {}", content);
        parse_estimate(content)
    }
}

/// Parse a model reply into an estimate. Tolerates ```json fences and
/// surrounding chatter as long as one JSON object is present.
pub fn parse_estimate(content: &str) -> anyhow::Result<SentimentEstimate> {
    let start = content.find('{').ok_or_else(|| anyhow!("no JSON object in reply"))?;
    let end = content.rfind('}').ok_or_else(|| anyhow!("unterminated JSON object in reply"))?;
    if end < start {
        return Err(anyhow!("malformed JSON object in reply"));
    }
    let estimate: SentimentEstimate =
        serde_json::from_str(&content[start..=end]).context("reply JSON did not match estimate shape")?;
    if !estimate.intensity.is_finite() {
        return Err(anyhow!("intensity is not a finite number"));
    }
    Ok(estimate)
}
