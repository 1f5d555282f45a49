//! OpenAI-compatible chat client for vision extraction and semantic review.
//!
//! The client is built from explicit settings (the API key is read from the
//! configured environment variable once, at construction) and handed to the
//! pipeline; nothing here is global.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::Engine as _;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use verity_fraud::{findings_from_json, SemanticFinding, SemanticReviewer};
use verity_ingest::{parse_json_reply, PageImage, StructuredExtractor};

use crate::config::LlmSection;

const EXTRACT_SYSTEM: &str = "You read bank statements. Reply with JSON only: \
{\"account_info\": {\"holder_name\", \"account_number\", \"period\", \"final_balance\", \
\"bank_name\", \"branch_code\", \"branch_address\"}, \"transactions\": [{\"id\", \"details\", \
\"date\" (DD-MM-YYYY), \"amount\" (signed number, negative for debits), \"balance\" (number)}]}. \
Use the string \"null\" for unknown account fields. Keep the statement's row order; the first \
row is the opening balance with amount 0.";

const REVIEW_SYSTEM: &str = "You audit bank statement images for tampering. Reply with JSON only: \
{\"issues\": [{\"issue_type\": one of formatting_anomaly | duplicate_transaction | \
missing_transaction | other, \"description\", \"evidence_snippet\" (the statement text \
the issue refers to)}]}. Reply {\"issues\": []} when nothing looks wrong.";

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_key: String,
    pub timeout: Duration,
}

impl LlmSettings {
    /// `None` when the section is disabled; an error when it is enabled but
    /// the key variable is unset.
    pub fn from_section(section: &LlmSection) -> Result<Option<Self>> {
        if !section.enabled {
            return Ok(None);
        }
        let api_key = std::env::var(&section.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .with_context(|| {
                format!(
                    "llm is enabled but ${} is not set (pass --offline or set llm.enabled = false)",
                    section.api_key_env
                )
            })?;
        Ok(Some(Self {
            base_url: section.base_url.trim_end_matches('/').to_string(),
            model: section.model.clone(),
            temperature: section.temperature,
            max_tokens: section.max_tokens,
            api_key,
            timeout: Duration::from_secs(section.timeout_secs),
        }))
    }
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    settings: LlmSettings,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("build http client")?;
        Ok(Self { settings, http })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Blocking completion. The CLI runs inside `#[tokio::main]`, so when a
    /// runtime is current we block in place on it; the fraud reviewer thread
    /// has no runtime and gets a fresh one.
    pub fn complete(&self, system: &str, user: Value) -> Result<String> {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(self.complete_async(system, user)))
        } else {
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(self.complete_async(system, user))
        }
    }

    async fn complete_async(&self, system: &str, user: Value) -> Result<String> {
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let body = self.request_body(system, user);
        let url = format!("{}/v1/chat/completions", self.settings.base_url);
        debug!(model = %self.settings.model, %url, "chat completion");

        let resp = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.settings.api_key))
            .json(&body)
            .send()
            .await
            .context("llm request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("llm error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse llm response")?;
        let content = out
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        Ok(content.trim().to_string())
    }

    fn request_body(&self, system: &str, user: Value) -> Value {
        json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        })
    }
}

/// Multi-part user content: optional text followed by one image part per page.
pub fn user_content(text: Option<&str>, pages: &[PageImage]) -> Result<Value> {
    let mut parts = Vec::with_capacity(pages.len() + 1);
    if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
        parts.push(json!({ "type": "text", "text": text }));
    }
    for page in pages {
        let png = page
            .to_png()
            .with_context(|| format!("encode page {} as png", page.index))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(png);
        parts.push(json!({
            "type": "image_url",
            "image_url": { "url": format!("data:image/png;base64,{encoded}") },
        }));
    }
    Ok(Value::Array(parts))
}

impl StructuredExtractor for LlmClient {
    fn extract(&self, pages: &[PageImage], hint_text: Option<&str>) -> Result<Value> {
        let hint = hint_text.map(|t| format!("Text already recovered from the statement:\n{t}"));
        let content = user_content(hint.as_deref(), pages)?;
        let reply = self.complete(EXTRACT_SYSTEM, content)?;
        parse_json_reply(&reply).context("structured extraction reply")
    }
}

impl SemanticReviewer for LlmClient {
    fn review(&self, pages: &[PageImage]) -> Result<Vec<SemanticFinding>> {
        let content = user_content(None, pages)?;
        let reply = self.complete(REVIEW_SYSTEM, content)?;
        let value = parse_json_reply(&reply).context("review reply")?;
        Ok(findings_from_json(&value))
    }
}
