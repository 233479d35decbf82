//! Minimal client for the local LLM endpoint (LM Studio style).
//!
//! One best-effort chat.completions POST with a fixed timeout and no
//! retries. Transport or shape failures never surface as errors to the
//! UI: callers substitute `fallback_text()`, which embeds the configured
//! endpoint so the operator can diagnose the local server.
//!
//! Calls are instrumented and log latencies and response sizes, not
//! contents.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Default endpoint matches a locally running LM Studio server.
const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:1234/v1/chat/completions";
const DEFAULT_MODEL: &str = "lm-studio";
const DEFAULT_TIMEOUT_SECS: u64 = 180;
const TEMPERATURE: f32 = 0.2;

#[derive(Clone)]
pub struct LlmClient {
  pub client: reqwest::Client,
  pub endpoint: String,
  pub model: String,
}

impl LlmClient {
  /// Build the client from env. Everything has a local default; the
  /// endpoint URL is runtime configuration, not part of the contract.
  ///
  ///   LLM_ENDPOINT      : full chat/completions URL
  ///   LLM_MODEL         : model name sent in the payload
  ///   LLM_TIMEOUT_SECS  : request timeout (the only latency bound)
  pub fn from_env() -> Self {
    let endpoint = std::env::var("LLM_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.into());
    let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
    let timeout = std::env::var("LLM_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout))
      .build()
      .unwrap_or_default();

    Self { client, endpoint, model }
  }

  /// Plain-text chat completion. Used for feedback and hint summaries.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  pub async fn chat(&self, system: &str, user: &str) -> Result<String, String> {
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      stream: false,
      temperature: TEMPERATURE,
    };

    let start = std::time::Instant::now();
    let res = self
      .client
      .post(&self.endpoint)
      .header(USER_AGENT, "dojo-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      return Err(format!("LLM HTTP {}: {}", status, crate::util::trunc_for_log(&body, 200)));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    let elapsed = start.elapsed();
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "LLM usage");
    }

    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .ok_or_else(|| "LLM response had no choices".to_string())?;

    // Some local reasoning models emit <think>...</think> blocks that
    // would pollute the rendered markdown.
    let text = strip_think_tags(&text);
    info!(?elapsed, reply_len = text.len(), "LLM reply received");
    Ok(text)
  }

  /// Deterministic substitute reply for any transport/shape failure. The
  /// caller must always have renderable text, so this is a return value,
  /// never an error.
  pub fn fallback_text(&self, detail: &str) -> String {
    format!(
      "Could not reach the LLM server.\n\
       Check the local endpoint ({}).\n\
       Verify the network or try again later. ({})",
      self.endpoint, detail
    )
  }
}

/// Remove every `<think>...</think>` span. An unterminated opening tag
/// drops the rest of the text rather than leaking partial reasoning.
pub fn strip_think_tags(text: &str) -> String {
  const OPEN: &str = "<think>";
  const CLOSE: &str = "</think>";

  let mut out = String::with_capacity(text.len());
  let mut rest = text;
  while let Some(start) = rest.find(OPEN) {
    out.push_str(&rest[..start]);
    match rest[start..].find(CLOSE) {
      Some(end) => rest = &rest[start + end + CLOSE.len()..],
      None => {
        rest = "";
        break;
      }
    }
  }
  out.push_str(rest);
  out.trim().to_string()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  stream: bool,
  temperature: f32,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn think_tags_are_removed_and_surrounding_text_kept() {
    let input = "Good answer.<think>internal\nreasoning</think> Final verdict: retry.";
    assert_eq!(strip_think_tags(input), "Good answer. Final verdict: retry.");
  }

  #[test]
  fn multiple_and_unterminated_think_blocks() {
    let multi = "<think>a</think>one<think>b</think>two";
    assert_eq!(strip_think_tags(multi), "onetwo");

    let unterminated = "verdict<think>never closed";
    assert_eq!(strip_think_tags(unterminated), "verdict");
  }

  #[test]
  fn fallback_embeds_the_configured_endpoint() {
    let client = LlmClient {
      client: reqwest::Client::new(),
      endpoint: "http://127.0.0.1:9999/v1/chat/completions".into(),
      model: "lm-studio".into(),
    };
    let text = client.fallback_text("connection refused");
    assert!(text.contains("http://127.0.0.1:9999/v1/chat/completions"));
    assert!(text.contains("connection refused"));
  }

  #[test]
  fn request_payload_has_the_fixed_shape() {
    let req = ChatCompletionRequest {
      model: "lm-studio".into(),
      messages: vec![ChatMessageReq { role: "system".into(), content: "s".into() }],
      stream: false,
      temperature: TEMPERATURE,
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["model"], "lm-studio");
    assert_eq!(v["stream"], false);
    assert_eq!(v["messages"][0]["role"], "system");
  }
}
