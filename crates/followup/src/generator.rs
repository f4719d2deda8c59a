//! Hosted text generation (Gemini `generateContent`).
//!
//! A generator makes exactly one request per call. Every failure is returned as a
//! [`GenerationError`] value; the composer decides what to do with it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::GenerationSettings;

/// Longest prompt excerpt written to debug logs
const PROMPT_PREVIEW_CHARS: usize = 80;

/// Output language for generated messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  #[default]
  English,
  Gujarati,
}

impl Language {
  pub fn name(&self) -> &'static str {
    match self {
      Language::English => "English",
      Language::Gujarati => "Gujarati",
    }
  }

  fn writing_rule(&self) -> &'static str {
    match self {
      Language::English => "Write in simple, natural English.",
      Language::Gujarati => {
        "Write in natural, conversational Gujarati using Gujarati script. Keep English words only for brand names, links and numbers."
      }
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
  #[error("Generation request failed: {0}")]
  Request(String),

  #[error("Generation request timed out")]
  Timeout,

  #[error("Generation service returned HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("Generation response was not understood: {0}")]
  Malformed(String),

  #[error("Generation returned no text")]
  Empty,
}

impl GenerationError {
  pub fn status(status: u16, message: impl Into<String>) -> Self {
    Self::Status { status, message: message.into() }
  }

  pub fn malformed(message: impl ToString) -> Self {
    Self::Malformed(message.to_string())
  }
}

impl From<reqwest::Error> for GenerationError {
  fn from(error: reqwest::Error) -> Self {
    if error.is_timeout() {
      GenerationError::Timeout
    } else if error.is_decode() {
      GenerationError::malformed(error)
    } else {
      GenerationError::Request(error.to_string())
    }
  }
}

/// Produces message text for a prompt
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
  async fn generate(&self, prompt: &str, language: Language) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
  system_instruction: Content<'a>,
  contents: Vec<Content<'a>>,
  generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<&'a str>,
  parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
  text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  top_p: f32,
  max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
  #[serde(default)]
  content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
  #[serde(default)]
  text: String,
}

/// Gemini REST client
pub struct GeminiGenerator {
  client: reqwest::Client,
  settings: GenerationSettings,
  api_key: String,
}

impl GeminiGenerator {
  pub fn new(settings: GenerationSettings, api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(settings.timeout_secs)).build()?;
    Ok(Self { client, settings, api_key: api_key.into() })
  }

  fn endpoint(&self) -> String {
    format!(
      "{}/v1beta/models/{}:generateContent",
      self.settings.base_url.trim_end_matches('/'),
      self.settings.model
    )
  }

  fn system_instruction(language: Language) -> String {
    format!(
      "You write short WhatsApp follow-up messages for a no-brokerage real estate company. {} \
       Reply with the message text only.",
      language.writing_rule()
    )
  }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
  async fn generate(&self, prompt: &str, language: Language) -> Result<String, GenerationError> {
    let system = Self::system_instruction(language);
    let request = GenerateRequest {
      system_instruction: Content { role: None, parts: vec![Part { text: &system }] },
      contents: vec![Content { role: Some("user"), parts: vec![Part { text: prompt }] }],
      generation_config: GenerationConfig {
        temperature: self.settings.temperature,
        top_p: self.settings.top_p,
        max_output_tokens: self.settings.max_output_tokens,
      },
    };

    tracing::debug!(model = %self.settings.model, language = language.name(), prompt = %preview(prompt), "generating");

    let response = self
      .client
      .post(self.endpoint())
      .query(&[("key", self.api_key.as_str())])
      .json(&request)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      return Err(GenerationError::status(status.as_u16(), preview(&message)));
    }

    let body: GenerateResponse = response.json().await?;
    let text: String = body
      .candidates
      .into_iter()
      .next()
      .and_then(|candidate| candidate.content)
      .map(|content| content.parts.into_iter().map(|part| part.text).collect())
      .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
      return Err(GenerationError::Empty);
    }
    Ok(text.to_string())
  }
}

/// Spaces consecutive calls on an inner generator by at least `interval`
pub struct Paced<G> {
  inner: G,
  interval: Duration,
  last_call: Mutex<Option<Instant>>,
}

impl<G: TextGenerator> Paced<G> {
  pub fn new(inner: G, interval: Duration) -> Self {
    Self { inner, interval, last_call: Mutex::new(None) }
  }

  fn wait_time(&self) -> Duration {
    let mut last_call = match self.last_call.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    let now = Instant::now();
    let wait = last_call.map(|at| self.interval.saturating_sub(now.duration_since(at))).unwrap_or_default();
    *last_call = Some(now + wait);
    wait
  }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for Paced<G> {
  async fn generate(&self, prompt: &str, language: Language) -> Result<String, GenerationError> {
    let wait = self.wait_time();
    if !wait.is_zero() {
      tokio::time::sleep(wait).await;
    }
    self.inner.generate(prompt, language).await
  }
}

/// Single-line excerpt of a prompt or response for logs
pub fn preview(text: &str) -> String {
  let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
  match flat.char_indices().nth(PROMPT_PREVIEW_CHARS) {
    Some((cut, _)) => format!("{}…", &flat[..cut]),
    None => flat,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::{Matcher, Server};

  fn settings(base_url: String) -> GenerationSettings {
    GenerationSettings { base_url, model: "test-model".to_string(), ..GenerationSettings::default() }
  }

  const PATH: &str = "/v1beta/models/test-model:generateContent";

  #[tokio::test]
  async fn test_generate_success() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", PATH)
      .match_query(Matcher::UrlEncoded("key".into(), "gemini-key".into()))
      .match_body(Matcher::PartialJson(serde_json::json!({
        "contents": [{"role": "user", "parts": [{"text": "Write a message"}]}],
        "generationConfig": {"maxOutputTokens": 512}
      })))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(
        r#"{"candidates": [{"content": {"parts": [{"text": "🏡 Hello "}, {"text": "there!\n"}]}, "finishReason": "STOP"}]}"#,
      )
      .create_async()
      .await;

    let generator = GeminiGenerator::new(settings(server.url()), "gemini-key").unwrap();
    let text = generator.generate("Write a message", Language::English).await.unwrap();
    assert_eq!(text, "🏡 Hello there!");
  }

  #[tokio::test]
  async fn test_generate_sends_language_instruction() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", PATH)
      .match_query(Matcher::Any)
      .match_body(Matcher::Regex("Gujarati script".to_string()))
      .with_status(200)
      .with_body(r#"{"candidates": [{"content": {"parts": [{"text": "નમસ્તે"}]}}]}"#)
      .create_async()
      .await;

    let generator = GeminiGenerator::new(settings(server.url()), "k").unwrap();
    assert_eq!(generator.generate("prompt", Language::Gujarati).await.unwrap(), "નમસ્તે");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_generate_http_error() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", PATH)
      .match_query(Matcher::Any)
      .with_status(429)
      .with_body("quota exhausted")
      .create_async()
      .await;

    let generator = GeminiGenerator::new(settings(server.url()), "k").unwrap();
    let err = generator.generate("prompt", Language::English).await.unwrap_err();
    assert_eq!(err, GenerationError::status(429, "quota exhausted"));
  }

  #[tokio::test]
  async fn test_generate_malformed_and_empty_responses() {
    let mut server = Server::new_async().await;
    let _bad = server
      .mock("POST", PATH)
      .match_query(Matcher::Any)
      .match_body(Matcher::Regex("bad".to_string()))
      .with_status(200)
      .with_body("not json")
      .create_async()
      .await;
    let _empty = server
      .mock("POST", PATH)
      .match_query(Matcher::Any)
      .match_body(Matcher::Regex("empty".to_string()))
      .with_status(200)
      .with_body(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#)
      .create_async()
      .await;

    let generator = GeminiGenerator::new(settings(server.url()), "k").unwrap();
    assert!(matches!(
      generator.generate("bad", Language::English).await,
      Err(GenerationError::Malformed(_))
    ));
    assert_eq!(generator.generate("empty", Language::English).await, Err(GenerationError::Empty));
  }

  #[tokio::test]
  async fn test_generate_unreachable_service() {
    let generator = GeminiGenerator::new(settings("http://127.0.0.1:1".to_string()), "k").unwrap();
    assert!(generator.generate("prompt", Language::English).await.is_err());
  }

  #[tokio::test]
  async fn test_paced_generator_delegates() {
    let mut inner = MockTextGenerator::new();
    inner.expect_generate().times(2).returning(|prompt, _| Ok(format!("echo {prompt}")));

    let paced = Paced::new(inner, Duration::from_millis(20));
    let started = Instant::now();
    assert_eq!(paced.generate("one", Language::English).await.unwrap(), "echo one");
    assert_eq!(paced.generate("two", Language::English).await.unwrap(), "echo two");
    assert!(started.elapsed() >= Duration::from_millis(20));
  }

  #[test]
  fn test_preview_truncates_and_flattens() {
    assert_eq!(preview("short\n  prompt"), "short prompt");
    let long = "x".repeat(200);
    let shown = preview(&long);
    assert_eq!(shown.chars().count(), PROMPT_PREVIEW_CHARS + 1);
    assert!(shown.ends_with('…'));
  }
}
