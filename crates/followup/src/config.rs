//! Configuration management for followup
//!
//! Short links, neighborhood lookup settings and text generation settings. Every
//! field has a default so a partial file (or no file at all) is valid. API keys
//! normally arrive through CLI flags or environment variables and are merged in
//! with [`Config::with_credentials`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Working-directory config files, checked in order
const LOCAL_CONFIG_FILES: &[&str] = &[".followup.json", "followup.json", ".followup.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Unable to read config {path}: {message}")]
  Unreadable { path: PathBuf, message: String },

  #[error("Invalid config {path}: {message}")]
  Invalid { path: PathBuf, message: String },

  #[error("Missing {name}: pass {flag} or set {env}")]
  MissingCredential { name: &'static str, flag: &'static str, env: &'static str },

  #[error("{0}")]
  Unsupported(String),
}

impl ConfigError {
  pub fn unreadable(path: &Path, message: impl ToString) -> Self {
    Self::Unreadable { path: path.to_path_buf(), message: message.to_string() }
  }

  pub fn invalid(path: &Path, message: impl ToString) -> Self {
    Self::Invalid { path: path.to_path_buf(), message: message.to_string() }
  }

  pub fn unsupported(message: impl Into<String>) -> Self {
    Self::Unsupported(message.into())
  }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
  /// Short links embedded in messages
  #[serde(default)]
  pub links: Links,
  /// Geocoding and places lookup
  #[serde(default)]
  pub lookup: LookupSettings,
  /// Hosted text generation
  #[serde(default)]
  pub generation: GenerationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
  /// EMI calculator link
  #[serde(default = "default_emi_link")]
  pub emi_link: String,
  /// Free valuation report link
  #[serde(default = "default_valuation_link")]
  pub valuation_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupSettings {
  #[serde(default = "default_maps_base_url")]
  pub base_url: String,
  /// Google Maps API key; usually supplied via `GOOGLE_MAPS_API_KEY`
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub api_key: Option<String>,
  /// Places search radius in metres
  #[serde(default = "default_radius_m")]
  pub radius_m: u32,
  /// Maximum place names kept per category
  #[serde(default = "default_per_category_limit")]
  pub per_category_limit: usize,
  #[serde(default = "default_lookup_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
  #[serde(default = "default_gemini_base_url")]
  pub base_url: String,
  /// Gemini API key; usually supplied via `GEMINI_API_KEY`
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub api_key: Option<String>,
  #[serde(default = "default_model")]
  pub model: String,
  #[serde(default = "default_temperature")]
  pub temperature: f32,
  #[serde(default = "default_top_p")]
  pub top_p: f32,
  #[serde(default = "default_max_output_tokens")]
  pub max_output_tokens: u32,
  /// Generated text shorter than this (in characters) falls back to the template
  #[serde(default = "default_min_chars")]
  pub min_chars: usize,
  /// Pause between consecutive generation calls
  #[serde(default = "default_delay_ms")]
  pub delay_ms: u64,
  #[serde(default = "default_generation_timeout_secs")]
  pub timeout_secs: u64,
}

// Default value functions
fn default_emi_link() -> String {
  "https://lnk.ink/FUwEc".to_string()
}
fn default_valuation_link() -> String {
  "https://lnk.ink/fkYwF".to_string()
}
fn default_maps_base_url() -> String {
  "https://maps.googleapis.com".to_string()
}
fn default_radius_m() -> u32 {
  3000
}
fn default_per_category_limit() -> usize {
  2
}
fn default_lookup_timeout_secs() -> u64 {
  15
}
fn default_gemini_base_url() -> String {
  "https://generativelanguage.googleapis.com".to_string()
}
fn default_model() -> String {
  "gemini-1.5-flash".to_string()
}
fn default_temperature() -> f32 {
  0.7
}
fn default_top_p() -> f32 {
  0.9
}
fn default_max_output_tokens() -> u32 {
  512
}
fn default_min_chars() -> usize {
  60
}
fn default_delay_ms() -> u64 {
  1000
}
fn default_generation_timeout_secs() -> u64 {
  30
}

impl Default for Links {
  fn default() -> Self {
    Self { emi_link: default_emi_link(), valuation_link: default_valuation_link() }
  }
}

impl Default for LookupSettings {
  fn default() -> Self {
    Self {
      base_url: default_maps_base_url(),
      api_key: None,
      radius_m: default_radius_m(),
      per_category_limit: default_per_category_limit(),
      timeout_secs: default_lookup_timeout_secs(),
    }
  }
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      base_url: default_gemini_base_url(),
      api_key: None,
      model: default_model(),
      temperature: default_temperature(),
      top_p: default_top_p(),
      max_output_tokens: default_max_output_tokens(),
      min_chars: default_min_chars(),
      delay_ms: default_delay_ms(),
      timeout_secs: default_generation_timeout_secs(),
    }
  }
}

impl Config {
  /// Load configuration from a JSON or YAML file (picked by extension)
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;

    let is_yaml = matches!(
      path.extension().and_then(|ext| ext.to_str()),
      Some("yaml") | Some("yml")
    );

    if is_yaml {
      serde_yaml::from_str(&content).map_err(|e| ConfigError::invalid(path, e))
    } else {
      serde_json::from_str(&content).map_err(|e| ConfigError::invalid(path, e))
    }
  }

  /// Load the explicit file if given, else the first existing default location, else defaults
  pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(path) = explicit {
      return Self::load_from_file(path);
    }

    Self::load_first_existing(&default_locations())
  }

  /// Load the first of `candidates` that exists; defaults when none do
  pub fn load_first_existing(candidates: &[PathBuf]) -> Result<Self, ConfigError> {
    match candidates.iter().find(|path| path.exists()) {
      Some(path) => {
        tracing::debug!(path = %path.display(), "loading config");
        Self::load_from_file(path)
      }
      None => Ok(Config::default()),
    }
  }

  /// Save configuration to a JSON file
  pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::invalid(path, e))?;
    std::fs::write(path, content).map_err(|e| ConfigError::unreadable(path, e))
  }

  /// Overlay API keys from flags/environment; blank values are ignored
  pub fn with_credentials(mut self, maps_api_key: Option<String>, gemini_api_key: Option<String>) -> Self {
    if let Some(key) = maps_api_key.filter(|key| !key.trim().is_empty()) {
      self.lookup.api_key = Some(key);
    }
    if let Some(key) = gemini_api_key.filter(|key| !key.trim().is_empty()) {
      self.generation.api_key = Some(key);
    }
    self
  }

  /// Gemini key, required for generated mode
  pub fn require_gemini_key(&self) -> Result<&str, ConfigError> {
    self.generation.api_key.as_deref().filter(|key| !key.trim().is_empty()).ok_or(
      ConfigError::MissingCredential {
        name: "Gemini API key",
        flag: "--gemini-api-key",
        env: "GEMINI_API_KEY",
      },
    )
  }

  /// Maps key, if configured
  pub fn maps_key(&self) -> Option<&str> {
    self.lookup.api_key.as_deref().filter(|key| !key.trim().is_empty())
  }
}

fn default_locations() -> Vec<PathBuf> {
  let mut locations: Vec<PathBuf> = LOCAL_CONFIG_FILES.iter().map(PathBuf::from).collect();
  if let Some(config_dir) = dirs::config_dir() {
    locations.push(config_dir.join("followup").join("config.json"));
  }
  locations
}
