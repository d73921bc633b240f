//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Required values (API key, model) are checked by [`AppConfig::validate`]
//! rather than silently defaulted at call time.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Fatal configuration problems, surfaced immediately and never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required settings value is missing or still a placeholder.
    #[error("missing required configuration value: {0}")]
    MissingValue(String),

    /// The template registry file is malformed or an entry is invalid.
    #[error("template registry error: {0}")]
    Registry(String),
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the LLM chat/completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key sent as `Authorization: Bearer …`.
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Default model identifier (e.g. `"gpt-4.1"`).
    pub model: String,
    /// Default sampling temperature.  Some models ignore this silently.
    pub temperature: f32,
    /// Default cap on generated tokens per call.
    pub max_output_tokens: u32,
    /// Maximum seconds to wait for a response before the call is classified
    /// as a network error.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com".into(),
            model: "gpt-4.1".into(),
            temperature: 0.3,
            max_output_tokens: 1500,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the speech-synthesis endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// API key sent as the `xi-api-key` header.
    pub api_key: String,
    /// Base URL of the TTS provider.
    pub base_url: String,
    /// Default voice identifier.
    pub voice_id: String,
    /// TTS model identifier.
    pub model: String,
    /// Maximum seconds to wait for synthesized audio.
    pub timeout_secs: u64,
    /// Ordinal index of the card field whose text is spoken.
    pub source_field: usize,
    /// Ordinal index of the card field that receives the audio reference.
    pub audio_field: usize,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.elevenlabs.io".into(),
            voice_id: "b3jcIbyC3BSnaRu8avEk".into(),
            model: "eleven_flash_v2_5".into(),
            timeout_secs: 30,
            source_field: 0,
            audio_field: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use cardcraft::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM endpoint settings.
    pub llm: LlmConfig,
    /// TTS endpoint settings.
    pub tts: TtsConfig,
    /// Language that translation steps target (e.g. `"English"`).
    pub target_language: String,
    /// Free-text topics that steer example-sentence generation.
    pub context_tags: Vec<String>,
    /// Extra diagnostic logging when `true`.
    pub debug: bool,
    /// Override for the audio artifact directory.  `None` uses the
    /// platform default from [`AppPaths`].
    pub audio_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            tts: TtsConfig::default(),
            target_language: "English".into(),
            context_tags: Vec::new(),
            debug: false,
            audio_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.  Required values are checked separately by [`validate`].
    ///
    /// [`validate`]: Self::validate
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that every value the orchestration core cannot run without is
    /// actually present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingValue`] naming the first missing key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.api_key.is_empty() || self.llm.api_key == "your-api-key-here" {
            return Err(ConfigError::MissingValue("llm.api_key".into()));
        }
        if self.llm.model.is_empty() {
            return Err(ConfigError::MissingValue("llm.model".into()));
        }
        if self.llm.base_url.is_empty() {
            return Err(ConfigError::MissingValue("llm.base_url".into()));
        }
        if self.target_language.is_empty() {
            return Err(ConfigError::MissingValue("target_language".into()));
        }
        if self.tts.voice_id.is_empty() {
            return Err(ConfigError::MissingValue("tts.voice_id".into()));
        }
        Ok(())
    }

    /// Resolve the directory where audio artifacts are stored.
    pub fn audio_dir(&self) -> PathBuf {
        self.audio_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().audio_dir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
