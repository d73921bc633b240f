//! Configuration module for the CardCraft orchestration core.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the LLM and
//! TTS endpoints, `AppPaths` for cross-platform data directories, and TOML
//! persistence via `AppConfig::load` / `AppConfig::save`.  The prompt
//! template registry itself lives in [`crate::template`]; this module only
//! knows where its file is.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, ConfigError, LlmConfig, TtsConfig};
