//! Per-call option overrides and their deterministic three-level merge.
//!
//! Resolution order is strict: call-site override > template default >
//! global default.  [`CallOptions`] is the fully-resolved result attached to
//! every bound request; [`CallOverrides`] is the sparse form used by
//! templates and call sites.

use serde::{Deserialize, Serialize};

use crate::config::{LlmConfig, TtsConfig};

// ---------------------------------------------------------------------------
// CallOverrides
// ---------------------------------------------------------------------------

/// Sparse option overrides.  `None` fields defer to the next level down.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallOverrides {
    /// Model identifier override.
    #[serde(default)]
    pub model: Option<String>,
    /// Sampling temperature override.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Generated-token cap override.
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// TTS voice override.
    #[serde(default)]
    pub voice: Option<String>,
    /// Whether the reply is also placed on the host clipboard.
    #[serde(default)]
    pub copy_to_clipboard: Option<bool>,
}

impl CallOverrides {
    /// Returns `true` when no field is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// ---------------------------------------------------------------------------
// CallOptions
// ---------------------------------------------------------------------------

/// Fully-resolved call options — every field has a concrete value.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOptions {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub voice: String,
    pub copy_to_clipboard: bool,
}

impl CallOptions {
    /// Merge `call` over `template` over the global defaults.
    ///
    /// The merge is a pure function of its inputs; resolving twice with the
    /// same arguments yields identical options.
    pub fn resolve(
        llm: &LlmConfig,
        tts: &TtsConfig,
        template: &CallOverrides,
        call: &CallOverrides,
    ) -> Self {
        Self {
            model: call
                .model
                .clone()
                .or_else(|| template.model.clone())
                .unwrap_or_else(|| llm.model.clone()),
            temperature: call
                .temperature
                .or(template.temperature)
                .unwrap_or(llm.temperature),
            max_output_tokens: call
                .max_output_tokens
                .or(template.max_output_tokens)
                .unwrap_or(llm.max_output_tokens),
            voice: call
                .voice
                .clone()
                .or_else(|| template.voice.clone())
                .unwrap_or_else(|| tts.voice_id.clone()),
            copy_to_clipboard: call
                .copy_to_clipboard
                .or(template.copy_to_clipboard)
                .unwrap_or(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> (LlmConfig, TtsConfig) {
        let llm = LlmConfig {
            model: "gpt-4.1".into(),
            temperature: 0.3,
            max_output_tokens: 1500,
            ..LlmConfig::default()
        };
        let tts = TtsConfig {
            voice_id: "voice-global".into(),
            ..TtsConfig::default()
        };
        (llm, tts)
    }

    #[test]
    fn globals_apply_when_nothing_overrides() {
        let (llm, tts) = defaults();
        let opts = CallOptions::resolve(
            &llm,
            &tts,
            &CallOverrides::default(),
            &CallOverrides::default(),
        );
        assert_eq!(opts.model, "gpt-4.1");
        assert_eq!(opts.temperature, 0.3);
        assert_eq!(opts.max_output_tokens, 1500);
        assert_eq!(opts.voice, "voice-global");
        assert!(!opts.copy_to_clipboard);
    }

    #[test]
    fn template_overrides_beat_globals() {
        let (llm, tts) = defaults();
        let template = CallOverrides {
            temperature: Some(0.1),
            max_output_tokens: Some(300),
            ..CallOverrides::default()
        };
        let opts = CallOptions::resolve(&llm, &tts, &template, &CallOverrides::default());
        assert_eq!(opts.temperature, 0.1);
        assert_eq!(opts.max_output_tokens, 300);
        // Untouched fields still come from globals.
        assert_eq!(opts.model, "gpt-4.1");
    }

    #[test]
    fn call_overrides_beat_template_overrides() {
        let (llm, tts) = defaults();
        let template = CallOverrides {
            temperature: Some(0.1),
            model: Some("gpt-4o-mini".into()),
            ..CallOverrides::default()
        };
        let call = CallOverrides {
            temperature: Some(0.9),
            ..CallOverrides::default()
        };
        let opts = CallOptions::resolve(&llm, &tts, &template, &call);
        assert_eq!(opts.temperature, 0.9);
        // Call did not touch the model, so the template keeps it.
        assert_eq!(opts.model, "gpt-4o-mini");
    }

    #[test]
    fn resolution_is_deterministic() {
        let (llm, tts) = defaults();
        let template = CallOverrides {
            voice: Some("voice-template".into()),
            copy_to_clipboard: Some(true),
            ..CallOverrides::default()
        };
        let call = CallOverrides {
            max_output_tokens: Some(64),
            ..CallOverrides::default()
        };
        let a = CallOptions::resolve(&llm, &tts, &template, &call);
        let b = CallOptions::resolve(&llm, &tts, &template, &call);
        assert_eq!(a, b);
    }
}
