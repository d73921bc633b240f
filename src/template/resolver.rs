//! Template resolution — turns a registry entry plus live variables into a
//! [`BoundRequest`] ready for dispatch.
//!
//! Resolution is a pure function of the loaded registry, the variable map
//! and the override chain; it performs no I/O and has no side effects.  A
//! failed resolution produces no partial request.

use std::collections::HashMap;

use thiserror::Error;

use crate::config::{LlmConfig, TtsConfig};

use super::options::{CallOptions, CallOverrides};
use super::registry::{placeholder_regex, ExampleTurn, RequestKind, TemplateRegistry};

// ---------------------------------------------------------------------------
// TemplateError
// ---------------------------------------------------------------------------

/// Caller-logic errors raised during resolution.  Never retried.
#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    /// The requested id is not present in the loaded registry.
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    /// A declared placeholder has no supplied value.
    #[error("template '{template}' placeholder '{{{name}}}' has no value")]
    MissingVariable { template: String, name: String },
}

// ---------------------------------------------------------------------------
// BoundRequest
// ---------------------------------------------------------------------------

/// A template after placeholder substitution, ready to dispatch.
///
/// Created per invocation and discarded after dispatch; never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundRequest {
    /// Registry id this request was resolved from.
    pub template_id: String,
    /// Target endpoint kind.
    pub kind: RequestKind,
    /// Substituted system message (may be empty).
    pub system_message: String,
    /// Substituted user message.
    pub user_message: String,
    /// Few-shot example turns, sent before the user message.
    pub examples: Vec<ExampleTurn>,
    /// Fully-resolved call options (call > template > global).
    pub options: CallOptions,
}

// ---------------------------------------------------------------------------
// TemplateResolver
// ---------------------------------------------------------------------------

/// Binds templates against variable maps using the loaded registry and the
/// global defaults from configuration.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    registry: TemplateRegistry,
    llm: LlmConfig,
    tts: TtsConfig,
}

impl TemplateResolver {
    /// Create a resolver over `registry` with global defaults from config.
    pub fn new(registry: TemplateRegistry, llm: LlmConfig, tts: TtsConfig) -> Self {
        Self { registry, llm, tts }
    }

    /// Access the underlying registry (UI listings, pipeline validation).
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Resolve `id` against `vars` with optional per-call overrides.
    ///
    /// # Errors
    ///
    /// * [`TemplateError::UnknownTemplate`] — `id` not in the registry.
    /// * [`TemplateError::MissingVariable`] — a declared placeholder has no
    ///   entry in `vars`.  Checked before any substitution happens, so a
    ///   failed bind never produces a partially-substituted request.
    pub fn resolve(
        &self,
        id: &str,
        vars: &HashMap<String, String>,
        call: &CallOverrides,
    ) -> Result<BoundRequest, TemplateError> {
        let template = self
            .registry
            .get(id)
            .ok_or_else(|| TemplateError::UnknownTemplate(id.to_string()))?;

        for name in &template.placeholders {
            if !vars.contains_key(name) {
                return Err(TemplateError::MissingVariable {
                    template: id.to_string(),
                    name: name.clone(),
                });
            }
        }

        let system_message = substitute(&template.system_message, vars);
        let user_message = substitute(&template.user_template, vars);
        let options = CallOptions::resolve(&self.llm, &self.tts, &template.overrides, call);

        Ok(BoundRequest {
            template_id: template.id.clone(),
            kind: template.kind,
            system_message,
            user_message,
            examples: template.examples.clone(),
            options,
        })
    }
}

/// Replace every `{name}` slot with its value from `vars`.
///
/// Callers have already verified coverage, so an unmatched slot (possible
/// only via a race-free logic bug) is left verbatim rather than panicking.
fn substitute(text: &str, vars: &HashMap<String, String>) -> String {
    let re = placeholder_regex();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in re.find_iter(text) {
        let name = &text[m.start() + 1..m.end() - 1];
        out.push_str(&text[last..m.start()]);
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(m.as_str()),
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
