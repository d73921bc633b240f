//! Prompt template registry loaded from `templates.json`.
//!
//! Each entry configures one editor action: a prompt pair with named
//! `{placeholder}` slots, optional few-shot example turns, and sparse option
//! overrides.  Entries are immutable once loaded; reloading the registry is
//! the only way to change them.
//!
//! A built-in registry (the default card-generation prompts plus the chat
//! assistant) is embedded in the crate so the core works before the user has
//! written a registry file of their own.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::config::ConfigError;

use super::options::CallOverrides;

/// Registry shipped with the crate; used when no user file exists.
const BUILTIN_TEMPLATES: &str = include_str!("../../templates/default.json");

// ---------------------------------------------------------------------------
// RequestKind
// ---------------------------------------------------------------------------

/// Which endpoint a bound request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Session-aware chat: history is prepended, the reply is remembered.
    Chat,
    /// Stateless single-shot text call (pipeline steps, quick prompts).
    Completion,
    /// Speech synthesis.
    Tts,
}

impl RequestKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(Self::Chat),
            "completion" => Some(Self::Completion),
            "tts" => Some(Self::Tts),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ExampleTurn
// ---------------------------------------------------------------------------

/// One few-shot example: a user message and the assistant reply expected
/// for it.  Included verbatim in the outgoing message list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExampleTurn {
    pub user: String,
    pub assistant: String,
}

// ---------------------------------------------------------------------------
// PromptTemplate
// ---------------------------------------------------------------------------

/// A configured prompt template.  Immutable after load.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Unique registry key.
    pub id: String,
    /// Human-readable description shown in settings.
    pub description: String,
    /// Label for the editor button that triggers this template.
    pub button_label: String,
    /// Target endpoint kind.
    pub kind: RequestKind,
    /// System message; may itself contain placeholders.
    pub system_message: String,
    /// User message body with `{placeholder}` slots.
    pub user_template: String,
    /// Few-shot example turns sent before the real user message.
    pub examples: Vec<ExampleTurn>,
    /// Template-level option overrides.
    pub overrides: CallOverrides,
    /// Every placeholder name the template declares, across both the system
    /// message and the user template.
    pub placeholders: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Raw JSON shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawTemplate {
    #[serde(default)]
    description: String,
    #[serde(default)]
    button_label: String,
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default)]
    system_message: String,
    user_template: Option<String>,
    #[serde(default)]
    examples: Vec<ExampleTurn>,
    #[serde(default)]
    overrides: CallOverrides,
}

fn default_kind() -> String {
    "completion".into()
}

// ---------------------------------------------------------------------------
// Placeholder scanning
// ---------------------------------------------------------------------------

/// Matches `{name}` where `name` is a bare identifier.  Anything else in
/// braces (JSON braces in few-shot examples, for instance) is left alone.
pub(crate) fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{[A-Za-z_][A-Za-z0-9_]*\}").expect("valid placeholder pattern")
    })
}

fn scan_placeholders(texts: &[&str]) -> BTreeSet<String> {
    let re = placeholder_regex();
    let mut names = BTreeSet::new();
    for text in texts {
        for m in re.find_iter(text) {
            names.insert(text[m.start() + 1..m.end() - 1].to_string());
        }
    }
    names
}

// ---------------------------------------------------------------------------
// TemplateRegistry
// ---------------------------------------------------------------------------

/// All loaded prompt templates, keyed by id.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: HashMap<String, PromptTemplate>,
}

impl TemplateRegistry {
    /// Parse a registry from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Registry`] naming the offending entry when an
    /// entry is missing its `user_template` or declares an unknown `kind` —
    /// malformed registries fail fast instead of defaulting silently.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, RawTemplate> = serde_json::from_str(json)
            .map_err(|e| ConfigError::Registry(format!("invalid templates JSON: {e}")))?;

        let mut templates = HashMap::with_capacity(raw.len());
        for (id, entry) in raw {
            let user_template = entry.user_template.ok_or_else(|| {
                ConfigError::Registry(format!("template '{id}' is missing user_template"))
            })?;
            if user_template.trim().is_empty() {
                return Err(ConfigError::Registry(format!(
                    "template '{id}' has an empty user_template"
                )));
            }
            let kind = RequestKind::parse(&entry.kind).ok_or_else(|| {
                ConfigError::Registry(format!(
                    "template '{id}' has unknown kind '{}' (expected chat, completion or tts)",
                    entry.kind
                ))
            })?;

            let placeholders = scan_placeholders(&[&entry.system_message, &user_template]);

            templates.insert(
                id.clone(),
                PromptTemplate {
                    id,
                    description: entry.description,
                    button_label: entry.button_label,
                    kind,
                    system_message: entry.system_message,
                    user_template,
                    examples: entry.examples,
                    overrides: entry.overrides,
                    placeholders,
                },
            );
        }

        Ok(Self { templates })
    }

    /// Load a registry from a JSON file on disk.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Registry(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }

    /// The registry embedded in the crate.
    pub fn builtin() -> Self {
        // The embedded JSON is validated by tests; a parse failure here is a
        // packaging bug, not a runtime condition.
        Self::from_json_str(BUILTIN_TEMPLATES).expect("embedded template registry parses")
    }

    /// Look up a template by id.
    pub fn get(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.get(id)
    }

    /// All template ids, sorted (stable for UI listings).
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of loaded templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` when no templates are loaded.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
