//! AI orchestration core for a language-learning flashcard editor.
//!
//! The crate turns editor gestures into provider calls and provider replies
//! into card content:
//! * [`template`] — configurable prompt templates and option precedence.
//! * [`dispatch`] — transports, outcome classification and bounded retry.
//! * [`session`] — windowed conversational memory for the chat assistant.
//! * [`pipeline`] — the multi-step card generator with skip propagation.
//! * [`audio`] — content-addressed speech artifacts.
//! * [`editor`] — the host-side card boundary.
//!
//! [`Assistant`] ties the pieces together for hosts that want the whole
//! thing wired up; each module also stands on its own.

pub mod audio;
pub mod config;
pub mod dispatch;
pub mod editor;
pub mod pipeline;
pub mod session;
pub mod template;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use audio::{ArtifactStore, AudioArtifact, SynthesisError};
use config::{AppConfig, ConfigError};
use dispatch::{
    ChatError, ChatTransport, DispatchError, Dispatcher, ElevenLabsSpeechTransport,
    OpenAiChatTransport, Reply, SpeechTransport,
};
use editor::CardEditor;
use pipeline::{FieldMap, PipelineRun, PipelineRunner, PipelineSpec};
use session::{SessionError, SessionId, SessionStore};
use template::{CallOverrides, TemplateError, TemplateRegistry, TemplateResolver};

// ---------------------------------------------------------------------------
// AssistantError
// ---------------------------------------------------------------------------

/// Any failure surfaced through the [`Assistant`] facade.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    /// The field a gesture needs has no text.
    #[error("card field {0} is empty")]
    EmptyField(usize),
}

impl From<ChatError> for AssistantError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Session(e) => Self::Session(e),
            ChatError::Dispatch(e) => Self::Dispatch(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Assistant
// ---------------------------------------------------------------------------

/// Fully wired orchestration facade.
///
/// Owns the resolver, dispatcher, session store and artifact store; the
/// host supplies an implementation of [`CardEditor`] per gesture.
pub struct Assistant {
    config: AppConfig,
    resolver: TemplateResolver,
    dispatcher: Arc<Dispatcher>,
    sessions: SessionStore,
    artifacts: ArtifactStore,
}

impl Assistant {
    /// Build an assistant over the production HTTP transports.
    ///
    /// # Errors
    ///
    /// Fails fast with [`ConfigError::MissingValue`] when a required
    /// setting (API key, model, voice) is absent.
    pub fn new(config: AppConfig, registry: TemplateRegistry) -> Result<Self, ConfigError> {
        let chat = Arc::new(OpenAiChatTransport::from_config(&config.llm));
        let speech = Arc::new(ElevenLabsSpeechTransport::from_config(&config.tts));
        Self::with_transports(config, registry, chat, speech)
    }

    /// Build an assistant over explicit transports (tests, alternative
    /// providers).
    pub fn with_transports(
        config: AppConfig,
        registry: TemplateRegistry,
        chat: Arc<dyn ChatTransport>,
        speech: Arc<dyn SpeechTransport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let resolver = TemplateResolver::new(registry, config.llm.clone(), config.tts.clone());
        let dispatcher = Arc::new(Dispatcher::new(chat, speech));
        let artifacts = ArtifactStore::new(config.audio_dir(), dispatcher.clone());

        Ok(Self {
            config,
            resolver,
            dispatcher,
            sessions: SessionStore::new(),
            artifacts,
        })
    }

    /// The loaded template registry (for UI listings).
    pub fn registry(&self) -> &TemplateRegistry {
        self.resolver.registry()
    }

    // -----------------------------------------------------------------------
    // Quick prompts
    // -----------------------------------------------------------------------

    /// Resolve and dispatch a one-shot template, delivering the reply per
    /// the template's clipboard flag.
    ///
    /// Caller-supplied `vars` win over the ambient ones (target language,
    /// context tags).  The reply text is always returned; when the resolved
    /// options carry `copy_to_clipboard` it is also placed on the host
    /// clipboard.
    pub async fn quick_prompt<E: CardEditor>(
        &self,
        template_id: &str,
        vars: &HashMap<String, String>,
        call: &CallOverrides,
        editor: &mut E,
    ) -> Result<String, AssistantError> {
        let mut merged = self.ambient_vars();
        merged.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));

        let request = self.resolver.resolve(template_id, &merged, call)?;
        let copy = request.options.copy_to_clipboard;

        let text = match self.dispatcher.dispatch(&request).await? {
            Reply::Text(text) => text,
            Reply::Audio(_) => return Err(DispatchError::EmptyReply.into()),
        };

        if copy {
            editor.copy_to_clipboard(&text);
        }
        Ok(text)
    }

    // -----------------------------------------------------------------------
    // Chat assistant
    // -----------------------------------------------------------------------

    /// Open a chat window's session.
    pub fn open_chat(&self) -> SessionId {
        self.sessions.open()
    }

    /// Close a chat window's session, discarding its memory.  Replies still
    /// in flight for the closed id are dropped on arrival.
    pub fn close_chat(&self, id: SessionId) {
        self.sessions.close(id)
    }

    /// Send one chat message within a session and return the reply.
    pub async fn chat(&self, id: SessionId, message: &str) -> Result<String, AssistantError> {
        let vars: HashMap<String, String> =
            [("message".to_string(), message.to_string())].into();
        let request = self
            .resolver
            .resolve("chatbot", &vars, &CallOverrides::default())?;
        Ok(self
            .dispatcher
            .dispatch_chat(&request, &self.sessions, id)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Card generation
    // -----------------------------------------------------------------------

    /// Run the standard card pipeline for `expression` and write whatever
    /// fields it produced into the editor.
    ///
    /// Partial runs still write their fields; inspect the returned
    /// [`PipelineRun`] for per-step outcomes.
    pub async fn generate_card<E: CardEditor>(
        &self,
        expression: &str,
        editor: &mut E,
    ) -> Result<PipelineRun, AssistantError> {
        let runner = PipelineRunner::new(&self.resolver, &self.dispatcher, self.ambient_vars());
        let run = runner.run(&PipelineSpec::card_default(), expression).await;
        editor.write_fields(&run.fields);
        Ok(run)
    }

    // -----------------------------------------------------------------------
    // Speech
    // -----------------------------------------------------------------------

    /// Synthesize the configured source field and write the `[sound:…]`
    /// reference into the configured audio field.
    pub async fn speak_field<E: CardEditor>(
        &self,
        editor: &mut E,
    ) -> Result<AudioArtifact, AssistantError> {
        let source = self.config.tts.source_field;
        let text = editor
            .field_text(source)
            .filter(|t| !t.trim().is_empty())
            .ok_or(AssistantError::EmptyField(source))?;

        let artifact = self
            .artifacts
            .synthesize(&text, &self.config.tts.voice_id)
            .await?;

        let mut fields = FieldMap::new();
        fields.insert(self.config.tts.audio_field, artifact.attachment_tag());
        editor.write_fields(&fields);

        Ok(artifact)
    }

    /// Variables every template may use without the caller supplying them.
    fn ambient_vars(&self) -> HashMap<String, String> {
        let tags = if self.config.context_tags.is_empty() {
            "everyday life".to_string()
        } else {
            self.config.context_tags.join(", ")
        };
        [
            (
                "target_language".to_string(),
                self.config.target_language.clone(),
            ),
            ("user_lang".to_string(), self.config.target_language.clone()),
            ("context_tags".to_string(), tags),
        ]
        .into()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
