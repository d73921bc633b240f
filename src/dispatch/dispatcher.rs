//! The request dispatcher — sends bound requests, classifies outcomes and
//! applies the bounded retry policy.
//!
//! Chat-kind requests are the only stateful path: the session's retained
//! turns are prepended oldest-first and, on success, both the user turn and
//! the assistant reply are appended back (which applies the eviction
//! invariant).  Completion and TTS requests are stateless.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::session::{MessageTurn, SessionError, SessionId, SessionStore};
use crate::template::{BoundRequest, RequestKind};

use super::outcome::{DispatchError, Reply};
use super::transport::{ChatTransport, SpeechTransport, WireMessage};

/// Attempts per call, counting the first.
const MAX_ATTEMPTS: u32 = 3;
/// Base delay before the first retry; doubles per attempt.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// ChatError
// ---------------------------------------------------------------------------

/// Failure of a session-aware chat dispatch.
#[derive(Debug, Error, PartialEq)]
pub enum ChatError {
    /// The session was closed (window gone); any reply was dropped.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The underlying call failed after the retry policy was exhausted.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Sends bound requests over the configured transports.
pub struct Dispatcher {
    chat: Arc<dyn ChatTransport>,
    speech: Arc<dyn SpeechTransport>,
    max_attempts: u32,
    backoff_base: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with the default retry policy (3 attempts,
    /// 500 ms doubling backoff).
    pub fn new(chat: Arc<dyn ChatTransport>, speech: Arc<dyn SpeechTransport>) -> Self {
        Self {
            chat,
            speech,
            max_attempts: MAX_ATTEMPTS,
            backoff_base: BACKOFF_BASE,
        }
    }

    /// Override the retry policy (tests use a 1 ms base).
    pub fn with_retry_policy(mut self, max_attempts: u32, backoff_base: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_base = backoff_base;
        self
    }

    // -----------------------------------------------------------------------
    // Stateless dispatch (completion / tts)
    // -----------------------------------------------------------------------

    /// Dispatch a stateless request and classify the outcome.
    ///
    /// `Completion` requests go to the chat transport with no history;
    /// `Tts` requests go to the speech transport.  `Chat`-kind requests
    /// belong in [`dispatch_chat`](Self::dispatch_chat) — passed here they
    /// are sent without consulting or updating any session.
    pub async fn dispatch(&self, request: &BoundRequest) -> Result<Reply, DispatchError> {
        match request.kind {
            RequestKind::Tts => {
                let audio = self
                    .with_retry(&request.template_id, || {
                        self.speech
                            .synthesize(&request.user_message, &request.options.voice)
                    })
                    .await?;
                Ok(Reply::Audio(audio))
            }
            RequestKind::Chat | RequestKind::Completion => {
                let messages = build_messages(request, &[]);
                let text = self
                    .with_retry(&request.template_id, || {
                        self.chat.complete(&messages, &request.options)
                    })
                    .await?;
                Ok(Reply::Text(text))
            }
        }
    }

    /// Synthesize speech directly (the artifact store's cache-miss path).
    pub async fn synthesize_speech(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<Vec<u8>, DispatchError> {
        self.with_retry("tts", || self.speech.synthesize(text, voice_id))
            .await
    }

    // -----------------------------------------------------------------------
    // Session-aware dispatch (chat)
    // -----------------------------------------------------------------------

    /// Dispatch a chat request against one session's memory.
    ///
    /// The retained turns are prepended oldest-first; on success the user
    /// turn and the assistant reply are appended back.  If the session was
    /// closed while the call was in flight, the reply is dropped — it is
    /// never applied to any other session.
    pub async fn dispatch_chat(
        &self,
        request: &BoundRequest,
        sessions: &SessionStore,
        id: SessionId,
    ) -> Result<String, ChatError> {
        let history = sessions.snapshot(id)?;
        let messages = build_messages(request, &history);

        let reply = self
            .with_retry(&request.template_id, || {
                self.chat.complete(&messages, &request.options)
            })
            .await?;

        // Append both turns only after success; a failed dispatch leaves
        // the session untouched.  A close that raced the call surfaces as
        // UnknownSession here and the reply is discarded.
        sessions.append(id, MessageTurn::user(request.user_message.clone()))?;
        sessions.append(id, MessageTurn::assistant(reply.clone()))?;

        Ok(reply)
    }

    // -----------------------------------------------------------------------
    // Retry loop
    // -----------------------------------------------------------------------

    /// Run `op` up to `max_attempts` times, sleeping between transient
    /// failures.  Non-transient errors propagate immediately.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = match &e {
                        DispatchError::RateLimited {
                            retry_after: Some(wait),
                        } => *wait,
                        _ => self.backoff_base * 2u32.pow(attempt - 1),
                    };
                    log::warn!(
                        "dispatch '{what}': attempt {attempt} failed ({e}), retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::warn!("dispatch '{what}': failed after {attempt} attempt(s): {e}");
                    return Err(e);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Message assembly
// ---------------------------------------------------------------------------

/// Assemble the outgoing message list: system message, few-shot examples,
/// retained history (oldest first), then the new user message.
fn build_messages(request: &BoundRequest, history: &[MessageTurn]) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(2 + request.examples.len() * 2 + history.len());

    if !request.system_message.is_empty() {
        messages.push(WireMessage::system(request.system_message.clone()));
    }
    for example in &request.examples {
        messages.push(WireMessage::user(example.user.clone()));
        messages.push(WireMessage::assistant(example.assistant.clone()));
    }
    for turn in history {
        messages.push(match turn.role {
            crate::session::TurnRole::User => WireMessage::user(turn.text.clone()),
            crate::session::TurnRole::Assistant => WireMessage::assistant(turn.text.clone()),
        });
    }
    messages.push(WireMessage::user(request.user_message.clone()));

    messages
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
