//! Request dispatch: transports, outcome classification and retries.
//!
//! This module provides:
//! * [`ChatTransport`] / [`SpeechTransport`] — async seams over the LLM and
//!   TTS HTTP endpoints, with production `reqwest` implementations.
//! * [`Dispatcher`] — sends a [`BoundRequest`](crate::template::BoundRequest),
//!   applies the bounded retry policy, and updates session memory for
//!   chat-kind requests.
//! * [`Reply`] / [`DispatchError`] — classified outcomes.

pub mod dispatcher;
pub mod outcome;
pub mod transport;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use dispatcher::{ChatError, Dispatcher};
pub use outcome::{DispatchError, Reply};
pub use transport::{
    ChatTransport, ElevenLabsSpeechTransport, OpenAiChatTransport, SpeechTransport, WireMessage,
};
