//! Classified outcomes for dispatched AI calls.
//!
//! Every network result collapses into either a [`Reply`] or a
//! [`DispatchError`] variant.  Transience is encoded per variant so the
//! retry loop never has to inspect provider-specific detail.

use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// Successful payload from a dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Assistant text from a chat/completion call.
    Text(String),
    /// Raw audio bytes from a TTS call.
    Audio(Vec<u8>),
}

impl Reply {
    /// The text payload, if this reply carries one.
    pub fn into_text(self) -> Option<String> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Audio(_) => None,
        }
    }

    /// The audio payload, if this reply carries one.
    pub fn into_audio(self) -> Option<Vec<u8>> {
        match self {
            Reply::Audio(bytes) => Some(bytes),
            Reply::Text(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchError
// ---------------------------------------------------------------------------

/// Classified failure of a dispatched call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// Provider throttled the call; retried with backoff.
    #[error("rate limited by provider")]
    RateLimited {
        /// Provider-suggested wait, from the `Retry-After` header.
        retry_after: Option<Duration>,
    },

    /// Credentials rejected.  Never retried.
    #[error("authentication rejected by provider")]
    Auth,

    /// Transport failure or timeout.  Retried with backoff.
    #[error("network error: {0}")]
    Network(String),

    /// Provider-reported error.  Retried only when the provider signals a
    /// transient condition (5xx).
    #[error("provider error {code}: {detail}")]
    Provider {
        code: u16,
        detail: String,
        transient: bool,
    },

    /// A well-formed response with no usable content.
    #[error("provider returned an empty or unusable reply")]
    EmptyReply,
}

impl DispatchError {
    /// Whether the retry loop may try again.
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::RateLimited { .. } | DispatchError::Network(_) => true,
            DispatchError::Provider { transient, .. } => *transient,
            DispatchError::Auth | DispatchError::EmptyReply => false,
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DispatchError::Network("request timed out".into())
        } else {
            DispatchError::Network(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(DispatchError::RateLimited { retry_after: None }.is_transient());
        assert!(DispatchError::Network("reset".into()).is_transient());
        assert!(DispatchError::Provider {
            code: 503,
            detail: "overloaded".into(),
            transient: true
        }
        .is_transient());

        assert!(!DispatchError::Auth.is_transient());
        assert!(!DispatchError::EmptyReply.is_transient());
        assert!(!DispatchError::Provider {
            code: 400,
            detail: "bad request".into(),
            transient: false
        }
        .is_transient());
    }

    #[test]
    fn reply_accessors() {
        assert_eq!(Reply::Text("hei".into()).into_text(), Some("hei".into()));
        assert_eq!(Reply::Text("hei".into()).into_audio(), None);
        assert_eq!(Reply::Audio(vec![1, 2]).into_audio(), Some(vec![1, 2]));
    }
}
