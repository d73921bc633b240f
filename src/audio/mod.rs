//! Audio artifacts for card fields.
//!
//! * [`prepare_speech_text`] — field HTML to speakable text.
//! * [`ArtifactStore`] — content-addressed synthesis cache.

pub mod prepare;
pub mod store;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use prepare::prepare_speech_text;
pub use store::{ArtifactStore, AudioArtifact, SynthesisError};
