//! Content-addressed audio artifacts.
//!
//! An artifact is keyed by the SHA-256 of the voice id plus the prepared
//! speech text, so the same field spoken twice reuses the cached file and
//! costs at most one synthesis call.  Files live flat in the configured
//! audio directory as `<hash>.mp3`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::dispatch::{DispatchError, Dispatcher};

use super::prepare::prepare_speech_text;

// ---------------------------------------------------------------------------
// AudioArtifact
// ---------------------------------------------------------------------------

/// A synthesized audio file on disk.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    /// Hex SHA-256 over voice id and prepared text.
    pub hash: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl AudioArtifact {
    /// The `[sound:...]` tag to paste into the card's audio field.
    pub fn attachment_tag(&self) -> String {
        let file = self
            .path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.mp3", self.hash));
        format!("[sound:{file}]")
    }
}

// ---------------------------------------------------------------------------
// SynthesisError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The TTS call failed after the retry policy was exhausted.
    #[error(transparent)]
    Synthesis(#[from] DispatchError),

    #[error("audio write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The field had no speakable content after cleanup.
    #[error("nothing to speak after text preparation")]
    EmptyText,
}

// ---------------------------------------------------------------------------
// ArtifactStore
// ---------------------------------------------------------------------------

/// Synthesizes speech and caches the resulting files by content hash.
pub struct ArtifactStore {
    dir: PathBuf,
    dispatcher: Arc<Dispatcher>,
    /// In-memory view of known artifacts; rebuilt lazily from disk hits.
    index: Mutex<HashMap<String, AudioArtifact>>,
}

impl ArtifactStore {
    pub fn new(dir: PathBuf, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dir,
            dispatcher,
            index: Mutex::new(HashMap::new()),
        }
    }

    /// Synthesize `field` with `voice_id`, reusing any cached artifact.
    ///
    /// The hash is computed over the prepared text, so formatting-only
    /// differences (HTML breaks, extra whitespace) hit the cache.
    pub async fn synthesize(
        &self,
        field: &str,
        voice_id: &str,
    ) -> Result<AudioArtifact, SynthesisError> {
        let prepared = prepare_speech_text(field);
        if prepared.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let hash = content_hash(voice_id, &prepared);
        let path = self.dir.join(format!("{hash}.mp3"));

        if let Some(artifact) = self.lookup(&hash) {
            log::debug!("audio cache hit for {hash}");
            return Ok(artifact);
        }
        if tokio::fs::metadata(&path).await.is_ok() {
            log::debug!("audio file already on disk for {hash}");
            return Ok(self.record(hash, path));
        }

        let bytes = self.dispatcher.synthesize_speech(&prepared, voice_id).await?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, &bytes).await?;
        log::info!("synthesized {} bytes into {}", bytes.len(), path.display());

        Ok(self.record(hash, path))
    }

    fn lookup(&self, hash: &str) -> Option<AudioArtifact> {
        self.lock().get(hash).cloned()
    }

    fn record(&self, hash: String, path: PathBuf) -> AudioArtifact {
        let artifact = AudioArtifact {
            hash: hash.clone(),
            path,
            created_at: Utc::now(),
        };
        self.lock().insert(hash, artifact.clone());
        artifact
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, AudioArtifact>> {
        self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Hex SHA-256 over the voice id and the prepared text.
fn content_hash(voice_id: &str, prepared: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(voice_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(prepared.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::dispatch::{ChatTransport, SpeechTransport, WireMessage};
    use crate::template::CallOptions;

    struct NoChat;

    #[async_trait]
    impl ChatTransport for NoChat {
        async fn complete(
            &self,
            _: &[WireMessage],
            _: &CallOptions,
        ) -> Result<String, DispatchError> {
            Err(DispatchError::EmptyReply)
        }
    }

    /// Returns fixed bytes and counts synthesis calls.
    struct CountingSpeech {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechTransport for CountingSpeech {
        async fn synthesize(&self, _: &str, _: &str) -> Result<Vec<u8>, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0xFF, 0xF3, 0x01])
        }
    }

    struct FailingSpeech;

    #[async_trait]
    impl SpeechTransport for FailingSpeech {
        async fn synthesize(&self, _: &str, _: &str) -> Result<Vec<u8>, DispatchError> {
            Err(DispatchError::Auth)
        }
    }

    fn store_with(
        dir: &std::path::Path,
        speech: Arc<dyn SpeechTransport>,
    ) -> ArtifactStore {
        let dispatcher = Dispatcher::new(Arc::new(NoChat), speech)
            .with_retry_policy(1, Duration::from_millis(1));
        ArtifactStore::new(dir.to_path_buf(), Arc::new(dispatcher))
    }

    #[tokio::test]
    async fn artifact_is_written_under_its_hash() {
        let dir = tempfile::tempdir().unwrap();
        let speech = Arc::new(CountingSpeech {
            calls: AtomicUsize::new(0),
        });
        let store = store_with(dir.path(), speech);

        let artifact = store.synthesize("Jeg husker deg.", "emma").await.unwrap();

        assert_eq!(artifact.path, dir.path().join(format!("{}.mp3", artifact.hash)));
        assert_eq!(std::fs::read(&artifact.path).unwrap(), vec![0xFF, 0xF3, 0x01]);
        assert_eq!(
            artifact.attachment_tag(),
            format!("[sound:{}.mp3]", artifact.hash)
        );
    }

    #[tokio::test]
    async fn repeat_synthesis_hits_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let speech = Arc::new(CountingSpeech {
            calls: AtomicUsize::new(0),
        });
        let store = store_with(dir.path(), speech.clone());

        let first = store.synthesize("Jeg husker deg.", "emma").await.unwrap();
        let second = store.synthesize("Jeg husker deg.", "emma").await.unwrap();

        assert_eq!(first.hash, second.hash);
        assert_eq!(first.path, second.path);
        assert_eq!(speech.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn formatting_variants_share_one_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let speech = Arc::new(CountingSpeech {
            calls: AtomicUsize::new(0),
        });
        let store = store_with(dir.path(), speech.clone());

        let a = store.synthesize("en huske  <  husken", "emma").await.unwrap();
        let b = store.synthesize("en huske<husken", "emma").await.unwrap();

        assert_eq!(a.hash, b.hash);
        assert_eq!(speech.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_voices_get_different_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let speech = Arc::new(CountingSpeech {
            calls: AtomicUsize::new(0),
        });
        let store = store_with(dir.path(), speech.clone());

        let a = store.synthesize("Jeg husker deg.", "emma").await.unwrap();
        let b = store.synthesize("Jeg husker deg.", "oskar").await.unwrap();

        assert_ne!(a.hash, b.hash);
        assert_eq!(speech.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn existing_file_on_disk_counts_as_cached() {
        let dir = tempfile::tempdir().unwrap();
        let speech = Arc::new(CountingSpeech {
            calls: AtomicUsize::new(0),
        });

        // First store writes the file; a fresh store (empty index) finds it.
        let first = store_with(dir.path(), speech.clone());
        let a = first.synthesize("Jeg husker deg.", "emma").await.unwrap();

        let second = store_with(dir.path(), speech.clone());
        let b = second.synthesize("Jeg husker deg.", "emma").await.unwrap();

        assert_eq!(a.hash, b.hash);
        assert_eq!(speech.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unspeakable_field_is_rejected_without_a_call() {
        let dir = tempfile::tempdir().unwrap();
        let speech = Arc::new(CountingSpeech {
            calls: AtomicUsize::new(0),
        });
        let store = store_with(dir.path(), speech.clone());

        let err = store.synthesize("  <br> ", "emma").await.unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyText));
        assert_eq!(speech.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_synthesis_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), Arc::new(FailingSpeech));

        let err = store.synthesize("Jeg husker deg.", "emma").await.unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::Synthesis(DispatchError::Auth)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
