use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::SpeechError;
use super::player::{AudioPlayer, Clip};
use super::synth::SpeechSynthesizer;
use super::voice::VoiceCode;
use crate::script::Language;

/// Cache key: voice code and literal text. No normalization.
pub fn cache_key(voice_code: &str, text: &str) -> String {
    format!("{}:{}", voice_code, text)
}

type StartFn = Box<dyn FnOnce() + Send>;
type EndFn = Box<dyn FnOnce() + Send>;
type ErrorFn = Box<dyn FnOnce(SpeechError) + Send>;

/// Lifecycle hooks for one `speak` request.
/// Exactly one of `on_end` / `on_error` fires, unless the request is superseded.
#[derive(Default)]
pub struct SpeakCallbacks {
    on_start: Option<StartFn>,
    on_end: Option<EndFn>,
    on_error: Option<ErrorFn>,
}

impl SpeakCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    pub fn on_end(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_end = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(SpeechError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

/// Handle to an in-flight `speak` request.
pub struct SpeechHandle {
    pub id: Uuid,
    task: JoinHandle<()>,
}

impl SpeechHandle {
    /// Waits until the request ended, failed, or was superseded.
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            warn!("Speech task {} did not complete cleanly: {}", self.id, e);
        }
    }
}

struct ActivePlayback {
    id: Uuid,
    token: CancellationToken,
}

#[derive(Default)]
struct CacheState {
    clips: HashMap<String, Clip>,
    // One synthesis at a time per key
    gates: HashMap<String, Arc<AsyncMutex<()>>>,
    // Bumped by clear_cache
    generation: u64,
    current: Option<ActivePlayback>,
}

struct Inner {
    synth: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    state: Mutex<CacheState>,
}

/// Deduplicating speech cache with at most one active playback.
///
/// Construct one per process and clone the handle to share it; clones
/// see the same clips and the same active-request slot.
#[derive(Clone)]
pub struct SpeechCache {
    inner: Arc<Inner>,
}

impl SpeechCache {
    pub fn new(synth: Arc<dyn SpeechSynthesizer>, player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                synth,
                player,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stops whatever is playing, then synthesizes (or reuses) and plays `text`.
    /// Must be called from within a tokio runtime.
    pub fn speak(&self, text: impl Into<String>, language: Language, callbacks: SpeakCallbacks) -> SpeechHandle {
        let text = text.into();
        let id = Uuid::new_v4();
        let token = CancellationToken::new();

        {
            let mut state = self.lock();
            if let Some(previous) = state.current.take() {
                debug!("Speech {} superseded by {}", previous.id, id);
                previous.token.cancel();
            }
            state.current = Some(ActivePlayback {
                id,
                token: token.clone(),
            });
        }

        let this = self.clone();
        let SpeakCallbacks {
            on_start,
            on_end,
            on_error,
        } = callbacks;

        let task = tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    debug!("Speech {} canceled before completion", id);
                    return;
                }
                result = this.run(&text, language, &token, on_start) => result,
            };

            if !this.finish(id, &token) {
                return;
            }

            match result {
                Ok(()) => {
                    if let Some(f) = on_end {
                        f();
                    }
                }
                Err(e) => {
                    warn!("Speech {} failed: {}", id, e);
                    if let Some(f) = on_error {
                        f(e);
                    }
                }
            }
        });

        SpeechHandle { id, task }
    }

    async fn run(
        &self,
        text: &str,
        language: Language,
        token: &CancellationToken,
        on_start: Option<StartFn>,
    ) -> Result<(), SpeechError> {
        let voice_code = language.voice_code();
        let key = cache_key(voice_code.as_str(), text);

        let clip = self.fetch(key, text, voice_code).await?;

        if token.is_cancelled() {
            return Ok(());
        }
        if let Some(f) = on_start {
            f();
        }

        self.inner.player.play(&clip).await
    }

    /// Returns the cached clip for `key`, synthesizing it on a miss.
    ///
    /// Synthesis runs in its own task holding the key's gate, so it completes
    /// and lands in the cache even when the requesting `speak` is superseded.
    /// Concurrent requests for the same key wait on the gate and reuse the clip.
    async fn fetch(&self, key: String, text: &str, voice_code: VoiceCode) -> Result<Clip, SpeechError> {
        let gate = self.lock().gates.entry(key.clone()).or_default().clone();
        let permit = gate.lock_owned().await;

        let (cached, generation) = {
            let state = self.lock();
            (state.clips.get(&key).cloned(), state.generation)
        };
        if let Some(clip) = cached {
            debug!("Speech cache hit ({} bytes)", clip.len());
            return Ok(clip);
        }

        debug!("Speech cache miss, synthesizing with voice code {}", voice_code);
        let this = self.clone();
        let text = text.to_string();
        let job = tokio::spawn(async move {
            let _permit = permit;
            let bytes = this.inner.synth.synthesize(&text, voice_code.as_str()).await?;
            let clip = this.inner.player.decode(bytes)?;
            let mut state = this.lock();
            // A clear during synthesis wins over the late result.
            if state.generation == generation {
                state.clips.insert(key, clip.clone());
            }
            Ok::<Clip, SpeechError>(clip)
        });

        job.await.map_err(|e| SpeechError::Task(e.to_string()))?
    }

    /// Releases the active slot if `id` still owns it. Returns false when the
    /// request was superseded and its callbacks must stay silent.
    fn finish(&self, id: Uuid, token: &CancellationToken) -> bool {
        let mut state = self.lock();
        if token.is_cancelled() {
            return false;
        }
        if state.current.as_ref().map(|c| c.id) == Some(id) {
            state.current = None;
        }
        true
    }

    /// Halts the active playback, if any. The next `speak` of the same clip
    /// starts from the beginning.
    pub fn stop(&self) {
        if let Some(current) = self.lock().current.take() {
            debug!("Stopping speech {}", current.id);
            current.token.cancel();
        }
    }

    /// Drops every cached clip; later requests synthesize again.
    pub fn clear_cache(&self) {
        let mut state = self.lock();
        let released = state.clips.len();
        state.clips.clear();
        state.gates.clear();
        state.generation += 1;
        info!("Speech cache cleared ({} clips released)", released);
    }

    /// True while a request is in flight, from synthesis through playback.
    pub fn is_active(&self) -> bool {
        self.lock().current.is_some()
    }

    pub fn cached_clips(&self) -> usize {
        self.lock().clips.len()
    }

    pub fn is_cached(&self, language: Language, text: &str) -> bool {
        self.lock()
            .clips
            .contains_key(&cache_key(language.voice_code().as_str(), text))
    }
}
