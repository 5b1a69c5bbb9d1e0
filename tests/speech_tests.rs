use async_trait::async_trait;
use lingua_scenes::script::Language;
use lingua_scenes::speech::{
    cache_key, voice_for_tag, AudioPlayer, Clip, OpenAiSynthesizer, SpeakCallbacks, SpeechCache, SpeechError,
    SpeechSynthesizer, VoiceCode, DEFAULT_VOICE,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counts calls and returns `voice|text` as the "audio".
struct MockSynth {
    calls: AtomicUsize,
    latency: Duration,
    fail: AtomicBool,
}

impl MockSynth {
    fn new() -> Arc<Self> {
        Self::with_latency(Duration::ZERO)
    }

    fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            latency,
            fail: AtomicBool::new(false),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynth {
    async fn synthesize(&self, text: &str, voice_code: &str) -> Result<Vec<u8>, SpeechError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SpeechError::Provider { status: 503 });
        }
        Ok(format!("{}|{}", voice_code, text).into_bytes())
    }
}

struct MockPlayer {
    plays: AtomicUsize,
    duration: Duration,
    fail: bool,
}

impl MockPlayer {
    fn new() -> Arc<Self> {
        Self::lasting(Duration::from_millis(10))
    }

    fn lasting(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            plays: AtomicUsize::new(0),
            duration,
            fail: false,
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            plays: AtomicUsize::new(0),
            duration: Duration::ZERO,
            fail: true,
        })
    }

    fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioPlayer for MockPlayer {
    async fn play(&self, _clip: &Clip) -> Result<(), SpeechError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.duration).await;
        if self.fail {
            return Err(SpeechError::Playback("device unavailable".to_string()));
        }
        Ok(())
    }
}

type Log = Arc<Mutex<Vec<String>>>;

fn recording(log: &Log, label: &str) -> SpeakCallbacks {
    let (start, end, error) = (log.clone(), log.clone(), log.clone());
    let (s, e, f) = (label.to_string(), label.to_string(), label.to_string());
    SpeakCallbacks::new()
        .on_start(move || start.lock().unwrap().push(format!("{}:start", s)))
        .on_end(move || end.lock().unwrap().push(format!("{}:end", e)))
        .on_error(move |err| error.lock().unwrap().push(format!("{}:error:{}", f, err.status_class())))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[test]
fn test_voice_table() {
    assert_eq!(voice_for_tag("zh"), "alloy");
    assert_eq!(voice_for_tag("ja"), "nova");
    assert_eq!(voice_for_tag("ko"), "shimmer");
    assert_eq!(voice_for_tag("es"), "onyx");
    assert_eq!(voice_for_tag("fr"), DEFAULT_VOICE);
    assert_eq!(voice_for_tag(""), "alloy");

    assert_eq!(Language::Korean.voice_code(), VoiceCode::Ko);
    assert_eq!(Language::Spanish.voice_code().as_str(), "es");
}

#[test]
fn test_cache_key_is_literal() {
    assert_eq!(cache_key("zh", "你好"), "zh:你好");
    assert_ne!(cache_key("zh", "hola"), cache_key("es", "hola"));
    assert_ne!(cache_key("es", "hola"), cache_key("es", "Hola"));
    assert_ne!(cache_key("es", "hola"), cache_key("es", "hola "));
}

#[test]
fn test_error_status_class() {
    assert_eq!(SpeechError::EmptyText.status_class(), 400);
    assert_eq!(SpeechError::Provider { status: 401 }.status_class(), 500);
    assert_eq!(SpeechError::Decode("bad".into()).status_class(), 500);
    assert_eq!(SpeechError::Playback("gone".into()).status_class(), 500);
    assert_eq!(SpeechError::Task("panicked".into()).status_class(), 500);
}

#[tokio::test]
async fn test_empty_text_is_rejected_before_any_request() {
    // Nothing listens on this port; the call must not get that far.
    let synth = OpenAiSynthesizer::new("key", "http://127.0.0.1:9", "tts-1", Duration::from_millis(100));
    let err = synth.synthesize("", "zh").await.unwrap_err();

    assert!(matches!(err, SpeechError::EmptyText));
    assert_eq!(err.status_class(), 400);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_request_synthesizes_once() {
    let synth = MockSynth::new();
    let player = MockPlayer::new();
    let cache = SpeechCache::new(synth.clone(), player.clone());
    let log = Log::default();

    cache.speak("你好", Language::Chinese, recording(&log, "a")).finished().await;
    cache.speak("你好", Language::Chinese, recording(&log, "b")).finished().await;

    assert_eq!(synth.calls(), 1);
    assert_eq!(player.plays(), 2);
    assert_eq!(cache.cached_clips(), 1);
    assert!(cache.is_cached(Language::Chinese, "你好"));
    assert_eq!(entries(&log), vec!["a:start", "a:end", "b:start", "b:end"]);
    assert!(!cache.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_same_text_other_language_is_separate_clip() {
    let synth = MockSynth::new();
    let cache = SpeechCache::new(synth.clone(), MockPlayer::new());

    cache.speak("hola", Language::Spanish, SpeakCallbacks::new()).finished().await;
    cache.speak("hola", Language::Japanese, SpeakCallbacks::new()).finished().await;
    cache.speak("Hola", Language::Spanish, SpeakCallbacks::new()).finished().await;

    assert_eq!(synth.calls(), 3);
    assert_eq!(cache.cached_clips(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_new_request_supersedes_pending_synthesis() {
    let synth = MockSynth::with_latency(Duration::from_secs(2));
    let cache = SpeechCache::new(synth.clone(), MockPlayer::new());
    let log = Log::default();

    let first = cache.speak("first", Language::Spanish, recording(&log, "first"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = cache.speak("second", Language::Spanish, recording(&log, "second"));
    first.finished().await;
    second.finished().await;

    assert_eq!(entries(&log), vec!["second:start", "second:end"]);
    assert!(cache.is_cached(Language::Spanish, "second"));

    // The superseded synthesis still completed and is reused later
    assert!(cache.is_cached(Language::Spanish, "first"));
    cache.speak("first", Language::Spanish, SpeakCallbacks::new()).finished().await;
    assert_eq!(synth.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_request_during_synthesis_shares_result() {
    let synth = MockSynth::with_latency(Duration::from_millis(800));
    let player = MockPlayer::new();
    let cache = SpeechCache::new(synth.clone(), player.clone());
    let log = Log::default();

    let first = cache.speak("你好", Language::Chinese, recording(&log, "a"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = cache.speak("你好", Language::Chinese, recording(&log, "b"));
    first.finished().await;
    second.finished().await;

    assert_eq!(synth.calls(), 1);
    assert_eq!(player.plays(), 1);
    assert_eq!(entries(&log), vec!["b:start", "b:end"]);
    assert_eq!(cache.cached_clips(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_is_active_while_synthesizing() {
    let cache = SpeechCache::new(MockSynth::with_latency(Duration::from_secs(1)), MockPlayer::new());
    let log = Log::default();

    let handle = cache.speak("hola", Language::Spanish, recording(&log, "a"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(cache.is_active());
    assert!(entries(&log).is_empty(), "Nothing is audible before synthesis completes");

    handle.finished().await;
    assert!(!cache.is_active());
    assert_eq!(entries(&log), vec!["a:start", "a:end"]);
}

#[tokio::test(start_paused = true)]
async fn test_clear_cache_during_synthesis_discards_late_clip() {
    let synth = MockSynth::with_latency(Duration::from_secs(1));
    let cache = SpeechCache::new(synth.clone(), MockPlayer::new());
    let log = Log::default();

    let handle = cache.speak("안녕", Language::Korean, recording(&log, "a"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    cache.clear_cache();
    handle.finished().await;

    assert_eq!(entries(&log), vec!["a:start", "a:end"]);
    assert!(!cache.is_cached(Language::Korean, "안녕"));

    cache.speak("안녕", Language::Korean, SpeakCallbacks::new()).finished().await;
    assert_eq!(synth.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_new_request_stops_active_playback() {
    let player = MockPlayer::lasting(Duration::from_secs(30));
    let cache = SpeechCache::new(MockSynth::new(), player.clone());
    let log = Log::default();

    let first = cache.speak("long line", Language::Korean, recording(&log, "first"));
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(cache.is_active());
    assert_eq!(entries(&log), vec!["first:start"]);

    let second = cache.speak("short line", Language::Korean, recording(&log, "second"));
    first.finished().await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Only one clip is ever audible
    assert_eq!(entries(&log), vec!["first:start", "second:start"]);
    cache.stop();
    second.finished().await;

    assert_eq!(entries(&log), vec!["first:start", "second:start"]);
    assert!(!cache.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let cache = SpeechCache::new(MockSynth::new(), MockPlayer::lasting(Duration::from_secs(10)));
    let log = Log::default();

    cache.stop();
    let handle = cache.speak("hello", Language::Japanese, recording(&log, "a"));
    tokio::time::sleep(Duration::from_millis(1)).await;
    cache.stop();
    cache.stop();
    handle.finished().await;

    assert_eq!(entries(&log), vec!["a:start"]);
    assert!(!cache.is_active());
    // The clip stays cached after a stop
    assert!(cache.is_cached(Language::Japanese, "hello"));
}

#[tokio::test(start_paused = true)]
async fn test_synthesis_failure_reports_error_once() {
    let synth = MockSynth::new();
    synth.fail.store(true, Ordering::SeqCst);
    let player = MockPlayer::new();
    let cache = SpeechCache::new(synth.clone(), player.clone());
    let log = Log::default();

    cache.speak("你好", Language::Chinese, recording(&log, "a")).finished().await;

    assert_eq!(entries(&log), vec!["a:error:500"]);
    assert_eq!(player.plays(), 0);
    assert_eq!(cache.cached_clips(), 0);

    // A later request retries the provider
    synth.fail.store(false, Ordering::SeqCst);
    cache.speak("你好", Language::Chinese, recording(&log, "b")).finished().await;
    assert_eq!(synth.calls(), 2);
    assert_eq!(entries(&log), vec!["a:error:500", "b:start", "b:end"]);
}

#[tokio::test(start_paused = true)]
async fn test_playback_failure_keeps_clip() {
    let synth = MockSynth::new();
    let cache = SpeechCache::new(synth.clone(), MockPlayer::broken());
    let log = Log::default();

    cache.speak("hola", Language::Spanish, recording(&log, "a")).finished().await;

    assert_eq!(entries(&log), vec!["a:start", "a:error:500"]);
    assert!(cache.is_cached(Language::Spanish, "hola"));
    assert!(!cache.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_empty_audio_is_a_decode_error() {
    struct SilentSynth;

    #[async_trait]
    impl SpeechSynthesizer for SilentSynth {
        async fn synthesize(&self, _text: &str, _voice_code: &str) -> Result<Vec<u8>, SpeechError> {
            Ok(Vec::new())
        }
    }

    let cache = SpeechCache::new(Arc::new(SilentSynth), MockPlayer::new());
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();

    cache
        .speak(
            "annyeong",
            Language::Korean,
            SpeakCallbacks::new().on_error(move |e| sink.lock().unwrap().push(e)),
        )
        .finished()
        .await;

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], SpeechError::Decode(_)));
    assert_eq!(cache.cached_clips(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_clear_cache_forces_new_synthesis() {
    let synth = MockSynth::new();
    let cache = SpeechCache::new(synth.clone(), MockPlayer::new());

    cache.speak("こんにちは", Language::Japanese, SpeakCallbacks::new()).finished().await;
    cache.clear_cache();
    assert_eq!(cache.cached_clips(), 0);

    cache.speak("こんにちは", Language::Japanese, SpeakCallbacks::new()).finished().await;
    assert_eq!(synth.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_clones_share_cache_and_playback_slot() {
    let synth = MockSynth::new();
    let cache = SpeechCache::new(synth.clone(), MockPlayer::lasting(Duration::from_secs(10)));
    let other = cache.clone();

    let handle = cache.speak("hola", Language::Spanish, SpeakCallbacks::new());
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(other.is_active());

    other.stop();
    handle.finished().await;
    assert!(!cache.is_active());
    assert!(other.is_cached(Language::Spanish, "hola"));
}
