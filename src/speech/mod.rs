pub mod cache;
pub mod error;
pub mod player;
pub mod synth;
pub mod voice;

pub use cache::{cache_key, SpeakCallbacks, SpeechCache, SpeechHandle};
pub use error::SpeechError;
pub use player::{AudioPlayer, Clip, ProcessPlayer};
pub use synth::{OpenAiSynthesizer, SpeechSynthesizer};
pub use voice::{voice_for_tag, VoiceCode, DEFAULT_VOICE};
