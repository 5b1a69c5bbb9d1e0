//! Runtime configuration, loaded from the environment (and `.env` when present).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::script::SceneIndex;

pub const DEFAULT_ADVANCE_DELAY_MS: u64 = 1000;
pub const DEFAULT_TERMINAL_SCENE: SceneIndex = 6;
pub const DEFAULT_TTS_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TTS_MODEL: &str = "tts-1";
pub const DEFAULT_TTS_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_PLAYER: &str = "mpg123 -q -";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Whether a tutor's transcript survives a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscriptPolicy {
    /// Only happiness and scene persist; each selection starts a fresh transcript.
    #[default]
    Ephemeral,
    /// The transcript is stored per tutor and restored on selection.
    Persisted,
}

/// Knobs consumed by the session store.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub advance_delay: Duration,
    pub terminal_scene: SceneIndex,
    pub transcript: TranscriptPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            advance_delay: Duration::from_millis(DEFAULT_ADVANCE_DELAY_MS),
            terminal_scene: DEFAULT_TERMINAL_SCENE,
            transcript: TranscriptPolicy::Ephemeral,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub player: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub script_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub session: SessionConfig,
    pub speech: SpeechConfig,
}

impl Config {
    /// Reads:
    /// `OPENAI_API_KEY`, `TTS_BASE_URL`, `TTS_MODEL`, `TTS_TIMEOUT_MS`,
    /// `LINGUA_SCRIPT`, `LINGUA_DATA_DIR`, `LINGUA_ADVANCE_DELAY_MS`,
    /// `LINGUA_TERMINAL_SCENE`, `LINGUA_PERSIST_TRANSCRIPT`, `LINGUA_PLAYER`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let advance_delay_ms = parse_or(&lookup, "LINGUA_ADVANCE_DELAY_MS", DEFAULT_ADVANCE_DELAY_MS)?;
        let terminal_scene = parse_or(&lookup, "LINGUA_TERMINAL_SCENE", DEFAULT_TERMINAL_SCENE)?;
        if terminal_scene == 0 {
            return Err(ConfigError::Invalid {
                var: "LINGUA_TERMINAL_SCENE",
                value: "0".to_string(),
            });
        }
        let persist = parse_or(&lookup, "LINGUA_PERSIST_TRANSCRIPT", false)?;
        let timeout_ms = parse_or(&lookup, "TTS_TIMEOUT_MS", DEFAULT_TTS_TIMEOUT_MS)?;

        Ok(Self {
            script_path: lookup("LINGUA_SCRIPT").map(PathBuf::from),
            data_dir: lookup("LINGUA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".lingua")),
            session: SessionConfig {
                advance_delay: Duration::from_millis(advance_delay_ms),
                terminal_scene,
                transcript: if persist {
                    TranscriptPolicy::Persisted
                } else {
                    TranscriptPolicy::Ephemeral
                },
            },
            speech: SpeechConfig {
                api_key: lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()),
                base_url: lookup("TTS_BASE_URL").unwrap_or_else(|| DEFAULT_TTS_BASE_URL.to_string()),
                model: lookup("TTS_MODEL").unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
                timeout: Duration::from_millis(timeout_ms),
                player: lookup("LINGUA_PLAYER").unwrap_or_else(|| DEFAULT_PLAYER.to_string()),
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
