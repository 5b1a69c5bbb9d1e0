/// Failures surfaced through a `speak` error callback.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("text is required")]
    EmptyText,
    #[error("failed to generate speech (provider status {status})")]
    Provider { status: u16 },
    #[error("failed to reach speech provider: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("audio could not be decoded: {0}")]
    Decode(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
    #[error("speech task failed: {0}")]
    Task(String),
}

impl SpeechError {
    /// HTTP-style class of the failure: 400 for caller mistakes, 500 otherwise.
    pub fn status_class(&self) -> u16 {
        match self {
            SpeechError::EmptyText => 400,
            _ => 500,
        }
    }
}
