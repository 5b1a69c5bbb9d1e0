use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::error::SpeechError;

/// Decoded audio resource owned by the speech cache.
/// Every playback starts from the beginning of the clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    bytes: Arc<[u8]>,
}

impl Clip {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    fn decode(&self, bytes: Vec<u8>) -> Result<Clip, SpeechError> {
        if bytes.is_empty() {
            return Err(SpeechError::Decode("empty audio payload".to_string()));
        }
        Ok(Clip::new(bytes))
    }

    /// Resolves when the clip finished playing. Dropping the future must halt playback.
    async fn play(&self, clip: &Clip) -> Result<(), SpeechError>;
}

/// Pipes the clip into an external player (`mpg123 -q -` by default).
/// The child is killed when the playback future is dropped.
#[derive(Debug, Clone)]
pub struct ProcessPlayer {
    program: String,
    args: Vec<String>,
}

impl ProcessPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits a command line on whitespace: program first, then args.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

impl Default for ProcessPlayer {
    fn default() -> Self {
        Self::new("mpg123", vec!["-q".to_string(), "-".to_string()])
    }
}

#[async_trait]
impl AudioPlayer for ProcessPlayer {
    async fn play(&self, clip: &Clip) -> Result<(), SpeechError> {
        debug!("Spawning '{}' for {} bytes", self.program, clip.len());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::Playback(format!("failed to spawn '{}': {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(clip.bytes())
                .await
                .map_err(|e| SpeechError::Playback(e.to_string()))?;
            // EOF tells the player the stream is complete.
            drop(stdin);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| SpeechError::Playback(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(SpeechError::Playback(format!("'{}' exited with {}", self.program, status)))
        }
    }
}
