use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::kv::{KeyValueStore, StorageError};
use crate::script::{SceneIndex, TutorId};
use crate::session::event::ChatMessage;

pub const DEFAULT_HAPPINESS: u8 = 50;
pub const MAX_HAPPINESS: u8 = 100;
pub const FIRST_SCENE: SceneIndex = 1;

pub const PROGRESS_PREFIX: &str = "chat_progress_";
pub const TRANSCRIPT_PREFIX: &str = "chat_transcript_";
const ALL_PREFIXES: [&str; 2] = [PROGRESS_PREFIX, TRANSCRIPT_PREFIX];

/// Persisted per-tutor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStats {
    /// Transcript length at the last write.
    #[serde(default)]
    pub messages: usize,
    pub happiness: u8,
    pub current_scene: SceneIndex,
}

impl Default for ChatStats {
    fn default() -> Self {
        Self {
            messages: 0,
            happiness: DEFAULT_HAPPINESS,
            current_scene: FIRST_SCENE,
        }
    }
}

impl ChatStats {
    fn is_valid(&self) -> bool {
        self.happiness <= MAX_HAPPINESS && self.current_scene >= FIRST_SCENE
    }
}

/// Durable per-tutor progress. Every operation is infallible for the caller:
/// unreadable data reads as defaults and failed writes are logged.
pub trait ProgressStore: Send + Sync {
    fn get_stats(&self, tutor: &TutorId) -> ChatStats;
    fn update_happiness(&self, tutor: &TutorId, happiness: u8);
    fn update_scene(&self, tutor: &TutorId, scene: SceneIndex);
    fn update_message_count(&self, tutor: &TutorId, count: usize);
    fn load_transcript(&self, tutor: &TutorId) -> Vec<ChatMessage>;
    fn save_transcript(&self, tutor: &TutorId, messages: &[ChatMessage]);
    fn reset_progress(&self, tutor: &TutorId);
    fn clear_all(&self);
}

/// [`ProgressStore`] over any [`KeyValueStore`], one JSON record per key.
#[derive(Debug, Clone)]
pub struct KvProgressStore<B> {
    backend: B,
}

impl<B: KeyValueStore> KvProgressStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn progress_key(tutor: &TutorId) -> String {
        format!("{}{}", PROGRESS_PREFIX, tutor)
    }

    fn transcript_key(tutor: &TutorId) -> String {
        format!("{}{}", TRANSCRIPT_PREFIX, tutor)
    }

    fn read_stats(&self, tutor: &TutorId) -> Result<Option<ChatStats>, StorageError> {
        let Some(raw) = self.backend.get(&Self::progress_key(tutor))? else {
            return Ok(None);
        };
        let stats: ChatStats =
            serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        if !stats.is_valid() {
            return Err(StorageError::Corrupt(format!("out of range record {:?}", stats)));
        }
        Ok(Some(stats))
    }

    // Read-merge-write so each field update keeps the others' latest values.
    fn merge(&self, tutor: &TutorId, apply: impl FnOnce(&mut ChatStats)) {
        let mut stats = self.get_stats(tutor);
        apply(&mut stats);
        let result = serde_json::to_string(&stats)
            .map_err(|e| StorageError::Corrupt(e.to_string()))
            .and_then(|json| self.backend.set(&Self::progress_key(tutor), &json));
        if let Err(e) = result {
            warn!("Failed to persist progress for {}: {}", tutor, e);
        }
    }
}

impl<B: KeyValueStore> ProgressStore for KvProgressStore<B> {
    fn get_stats(&self, tutor: &TutorId) -> ChatStats {
        match self.read_stats(tutor) {
            Ok(Some(stats)) => stats,
            Ok(None) => ChatStats::default(),
            Err(e) => {
                warn!("Progress for {} unreadable, using defaults: {}", tutor, e);
                ChatStats::default()
            }
        }
    }

    fn update_happiness(&self, tutor: &TutorId, happiness: u8) {
        self.merge(tutor, |stats| stats.happiness = happiness.min(MAX_HAPPINESS));
    }

    fn update_scene(&self, tutor: &TutorId, scene: SceneIndex) {
        self.merge(tutor, |stats| stats.current_scene = scene.max(FIRST_SCENE));
    }

    fn update_message_count(&self, tutor: &TutorId, count: usize) {
        self.merge(tutor, |stats| stats.messages = count);
    }

    fn load_transcript(&self, tutor: &TutorId) -> Vec<ChatMessage> {
        let raw = match self.backend.get(&Self::transcript_key(tutor)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Transcript for {} unavailable: {}", tutor, e);
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Transcript for {} unreadable, starting fresh: {}", tutor, e);
            Vec::new()
        })
    }

    fn save_transcript(&self, tutor: &TutorId, messages: &[ChatMessage]) {
        let result = serde_json::to_string(messages)
            .map_err(|e| StorageError::Corrupt(e.to_string()))
            .and_then(|json| self.backend.set(&Self::transcript_key(tutor), &json));
        if let Err(e) = result {
            warn!("Failed to persist transcript for {}: {}", tutor, e);
        }
    }

    fn reset_progress(&self, tutor: &TutorId) {
        for key in [Self::progress_key(tutor), Self::transcript_key(tutor)] {
            if let Err(e) = self.backend.remove(&key) {
                warn!("Failed to erase {}: {}", key, e);
            }
        }
        debug!("Erased progress for {}", tutor);
    }

    fn clear_all(&self) {
        let keys = match self.backend.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to list stored progress: {}", e);
                return;
            }
        };
        for key in keys
            .iter()
            .filter(|k| ALL_PREFIXES.iter().any(|prefix| k.starts_with(prefix)))
        {
            if let Err(e) = self.backend.remove(key) {
                warn!("Failed to erase {}: {}", key, e);
            }
        }
        debug!("Erased all stored progress");
    }
}
