use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::script::{MessageContent, SceneIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Transcript order is insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
        }
    }
}

/// Deferred work delivered back to the store through its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transition window elapsed for the advance scheduled in `epoch`.
    AdvanceDue { epoch: u64, to: SceneIndex },
}

/// Why `select_option` declined to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoTutor,
    Transitioning,
    Complete,
    UnknownOption,
}

/// Result of an option selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionOutcome {
    /// Messages recorded; the scene moves to `to` once the transition window ends.
    Advancing { to: SceneIndex },
    /// Messages recorded at the terminal scene; the dialogue is over.
    Completed,
    Rejected(Rejection),
}

/// A scene change applied by the driver side (`settle` / `poll_events`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneAdvance {
    pub from: SceneIndex,
    pub to: SceneIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No tutor selected.
    Idle,
    InProgress,
    /// An option was taken and the scene advance is pending.
    Transitioning,
    Complete,
}
