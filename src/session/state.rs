use std::collections::HashMap;

use super::event::ChatMessage;
use crate::script::{SceneIndex, TutorId};
use crate::storage::progress::{DEFAULT_HAPPINESS, FIRST_SCENE, MAX_HAPPINESS};

/// Clamps a raw score into [0, 100].
pub fn clamp_happiness(value: i64) -> u8 {
    value.clamp(0, MAX_HAPPINESS as i64) as u8
}

/// Strict state delta. This is the ONLY way session state mutates.
#[derive(Debug, Clone)]
pub enum StateDelta {
    TutorSelected {
        tutor: TutorId,
        scene: SceneIndex,
        happiness: u8,
        messages: Vec<ChatMessage>,
    },
    MessageAppended(ChatMessage),
    HappinessSet { tutor: TutorId, value: u8 },
    SceneSet(SceneIndex),
    Completed,
    Reset,
}

/// In-memory session. Dropped on restart; progress lives in the progress store.
#[derive(Debug, Clone)]
pub struct SessionState {
    selected_tutor: Option<TutorId>,
    current_scene: SceneIndex,
    messages: Vec<ChatMessage>,
    happiness: HashMap<TutorId, u8>,
    complete: bool,
    // Monotonic, bumped on every reduction
    pub version: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            selected_tutor: None,
            current_scene: FIRST_SCENE,
            messages: Vec::new(),
            happiness: HashMap::new(),
            complete: false,
            version: 0,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure reduction: State + Delta -> Mutated State
    pub fn reduce(&mut self, delta: StateDelta) {
        self.version += 1;

        match delta {
            StateDelta::TutorSelected {
                tutor,
                scene,
                happiness,
                messages,
            } => {
                // Other tutors' scores stay as they are.
                self.happiness.insert(tutor.clone(), happiness.min(MAX_HAPPINESS));
                self.selected_tutor = Some(tutor);
                self.current_scene = scene.max(FIRST_SCENE);
                self.messages = messages;
                self.complete = false;
            }
            StateDelta::MessageAppended(message) => {
                self.messages.push(message);
            }
            StateDelta::HappinessSet { tutor, value } => {
                self.happiness.insert(tutor, value.min(MAX_HAPPINESS));
            }
            StateDelta::SceneSet(scene) => {
                self.current_scene = scene;
            }
            StateDelta::Completed => {
                self.complete = true;
            }
            StateDelta::Reset => {
                self.selected_tutor = None;
                self.current_scene = FIRST_SCENE;
                self.messages.clear();
                // Every tutor falls back to the default score, not just the active one.
                self.happiness.clear();
                self.complete = false;
            }
        }
    }

    pub fn selected_tutor(&self) -> Option<&TutorId> {
        self.selected_tutor.as_ref()
    }

    pub fn current_scene(&self) -> SceneIndex {
        self.current_scene
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Score for `tutor`, 50 when it has never been seen.
    pub fn happiness(&self, tutor: &str) -> u8 {
        self.happiness.get(tutor).copied().unwrap_or(DEFAULT_HAPPINESS)
    }

    pub fn happiness_map(&self) -> &HashMap<TutorId, u8> {
        &self.happiness
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}
