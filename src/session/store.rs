use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::event::{
    ChatMessage, OptionOutcome, Rejection, Role, SceneAdvance, SessionEvent, SessionPhase,
};
use super::state::{clamp_happiness, SessionState, StateDelta};
use super::timer::PendingAdvance;
use crate::config::{SessionConfig, TranscriptPolicy};
use crate::script::{ChatOption, MessageContent, Scene, SceneIndex, ScriptRepository, Tutor, TutorId};
use crate::storage::progress::{ProgressStore, DEFAULT_HAPPINESS};

const EVENT_CAPACITY: usize = 16;

/// Owner of the single-user chat session.
///
/// One instance per process, passed by reference to whoever drives the UI.
/// Option selection schedules the scene advance on a timer; the owner applies
/// it with [`SessionStore::settle`] or [`SessionStore::poll_events`]. Those and
/// `select_option` need a tokio runtime.
pub struct SessionStore {
    script: Arc<ScriptRepository>,
    progress: Arc<dyn ProgressStore>,
    config: SessionConfig,
    state: SessionState,
    receiver: mpsc::Receiver<SessionEvent>,
    tx: mpsc::Sender<SessionEvent>,
    // Bumped on tutor selection, reset and every scheduled advance
    epoch: u64,
    pending: Option<PendingAdvance>,
}

impl SessionStore {
    pub fn new(script: Arc<ScriptRepository>, progress: Arc<dyn ProgressStore>, config: SessionConfig) -> Self {
        let (tx, receiver) = mpsc::channel(EVENT_CAPACITY);
        Self {
            script,
            progress,
            config,
            state: SessionState::new(),
            receiver,
            tx,
            epoch: 0,
            pending: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn script(&self) -> &ScriptRepository {
        &self.script
    }

    pub fn progress(&self) -> &dyn ProgressStore {
        self.progress.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn selected_tutor(&self) -> Option<&TutorId> {
        self.state.selected_tutor()
    }

    pub fn current_scene(&self) -> SceneIndex {
        self.state.current_scene()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.state.messages()
    }

    pub fn happiness(&self, tutor: &str) -> u8 {
        self.state.happiness(tutor)
    }

    pub fn tutor(&self) -> Option<&Tutor> {
        self.selected_tutor().and_then(|id| self.script.tutor(id.as_str()))
    }

    /// Scene record for the current index; `None` once past the scripted tree.
    pub fn scene(&self) -> Option<&Scene> {
        let tutor = self.selected_tutor()?;
        self.script.scene(tutor.as_str(), self.state.current_scene())
    }

    pub fn options(&self) -> &[ChatOption] {
        self.scene().map(|s| s.options.as_slice()).unwrap_or(&[])
    }

    pub fn is_transitioning(&self) -> bool {
        self.pending.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.selected_tutor().is_none() {
            SessionPhase::Idle
        } else if self.pending.is_some() {
            SessionPhase::Transitioning
        } else if self.state.is_complete() || self.options().is_empty() {
            SessionPhase::Complete
        } else {
            SessionPhase::InProgress
        }
    }

    /// Loads `tutor`'s persisted progress and starts its dialogue.
    /// Unknown ids are ignored; returns whether the tutor is now selected.
    pub fn select_tutor(&mut self, tutor: &str) -> bool {
        if !self.script.contains(tutor) {
            warn!("Ignoring selection of unknown tutor '{}'", tutor);
            return false;
        }
        self.cancel_pending();
        self.epoch += 1;

        let id = TutorId::from(tutor);
        let stats = self.progress.get_stats(&id);
        // Records written under a larger terminal index resume at the terminal scene.
        let scene = stats.current_scene.min(self.config.terminal_scene);

        let mut messages = match self.config.transcript {
            TranscriptPolicy::Persisted => self.progress.load_transcript(&id),
            TranscriptPolicy::Ephemeral => Vec::new(),
        };
        if messages.is_empty() {
            if let Some(initial) = self
                .script
                .scene(tutor, scene)
                .and_then(|scene| scene.initial.clone())
            {
                messages.push(ChatMessage::new(Role::Assistant, initial));
            }
        }

        self.state.reduce(StateDelta::TutorSelected {
            tutor: id,
            scene,
            happiness: stats.happiness,
            messages,
        });
        self.sync_transcript();

        info!(
            "Tutor selected: {} (scene {}, happiness {})",
            tutor, scene, stats.happiness
        );
        true
    }

    pub fn add_message(&mut self, role: Role, content: MessageContent) {
        self.state.reduce(StateDelta::MessageAppended(ChatMessage::new(role, content)));
        self.sync_transcript();
    }

    /// Records the option, applies its points and schedules the next scene.
    /// Rejected while a previous advance is still in its transition window.
    pub fn select_option(&mut self, option: &ChatOption) -> OptionOutcome {
        let Some(tutor) = self.selected_tutor().cloned() else {
            return OptionOutcome::Rejected(Rejection::NoTutor);
        };
        if self.state.is_complete() {
            return OptionOutcome::Rejected(Rejection::Complete);
        }
        if self.pending.is_some() {
            debug!("Option '{}' ignored during scene transition", option.id);
            return OptionOutcome::Rejected(Rejection::Transitioning);
        }

        self.add_message(Role::User, option.content.clone());
        if let Some(response) = &option.response {
            self.add_message(Role::Assistant, response.clone());
        }
        if let Some(points) = option.points {
            self.adjust_happiness(&tutor, points);
        }

        let scene = self.state.current_scene();
        if scene < self.config.terminal_scene {
            let to = scene + 1;
            self.epoch += 1;
            self.pending = Some(PendingAdvance::schedule(
                self.tx.clone(),
                self.epoch,
                to,
                self.config.advance_delay,
            ));
            debug!("Scene advance {} -> {} scheduled", scene, to);
            OptionOutcome::Advancing { to }
        } else {
            self.state.reduce(StateDelta::Completed);
            info!("Dialogue with {} complete at scene {}", tutor, scene);
            OptionOutcome::Completed
        }
    }

    /// Selects the `index`-th option of the current scene.
    pub fn select_option_at(&mut self, index: usize) -> OptionOutcome {
        let option = self.options().get(index).cloned();
        match option {
            Some(option) => self.select_option(&option),
            None => OptionOutcome::Rejected(Rejection::UnknownOption),
        }
    }

    /// Adds `delta` to the tutor's score, clamped to [0, 100], and persists it.
    pub fn adjust_happiness(&mut self, tutor: &TutorId, delta: i32) -> u8 {
        let current = self.state.happiness_map().get(tutor).copied().unwrap_or(DEFAULT_HAPPINESS);
        let value = clamp_happiness(current as i64 + delta as i64);
        self.state.reduce(StateDelta::HappinessSet {
            tutor: tutor.clone(),
            value,
        });
        self.progress.update_happiness(tutor, value);
        debug!("Happiness for {}: {} -> {}", tutor, current, value);
        value
    }

    /// Jumps to `index`. An advance still in its transition window is dropped.
    pub fn set_scene(&mut self, index: SceneIndex) {
        self.cancel_pending();
        self.epoch += 1;
        self.write_scene(index);
    }

    fn write_scene(&mut self, index: SceneIndex) {
        self.state.reduce(StateDelta::SceneSet(index));
        if let Some(tutor) = self.state.selected_tutor() {
            self.progress.update_scene(tutor, index);
        }
    }

    /// Erases the active tutor's stored progress and clears the session.
    pub fn reset(&mut self) {
        self.cancel_pending();
        self.epoch += 1;
        if let Some(tutor) = self.state.selected_tutor() {
            self.progress.reset_progress(tutor);
            info!("Session reset, progress for {} erased", tutor);
        }
        self.state.reduce(StateDelta::Reset);
    }

    /// Waits for the outstanding scene advance, if any, and applies it.
    pub async fn settle(&mut self) -> Option<SceneAdvance> {
        while self.pending.is_some() {
            let event = self.receiver.recv().await?;
            if let Some(advance) = self.apply_event(event) {
                return Some(advance);
            }
        }
        None
    }

    /// Applies every event already delivered, without waiting.
    pub fn poll_events(&mut self) -> Vec<SceneAdvance> {
        let mut applied = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            if let Some(advance) = self.apply_event(event) {
                applied.push(advance);
            }
        }
        applied
    }

    fn apply_event(&mut self, event: SessionEvent) -> Option<SceneAdvance> {
        match event {
            SessionEvent::AdvanceDue { epoch, to } => {
                let live = self.pending.as_ref().is_some_and(|p| p.matches(epoch, to));
                if !live || epoch != self.epoch {
                    warn!("Discarded stale scene advance: epoch {} vs session {}", epoch, self.epoch);
                    return None;
                }
                self.pending = None;
                let from = self.state.current_scene();
                self.write_scene(to);
                info!("Scene advanced {} -> {}", from, to);
                Some(SceneAdvance { from, to })
            }
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!("Canceling scene advance to {}", pending.to);
            pending.cancel();
        }
    }

    fn sync_transcript(&self) {
        let Some(tutor) = self.state.selected_tutor() else {
            return;
        };
        let messages = self.state.messages();
        self.progress.update_message_count(tutor, messages.len());
        if self.config.transcript == TranscriptPolicy::Persisted {
            self.progress.save_transcript(tutor, messages);
        }
    }
}
