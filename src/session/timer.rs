use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::event::SessionEvent;
use crate::script::SceneIndex;

/// Scene advance waiting out its transition window.
/// Canceling (or dropping) it guarantees the advance is never delivered live.
#[derive(Debug)]
pub struct PendingAdvance {
    pub epoch: u64,
    pub to: SceneIndex,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PendingAdvance {
    /// Spawns the timer. Requires a tokio runtime.
    pub fn schedule(tx: mpsc::Sender<SessionEvent>, epoch: u64, to: SceneIndex, delay: Duration) -> Self {
        let token = CancellationToken::new();
        let child = token.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(SessionEvent::AdvanceDue { epoch, to }).await;
                }
            }
        });

        Self {
            epoch,
            to,
            token,
            task,
        }
    }

    pub fn matches(&self, epoch: u64, to: SceneIndex) -> bool {
        self.epoch == epoch && self.to == to && !self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
        self.task.abort();
    }
}

impl Drop for PendingAdvance {
    fn drop(&mut self) {
        self.cancel();
    }
}
