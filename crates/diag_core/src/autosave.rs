//! Background autosave coordinator.
//!
//! Clients push whole drafts at every edit; the coordinator coalesces them
//! and flushes through [`DiagService::save`] on a steady cadence, with a much
//! shorter fuse when the client reports it is about to disappear. The driver
//! is a spawned task, so a flush scheduled before the handle is dropped still
//! reaches storage.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use uuid::Uuid;

use crate::model::ActorContext;
use crate::proto::SaveRequest;
use crate::service::DiagService;

/// Steady-state flush cadence while the respondent is editing.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(1200);

/// Fuse after the client signals blur / page-hide / tab-switch.
pub const HIDE_FLUSH_DELAY: Duration = Duration::from_millis(250);

/// What the save indicator should show.
#[derive(Debug, Clone, PartialEq)]
pub enum AutosaveState {
    Idle,
    Saving,
    Saved {
        assessment_id: Uuid,
        version: u32,
        conflict: bool,
    },
    Error(String),
}

enum Event {
    Edited(Box<SaveRequest>),
    Hidden,
}

pub struct Autosave {
    tx: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<AutosaveState>,
    driver: JoinHandle<()>,
}

impl Autosave {
    pub fn spawn(service: Arc<dyn DiagService>, actor: ActorContext) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(AutosaveState::Idle);
        let driver = tokio::spawn(drive(service, actor, rx, state_tx));
        Self {
            tx,
            state: state_rx,
            driver,
        }
    }

    /// Replace the pending draft. Returns false once the driver has stopped.
    pub fn edit(&self, draft: SaveRequest) -> bool {
        self.tx.send(Event::Edited(Box::new(draft))).is_ok()
    }

    /// The client is losing visibility; flush on the short fuse.
    pub fn page_hidden(&self) {
        let _ = self.tx.send(Event::Hidden);
    }

    pub fn state(&self) -> watch::Receiver<AutosaveState> {
        self.state.clone()
    }

    /// Stop accepting edits, flush anything pending, and wait for the driver.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.driver.await;
    }
}

async fn drive(
    service: Arc<dyn DiagService>,
    actor: ActorContext,
    mut rx: mpsc::UnboundedReceiver<Event>,
    state: watch::Sender<AutosaveState>,
) {
    let mut pending: Option<SaveRequest> = None;
    let mut deadline: Option<Instant> = None;
    // Learned from the first successful flush; later drafts are routed to the
    // same record with the latest version as the optimistic base.
    let mut assessment_id: Option<Uuid> = None;
    let mut base_version: Option<u32> = None;

    loop {
        let event = if let Some(at) = deadline {
            tokio::select! {
                // Drain edits first so a flush always carries the newest
                // draft when both branches are ready.
                biased;
                ev = rx.recv() => ev,
                _ = sleep_until(at) => {
                    flush(
                        &service,
                        &actor,
                        &state,
                        &mut pending,
                        &mut assessment_id,
                        &mut base_version,
                    )
                    .await;
                    deadline = None;
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match event {
            Some(Event::Edited(draft)) => {
                pending = Some(*draft);
                // First edit in a quiet period starts the cadence; later
                // edits ride the already-armed timer so flushes stay
                // periodic under continuous typing.
                if deadline.is_none() {
                    deadline = Some(Instant::now() + FLUSH_INTERVAL);
                }
            }
            Some(Event::Hidden) => {
                if pending.is_some() {
                    let fuse = Instant::now() + HIDE_FLUSH_DELAY;
                    deadline = Some(deadline.map_or(fuse, |d| d.min(fuse)));
                }
            }
            None => {
                flush(
                    &service,
                    &actor,
                    &state,
                    &mut pending,
                    &mut assessment_id,
                    &mut base_version,
                )
                .await;
                return;
            }
        }
    }
}

async fn flush(
    service: &Arc<dyn DiagService>,
    actor: &ActorContext,
    state: &watch::Sender<AutosaveState>,
    pending: &mut Option<SaveRequest>,
    assessment_id: &mut Option<Uuid>,
    base_version: &mut Option<u32>,
) {
    let mut draft = match pending.take() {
        Some(d) => d,
        None => return,
    };
    if draft.assessment_id.is_none() {
        draft.assessment_id = *assessment_id;
    }
    if draft.base_version_number.is_none() {
        draft.base_version_number = *base_version;
    }

    let _ = state.send(AutosaveState::Saving);
    match service.save(actor, draft).await {
        Ok(outcome) => {
            *assessment_id = Some(outcome.id);
            *base_version = Some(outcome.current_version_number);
            let _ = state.send(AutosaveState::Saved {
                assessment_id: outcome.id,
                version: outcome.current_version_number,
                conflict: outcome.conflict_detected,
            });
        }
        Err(err) => {
            tracing::warn!(error = %err, "autosave flush failed");
            let _ = state.send(AutosaveState::Error(err.to_string()));
        }
    }
}
