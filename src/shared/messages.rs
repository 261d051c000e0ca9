//! Message types for communication between the scan worker and its consumer

use crossbeam_channel::{never, select, Receiver, Sender, TrySendError};
use tracing::{debug, trace};

use crate::analysis::DeckProfile;

/// Events produced by the pipeline, in emission order
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Human-readable progress or fault report
    Status(String),
    /// Per-tick OCR summary `[n/c] name='..' clan='..'`
    Ocr(String),
    /// A lookup started (`true`) or finished (`false`)
    Loading(bool),
    /// A stabilized pair is being resolved
    Resolved { name: String, clan: String },
    /// Opponent profile with deck analytics
    Deck(Box<DeckProfile>),
}

impl PipelineEvent {
    pub fn status(text: impl Into<String>) -> Self {
        PipelineEvent::Status(text.into())
    }

    /// Event name as used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::Status(_) => "status",
            PipelineEvent::Ocr(_) => "ocr",
            PipelineEvent::Loading(_) => "loading",
            PipelineEvent::Resolved { .. } => "resolved",
            PipelineEvent::Deck(_) => "deck",
        }
    }
}

/// The consumer hung up or the session was stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

/// Producer side of the event channel
///
/// OCR summaries are best-effort and dropped when the channel is full;
/// everything else waits for room, or until the stop channel closes.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<PipelineEvent>,
    stop: Receiver<()>,
}

impl EventSender {
    pub fn new(tx: Sender<PipelineEvent>) -> Self {
        Self { tx, stop: never() }
    }

    /// Blocking sends give up once `stop` is signalled or disconnected
    pub fn with_stop(tx: Sender<PipelineEvent>, stop: Receiver<()>) -> Self {
        Self { tx, stop }
    }

    pub fn send(&self, event: PipelineEvent) -> Result<(), Disconnected> {
        if matches!(event, PipelineEvent::Ocr(_)) {
            return match self.tx.try_send(event) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    trace!("Event channel full, dropping ocr event");
                    Ok(())
                }
                Err(TrySendError::Disconnected(_)) => Err(Disconnected),
            };
        }
        select! {
            send(self.tx, event) -> sent => sent.map_err(|_| Disconnected),
            recv(self.stop) -> _ => {
                debug!("Stop requested while waiting for the consumer");
                Err(Disconnected)
            }
        }
    }

    pub fn status(&self, text: impl Into<String>) -> Result<(), Disconnected> {
        self.send(PipelineEvent::status(text))
    }
}
