//! Best-effort events for whoever is presenting progress to the user.
//!
//! Sending never blocks and never fails the sender: if nobody listens, or the
//! listener is behind, the event is dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    DownloadProgress {
        current: usize,
        total: usize,
        file_name: String,
    },
    ShowNotification { title: String, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<Event>>,
}

impl EventSink {
    /// Create a sink together with the receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops everything
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: Event) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.try_send(event) {
            trace!(error = %e, "Event dropped");
        }
    }

    pub fn notify(&self, title: impl Into<String>, message: impl Into<String>) {
        self.emit(Event::ShowNotification {
            title: title.into(),
            message: message.into(),
        });
    }
}
