//! Signals raised by the core for the presentation layer.

use crate::config::Config;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Redraw the whole conversation and input area.
    Render { busy: bool },
    /// Content of the message at `index` changed in place.
    MessageUpdated { index: usize, content: String },
    /// A new configuration snapshot is current; re-derive presentation state.
    ConfigReloaded { config: Arc<Config> },
    /// Short-lived toast, e.g. after saving settings.
    Notify { level: NotifyLevel, text: String },
}

pub type EventSender = mpsc::UnboundedSender<UiEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<UiEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Sends `event`, ignoring a presentation layer that has gone away.
pub(crate) fn emit(tx: &EventSender, event: UiEvent) {
    if tx.send(event).is_err() {
        tracing::debug!("ui event dropped: receiver closed");
    }
}
