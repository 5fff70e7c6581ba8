use crate::client::{ChatBackend, ChatError, Pacer};
use crate::config::{Config, ConfigStore, StreamingMode};
use crate::events::{self, EventSender, UiEvent};
use crate::types::{ChatMessage, error_text};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The exchange ran to its terminal outcome (reply or inline error).
    Completed,
    /// Input was empty after trimming.
    IgnoredEmpty,
    /// Another send was still in flight.
    IgnoredBusy,
}

/// Holds the Busy flag for the lifetime of one send.
///
/// Dropping the guard, including when the send future itself is dropped,
/// returns the machine to Idle and asks for a full re-render.
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
    events: &'a EventSender,
}

impl<'a> BusyGuard<'a> {
    fn enter(busy: &'a AtomicBool, events: &'a EventSender) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self { busy, events })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        events::emit(self.events, UiEvent::Render { busy: false });
    }
}

/// Message log plus the single-flight guard.
///
/// Failures never escape a send; they land in the log as an
/// `Error: <reason>` assistant message.
pub struct Conversation<B> {
    backend: Arc<B>,
    config: ConfigStore,
    messages: Arc<Mutex<Vec<ChatMessage>>>,
    busy: Arc<AtomicBool>,
    events: EventSender,
}

impl<B> Clone for Conversation<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            messages: Arc::clone(&self.messages),
            busy: Arc::clone(&self.busy),
            events: self.events.clone(),
        }
    }
}

impl<B: ChatBackend> Conversation<B> {
    pub fn new(backend: Arc<B>, config: ConfigStore, events: EventSender) -> Self {
        Self {
            backend,
            config,
            messages: Arc::new(Mutex::new(Vec::new())),
            busy: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Copy of the log in conversation order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn state(&self) -> RequestState {
        if self.busy.load(Ordering::Acquire) {
            RequestState::Busy
        } else {
            RequestState::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state() == RequestState::Busy
    }

    /// Sends `text` and waits for the reply to finish.
    ///
    /// Empty input and sends attempted while Busy are ignored without any
    /// side effect. The configuration snapshot is read once, here; a reload
    /// landing mid-reply does not affect this send.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::IgnoredEmpty;
        }
        let Some(_busy) = BusyGuard::enter(&self.busy, &self.events) else {
            return SendOutcome::IgnoredBusy;
        };

        self.push(ChatMessage::user(text));
        events::emit(&self.events, UiEvent::Render { busy: true });

        let config = self.config.snapshot();
        if config.streaming_enabled() {
            self.stream_reply(text, &config).await;
        } else {
            self.single_reply(text).await;
        }
        SendOutcome::Completed
    }

    async fn single_reply(&self, text: &str) {
        let reply = match self.backend.send_message(text).await {
            Ok(response) => ChatMessage::assistant(response),
            Err(err) => {
                warn!("chat request failed: {}", err);
                ChatMessage::error(&err)
            }
        };
        self.push(reply);
    }

    async fn stream_reply(&self, text: &str, config: &Config) {
        let index = self.push(ChatMessage::assistant(""));
        events::emit(&self.events, UiEvent::Render { busy: true });

        let pacer = match config.streaming_mode() {
            StreamingMode::Smooth => Some(Pacer::new(config.smooth_speed())),
            StreamingMode::Raw => None,
        };

        let mut fragments = match self.backend.stream_message(text).await {
            Ok(fragments) => fragments,
            Err(err) => return self.fail(index, &err),
        };

        let mut received = 0usize;
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    received += 1;
                    match &pacer {
                        Some(pacer) => {
                            pacer
                                .emit(&fragment, |slice| self.append(index, slice))
                                .await
                        }
                        None => self.append(index, &fragment),
                    }
                }
                Err(err) => return self.fail(index, &err),
            }
        }
        debug!("stream reply finished after {} fragments", received);
    }

    fn push(&self, message: ChatMessage) -> usize {
        let mut messages = self.messages.lock();
        messages.push(message);
        messages.len() - 1
    }

    fn append(&self, index: usize, piece: &str) {
        let content = {
            let mut messages = self.messages.lock();
            let Some(message) = messages.get_mut(index) else {
                return;
            };
            message.content.push_str(piece);
            message.content.clone()
        };
        events::emit(&self.events, UiEvent::MessageUpdated { index, content });
    }

    /// Replaces whatever streamed so far with the error text.
    fn fail(&self, index: usize, err: &ChatError) {
        warn!("chat stream failed: {}", err);
        let content = error_text(err);
        if let Some(message) = self.messages.lock().get_mut(index) {
            message.content = content.clone();
        }
        events::emit(&self.events, UiEvent::MessageUpdated { index, content });
    }
}
