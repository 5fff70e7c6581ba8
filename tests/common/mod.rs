//! Scripted stand-in for the chat service.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;
use parley::client::FragmentStream;
use parley::events::EventReceiver;
use parley::{ChatBackend, ChatError, ChatResult, Config, ConfigSource, ConfigStore, UiEvent};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

pub struct FakeService {
    reply: Mutex<ChatResult<String>>,
    stream_open: Mutex<ChatResult<()>>,
    fragments: Mutex<Vec<ChatResult<String>>>,
    gate: Mutex<Option<Arc<Notify>>>,
    /// Served in order; once drained, `config` is served on every fetch.
    scripted_configs: Mutex<VecDeque<ChatResult<Value>>>,
    config: Mutex<Value>,
    save_error: Mutex<Option<ChatError>>,
    themes: Mutex<ChatResult<Vec<String>>>,
    pub saved: Mutex<Vec<Value>>,
    pub chat_calls: AtomicUsize,
    pub config_fetches: AtomicUsize,
}

impl Default for FakeService {
    fn default() -> Self {
        Self {
            reply: Mutex::new(Ok(String::new())),
            stream_open: Mutex::new(Ok(())),
            fragments: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            scripted_configs: Mutex::new(VecDeque::new()),
            config: Mutex::new(json!({})),
            save_error: Mutex::new(None),
            themes: Mutex::new(Ok(vec!["default.css".to_string()])),
            saved: Mutex::new(Vec::new()),
            chat_calls: AtomicUsize::new(0),
            config_fetches: AtomicUsize::new(0),
        }
    }
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: ChatResult<String>) -> Self {
        *self.reply.lock() = reply;
        self
    }

    pub fn with_fragments(self, fragments: Vec<ChatResult<String>>) -> Self {
        *self.fragments.lock() = fragments;
        self
    }

    pub fn with_stream_error(self, err: ChatError) -> Self {
        *self.stream_open.lock() = Err(err);
        self
    }

    /// Holds every chat request until `gate` is notified.
    pub fn with_gate(self, gate: Arc<Notify>) -> Self {
        *self.gate.lock() = Some(gate);
        self
    }

    pub fn with_config(self, config: Value) -> Self {
        *self.config.lock() = config;
        self
    }

    pub fn with_config_script(self, script: Vec<ChatResult<Value>>) -> Self {
        *self.scripted_configs.lock() = script.into();
        self
    }

    pub fn with_save_error(self, err: ChatError) -> Self {
        *self.save_error.lock() = Some(err);
        self
    }

    pub fn with_themes(self, themes: ChatResult<Vec<String>>) -> Self {
        *self.themes.lock() = themes;
        self
    }

    pub fn fetches(&self) -> usize {
        self.config_fetches.load(Ordering::SeqCst)
    }

    async fn wait_for_gate(&self) {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl ChatBackend for FakeService {
    async fn send_message(&self, _message: &str) -> ChatResult<String> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        self.reply.lock().clone()
    }

    async fn stream_message(&self, _message: &str) -> ChatResult<FragmentStream> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        self.stream_open.lock().clone()?;
        let fragments = self.fragments.lock().clone();
        Ok(stream::iter(fragments).boxed())
    }
}

#[async_trait]
impl ConfigSource for FakeService {
    async fn fetch_config(&self) -> ChatResult<Value> {
        self.config_fetches.fetch_add(1, Ordering::SeqCst);
        let next = self.scripted_configs.lock().pop_front();
        match next {
            Some(scripted) => scripted,
            None => Ok(self.config.lock().clone()),
        }
    }

    async fn save_config(&self, document: &Value) -> ChatResult<()> {
        if let Some(err) = self.save_error.lock().clone() {
            return Err(err);
        }
        self.saved.lock().push(document.clone());
        *self.config.lock() = document.clone();
        Ok(())
    }

    async fn fetch_themes(&self) -> ChatResult<Vec<String>> {
        self.themes.lock().clone()
    }
}

pub fn store_with(document: Value) -> ConfigStore {
    ConfigStore::new(Config::from_value(&document).expect("test config parses"))
}

/// Everything raised so far, without waiting.
pub fn drain(rx: &mut EventReceiver) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn transport(message: &str) -> ChatError {
    ChatError::Transport(message.to_string())
}
