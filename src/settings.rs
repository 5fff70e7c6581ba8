//! Loading, saving and resetting the remote configuration.

use crate::client::{ChatResult, ConfigSource};
use crate::config::{Config, ConfigStore, DEFAULT_THEME, StreamingMode, Typography};
use crate::events::{self, EventSender, NotifyLevel, UiEvent};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

const SAVED_TEXT: &str = "Configuration saved";
const SAVE_FAILED_TEXT: &str = "Failed to save configuration";
const RESET_TEXT: &str = "Configuration reset";

/// The streaming selector offered to the user, folding `enabled` and `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamingChoice {
    Disabled,
    Raw,
    Smooth,
}

impl StreamingChoice {
    pub fn of(config: &Config) -> Self {
        match (config.streaming_enabled(), config.streaming_mode()) {
            (false, _) => StreamingChoice::Disabled,
            (true, StreamingMode::Raw) => StreamingChoice::Raw,
            (true, StreamingMode::Smooth) => StreamingChoice::Smooth,
        }
    }
}

/// User-editable subset of the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigUpdate {
    pub theme: String,
    pub font_family: String,
    pub font_size: u32,
    pub streaming: StreamingChoice,
    pub smooth_speed_ms: u64,
}

impl ConfigUpdate {
    /// Form values as currently shown for `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            theme: config.theme_name().to_string(),
            font_family: config.font_family().to_string(),
            font_size: config.font_size_px(),
            streaming: StreamingChoice::of(config),
            smooth_speed_ms: config.smooth_speed().as_millis() as u64,
        }
    }

    /// Merges the form onto `base`, leaving every other key untouched.
    pub fn apply(&self, base: &Config) -> Config {
        let mut next = base.clone();
        next.theme = Some(self.theme.clone());
        next.typography = Some(Typography {
            font_family: Some(self.font_family.clone()),
            font_size: Some(self.font_size),
        });
        next.streaming.enabled = self.streaming != StreamingChoice::Disabled;
        next.streaming.mode = match self.streaming {
            StreamingChoice::Smooth => StreamingMode::Smooth,
            StreamingChoice::Raw | StreamingChoice::Disabled => StreamingMode::Raw,
        };
        next.streaming.smooth_speed = Some(self.smooth_speed_ms);
        next
    }
}

pub struct Settings<S> {
    source: Arc<S>,
    store: ConfigStore,
    events: EventSender,
    themes: RwLock<Vec<String>>,
}

impl<S: ConfigSource> Settings<S> {
    pub fn new(source: Arc<S>, store: ConfigStore, events: EventSender) -> Self {
        Self {
            source,
            store,
            events,
            themes: RwLock::new(vec![DEFAULT_THEME.to_string()]),
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Fetches the configuration into the store. On failure the current
    /// snapshot stays in place and `false` is returned.
    pub async fn load(&self) -> bool {
        match self.fetch().await {
            Ok(config) => {
                self.store.replace(config);
                true
            }
            Err(err) => {
                warn!("error loading config: {}", err);
                false
            }
        }
    }

    async fn fetch(&self) -> ChatResult<Config> {
        let document = self.source.fetch_config().await?;
        Ok(Config::from_value(&document)?)
    }

    /// Refreshes the theme catalogue, falling back to the default theme.
    pub async fn load_themes(&self) -> Vec<String> {
        let themes = match self.source.fetch_themes().await {
            Ok(themes) => themes
                .iter()
                .map(|theme| theme.trim_end_matches(".css").to_string())
                .collect(),
            Err(err) => {
                warn!("error loading themes: {}", err);
                vec![DEFAULT_THEME.to_string()]
            }
        };
        *self.themes.write() = themes.clone();
        themes
    }

    pub fn themes(&self) -> Vec<String> {
        self.themes.read().clone()
    }

    /// Saves `update` merged onto the current snapshot. The store only
    /// changes when the service accepted the document.
    pub async fn save(&self, update: &ConfigUpdate) -> bool {
        let next = update.apply(&self.store.snapshot());
        let saved = match next.to_value() {
            Ok(document) => self.source.save_config(&document).await.map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };

        match saved {
            Ok(()) => {
                info!("configuration saved");
                self.store.replace(next);
                self.announce_reload();
                self.notify(NotifyLevel::Success, SAVED_TEXT);
                true
            }
            Err(err) => {
                warn!("error saving config: {}", err);
                self.notify(NotifyLevel::Error, SAVE_FAILED_TEXT);
                false
            }
        }
    }

    /// Discards local edits by reloading configuration and themes.
    pub async fn reset(&self) {
        self.load().await;
        self.load_themes().await;
        self.announce_reload();
        self.notify(NotifyLevel::Success, RESET_TEXT);
    }

    fn announce_reload(&self) {
        events::emit(
            &self.events,
            UiEvent::ConfigReloaded {
                config: self.store.snapshot(),
            },
        );
    }

    fn notify(&self, level: NotifyLevel, text: &str) {
        events::emit(
            &self.events,
            UiEvent::Notify {
                level,
                text: text.to_string(),
            },
        );
    }
}
