//! Configuration snapshot served by `/api/config`.

use parking_lot::RwLock;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SMOOTH_SPEED_MS: u64 = 50;
pub const DEFAULT_HOT_RELOAD_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_THEME: &str = "default";
pub const DEFAULT_FONT_SIZE_PX: u32 = 14;
pub const DEFAULT_FONT_FAMILY: &str = "-apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif";

// The document is edited by hand while the client runs. A null or
// mistyped field reads as absent instead of rejecting the whole document.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Numbers may arrive as floats (`1500.0`) or strings (`"16"`).
fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite() && *n >= 0.0)
}

fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_like(&value).map(|ms| ms.round() as u64))
}

fn lenient_px<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_like(&value)
        .filter(|px| *px <= f64::from(u32::MAX))
        .map(|px| px.round() as u32))
}

/// Anything other than `"smooth"` streams raw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingMode {
    #[default]
    Raw,
    Smooth,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamingSettings {
    #[serde(deserialize_with = "lenient")]
    pub enabled: bool,
    #[serde(deserialize_with = "lenient")]
    pub mode: StreamingMode,
    #[serde(
        alias = "smoothSpeedMs",
        deserialize_with = "lenient_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub smooth_speed: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotReloadSettings {
    #[serde(deserialize_with = "lenient")]
    pub enabled: bool,
    #[serde(
        alias = "intervalMs",
        deserialize_with = "lenient_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Typography {
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(deserialize_with = "lenient_px", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Background {
    #[serde(deserialize_with = "lenient")]
    pub enabled: bool,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Typed view of the backend's configuration document. Every section is
/// optional on the wire; read through the accessors, which apply defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    #[serde(deserialize_with = "lenient")]
    pub endpoint: String,
    #[serde(deserialize_with = "lenient")]
    pub model: String,
    #[serde(deserialize_with = "lenient")]
    pub api_key: String,
    #[serde(deserialize_with = "lenient")]
    pub streaming: StreamingSettings,
    #[serde(deserialize_with = "lenient")]
    pub hot_reload: HotReloadSettings,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub typography: Option<Typography>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    /// Bubble styling is interpreted by the presentation layer only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_bubbles: Option<Value>,
    /// Keys this client does not model, kept so a save round-trips them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Config {
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        Config::deserialize(value)
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn streaming_enabled(&self) -> bool {
        self.streaming.enabled
    }

    pub fn streaming_mode(&self) -> StreamingMode {
        self.streaming.mode
    }

    pub fn smooth_speed(&self) -> Duration {
        Duration::from_millis(self.streaming.smooth_speed.unwrap_or(DEFAULT_SMOOTH_SPEED_MS))
    }

    pub fn hot_reload_enabled(&self) -> bool {
        self.hot_reload.enabled
    }

    pub fn hot_reload_interval(&self) -> Duration {
        let ms = self
            .hot_reload
            .interval
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_HOT_RELOAD_INTERVAL_MS);
        Duration::from_millis(ms)
    }

    /// Polling schedule this snapshot asks for, `None` when hot reload is off.
    pub fn reload_schedule(&self) -> Option<Duration> {
        self.hot_reload_enabled()
            .then(|| self.hot_reload_interval())
    }

    pub fn theme_name(&self) -> &str {
        self.theme
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_THEME)
    }

    pub fn font_family(&self) -> &str {
        self.typography
            .as_ref()
            .and_then(|t| t.font_family.as_deref())
            .filter(|family| !family.is_empty())
            .unwrap_or(DEFAULT_FONT_FAMILY)
    }

    pub fn font_size_px(&self) -> u32 {
        self.typography
            .as_ref()
            .and_then(|t| t.font_size)
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_FONT_SIZE_PX)
    }

    pub fn background_image(&self) -> Option<&str> {
        self.background
            .as_ref()
            .filter(|bg| bg.enabled)
            .and_then(|bg| bg.image.as_deref())
            .filter(|image| !image.is_empty())
    }
}

/// Holds the one current configuration snapshot.
///
/// Cloning the store clones the handle, not the snapshot. Readers take an
/// `Arc` snapshot and keep using it for as long as they need consistent
/// values; a concurrent [`ConfigStore::replace`] never mutates a snapshot
/// someone already holds.
#[derive(Clone, Debug, Default)]
pub struct ConfigStore {
    current: Arc<RwLock<Arc<Config>>>,
}

impl ConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn snapshot(&self) -> Arc<Config> {
        self.current.read().clone()
    }

    /// Installs `config` and returns the snapshot it displaced.
    pub fn replace(&self, config: Config) -> Arc<Config> {
        let next = Arc::new(config);
        std::mem::replace(&mut *self.current.write(), next)
    }
}

/// Change-detection key for a fetched configuration document.
///
/// Compares structurally, so two documents differing only in object key
/// order are the same fingerprint.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigFingerprint(Value);

impl ConfigFingerprint {
    pub fn of(document: &Value) -> Self {
        Self(document.clone())
    }
}
