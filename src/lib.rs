pub mod client;
pub mod config;
pub mod conversation;
pub mod events;
pub mod reload;
pub mod session;
pub mod settings;
pub mod theme;
pub mod types;

#[cfg(feature = "ui")]
pub mod ui;

pub use client::{ChatBackend, ChatError, ChatResult, ConfigSource, ServiceClient};
pub use config::{Config, ConfigStore};
pub use conversation::{Conversation, RequestState, SendOutcome};
pub use events::{NotifyLevel, UiEvent};
pub use reload::{HotReloadPoller, PollerState, TickOutcome};
pub use session::Session;
pub use settings::{ConfigUpdate, Settings, StreamingChoice};
pub use types::{ChatMessage, Role};
