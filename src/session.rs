use crate::client::{ChatBackend, ConfigSource};
use crate::config::ConfigStore;
use crate::conversation::Conversation;
use crate::events::{self, EventSender, UiEvent};
use crate::reload::{HotReloadPoller, PollerState};
use crate::settings::{ConfigUpdate, Settings};
use parking_lot::Mutex;
use std::sync::Arc;

/// Conversation, settings and poller sharing one store and one event channel.
pub struct Session<C> {
    pub conversation: Conversation<C>,
    pub settings: Settings<C>,
    poller: Mutex<HotReloadPoller<C>>,
    events: EventSender,
}

impl<C: ChatBackend + ConfigSource + 'static> Session<C> {
    pub fn new(client: Arc<C>, events: EventSender) -> Self {
        let store = ConfigStore::default();
        Self {
            conversation: Conversation::new(Arc::clone(&client), store.clone(), events.clone()),
            settings: Settings::new(Arc::clone(&client), store.clone(), events.clone()),
            poller: Mutex::new(HotReloadPoller::new(client, store, events.clone())),
            events,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        self.settings.store()
    }

    /// Initial configuration load, then polling if the loaded configuration
    /// asks for it. A failed load leaves the defaults in place.
    pub async fn start(&self) {
        self.settings.load().await;
        self.settings.load_themes().await;
        events::emit(
            &self.events,
            UiEvent::ConfigReloaded {
                config: self.store().snapshot(),
            },
        );
        self.poller.lock().start();
    }

    /// Saves the settings form. A successful save can change the polling
    /// schedule, so the poller is restarted against the new snapshot.
    pub async fn save(&self, update: &ConfigUpdate) -> bool {
        let saved = self.settings.save(update).await;
        if saved {
            self.restart_polling();
        }
        saved
    }

    pub fn restart_polling(&self) {
        let mut poller = self.poller.lock();
        poller.stop();
        poller.start();
    }

    pub fn polling(&self) -> PollerState {
        self.poller.lock().state()
    }

    pub fn shutdown(&self) {
        self.poller.lock().stop();
    }
}
