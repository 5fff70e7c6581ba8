use crate::client::ConfigSource;
use crate::config::{Config, ConfigFingerprint, ConfigStore};
use crate::events::{self, EventSender, UiEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Stopped,
    Running(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// First successful fetch; recorded, nothing applied.
    Baseline,
    Unchanged,
    /// The store now holds the fetched document. `schedule_changed` is set
    /// when its `hotReload` section differs from the one it replaced.
    Reloaded { schedule_changed: bool },
    /// Fetch or parse failed; the current snapshot was kept.
    Failed,
}

/// Change detection shared between the poller handle and its timer task.
struct ConfigWatcher<S> {
    source: Arc<S>,
    store: ConfigStore,
    events: EventSender,
    last_seen: Mutex<Option<ConfigFingerprint>>,
}

impl<S: ConfigSource> ConfigWatcher<S> {
    async fn tick(&self) -> TickOutcome {
        let document = match self.source.fetch_config().await {
            Ok(document) => document,
            Err(err) => {
                warn!("hot reload: config fetch failed: {}", err);
                return TickOutcome::Failed;
            }
        };

        let fingerprint = ConfigFingerprint::of(&document);
        {
            let mut last_seen = self.last_seen.lock();
            match last_seen.as_ref() {
                None => {
                    *last_seen = Some(fingerprint);
                    debug!("hot reload: baseline recorded");
                    return TickOutcome::Baseline;
                }
                Some(previous) if *previous == fingerprint => return TickOutcome::Unchanged,
                Some(_) => *last_seen = Some(fingerprint),
            }
        }

        let config = match Config::from_value(&document) {
            Ok(config) => config,
            Err(err) => {
                warn!("hot reload: ignoring unreadable config: {}", err);
                return TickOutcome::Failed;
            }
        };

        info!("configuration changed, reloading");
        let previous = self.store.replace(config);
        let current = self.store.snapshot();
        let schedule_changed = previous.hot_reload != current.hot_reload;
        events::emit(&self.events, UiEvent::ConfigReloaded { config: current });
        TickOutcome::Reloaded { schedule_changed }
    }
}

/// Polls `/api/config` and swaps the store when the document changes.
///
/// The first successful fetch only records a baseline.
pub struct HotReloadPoller<S> {
    watcher: Arc<ConfigWatcher<S>>,
    state: Arc<Mutex<PollerState>>,
    cancel: Option<CancellationToken>,
}

impl<S: ConfigSource + 'static> HotReloadPoller<S> {
    pub fn new(source: Arc<S>, store: ConfigStore, events: EventSender) -> Self {
        Self {
            watcher: Arc::new(ConfigWatcher {
                source,
                store,
                events,
                last_seen: Mutex::new(None),
            }),
            state: Arc::new(Mutex::new(PollerState::Stopped)),
            cancel: None,
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state.lock()
    }

    /// Starts polling if the current configuration enables hot reload.
    /// Does nothing when disabled or already running. Must be called inside
    /// a tokio runtime.
    pub fn start(&mut self) {
        if matches!(self.state(), PollerState::Running(_)) {
            return;
        }
        let Some(period) = self.watcher.store.snapshot().reload_schedule() else {
            debug!("hot reload disabled, poller not started");
            return;
        };
        if let Some(stale) = self.cancel.take() {
            stale.cancel();
        }

        let token = CancellationToken::new();
        *self.state.lock() = PollerState::Running(period);
        info!("hot reload polling every {:?}", period);
        tokio::spawn(run(
            Arc::clone(&self.watcher),
            Arc::clone(&self.state),
            period,
            token.clone(),
        ));
        self.cancel = Some(token);
    }

    /// Cancels the pending timer. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
            debug!("hot reload poller stopped");
        }
        *self.state.lock() = PollerState::Stopped;
    }

    /// Runs one poll cycle immediately, outside the timer.
    pub async fn tick(&self) -> TickOutcome {
        self.watcher.tick().await
    }
}

impl<S> Drop for HotReloadPoller<S> {
    fn drop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

async fn run<S: ConfigSource>(
    watcher: Arc<ConfigWatcher<S>>,
    state: Arc<Mutex<PollerState>>,
    mut period: Duration,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = watcher.tick() => outcome,
        };

        if outcome != (TickOutcome::Reloaded { schedule_changed: true }) {
            continue;
        }
        match watcher.store.snapshot().reload_schedule() {
            None => {
                info!("hot reload disabled by new configuration");
                *state.lock() = PollerState::Stopped;
                break;
            }
            Some(next) => {
                if next != period {
                    info!("hot reload interval changed to {:?}", next);
                }
                period = next;
                ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                *state.lock() = PollerState::Running(period);
            }
        }
    }
}
