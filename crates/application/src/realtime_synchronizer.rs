use std::sync::{Arc, PoisonError, Weak};

use hookscope_domain::{FilterSpec, ViewState, WebhookChange, WebhookRecord, WebhookStats};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    RawWebhookChange, WebhookChangeFeed, WebhookQuery, WebhookRepository, WebhookSubscription,
};


/// Change-stream connection state of a live view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No subscription: never initialized, torn down, or the feed closed.
    #[default]
    Disconnected,
    /// Subscription requested but not acknowledged yet.
    Connecting,
    /// Subscription acknowledged; change events are applied.
    Connected,
}

impl ConnectionStatus {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// Point-in-time copy of a live view, published after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewSnapshot {
    /// Generation the view belongs to.
    pub epoch: u64,
    /// Connection state.
    pub status: ConnectionStatus,
    /// Filter the view is built from.
    pub filter: FilterSpec,
    /// Records, newest first.
    pub records: Vec<WebhookRecord>,
    /// Stats recomputed from `records`.
    pub stats: WebhookStats,
}

#[derive(Debug, Default)]
struct SyncState {
    epoch: u64,
    active: bool,
    filter: FilterSpec,
    view: ViewState,
    stats: WebhookStats,
    status: ConnectionStatus,
}

impl SyncState {
    fn refresh_stats(&mut self) {
        self.stats = WebhookStats::aggregate(self.view.records());
    }

    fn apply_raw(&mut self, change: RawWebhookChange) -> bool {
        let change =
            match WebhookChange::from_row_images(change.kind, change.old.as_ref(), change.new.as_ref())
            {
                Ok(change) => change,
                Err(error) => {
                    debug!(epoch = self.epoch, error = %error, "dropping malformed change event");
                    return false;
                }
            };

        let changed = self.view.apply(&self.filter, change);
        self.refresh_stats();
        changed
    }

    fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            epoch: self.epoch,
            status: self.status,
            filter: self.filter.clone(),
            records: self.view.records().to_vec(),
            stats: self.stats.clone(),
        }
    }
}

struct SyncShared {
    state: Mutex<SyncState>,
    snapshots: watch::Sender<ViewSnapshot>,
    // Only locked briefly, never while awaiting.
    pump: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SyncShared {
    fn replace_pump(&self, pump: Option<JoinHandle<()>>) {
        let previous = std::mem::replace(
            &mut *self.pump.lock().unwrap_or_else(PoisonError::into_inner),
            pump,
        );
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn stop_pump(&self) {
        self.replace_pump(None);
    }

    fn publish(&self, state: &SyncState) {
        self.snapshots.send_replace(state.snapshot());
    }
}

/// Keeps a filtered, capped view of webhook records in sync with the change feed.
///
/// All state lives behind one mutex, so change events and fetch completions
/// never interleave. Every initialize bumps the epoch; fetch results and
/// events tagged with an older epoch are discarded.
pub struct RealtimeSynchronizer {
    repository: Arc<dyn WebhookRepository>,
    change_feed: Arc<dyn WebhookChangeFeed>,
    shared: Arc<SyncShared>,
}

impl RealtimeSynchronizer {
    /// Creates an idle synchronizer.
    #[must_use]
    pub fn new(
        repository: Arc<dyn WebhookRepository>,
        change_feed: Arc<dyn WebhookChangeFeed>,
    ) -> Self {
        let (snapshots, _) = watch::channel(ViewSnapshot::default());

        Self {
            repository,
            change_feed,
            shared: Arc::new(SyncShared {
                state: Mutex::new(SyncState::default()),
                snapshots,
                pump: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Subscribes to the change feed, then loads the initial records for `filter`.
    ///
    /// Failures leave the previous records in place and are only logged.
    pub async fn initialize(&self, filter: FilterSpec) {
        let epoch = {
            let mut state = self.shared.state.lock().await;
            self.shared.stop_pump();
            state.epoch += 1;
            state.active = true;
            state.filter = filter.clone();
            state.status = ConnectionStatus::Connecting;
            self.shared.publish(&state);
            state.epoch
        };

        self.connect(epoch).await;
        self.load(epoch, &filter).await;
    }

    /// Applies one change event to the current view.
    ///
    /// Returns whether the records changed. Malformed events and events
    /// received while torn down are dropped.
    pub async fn on_change_event(&self, change: RawWebhookChange) -> bool {
        let mut state = self.shared.state.lock().await;
        if !state.active {
            return false;
        }

        let changed = state.apply_raw(change);
        self.shared.publish(&state);
        changed
    }

    /// Restarts the view under a new filter.
    pub async fn reconfigure(&self, filter: FilterSpec) {
        self.teardown().await;
        self.initialize(filter).await;
    }

    /// Releases the subscription and discards the view.
    pub async fn teardown(&self) {
        let mut state = self.shared.state.lock().await;
        self.shared.stop_pump();
        state.epoch += 1;
        state.active = false;
        state.view.clear();
        state.refresh_stats();
        state.status = ConnectionStatus::Disconnected;
        self.shared.publish(&state);
    }

    /// Returns the latest published view.
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    /// Returns a receiver notified after every view mutation.
    #[must_use]
    pub fn subscribe_snapshots(&self) -> watch::Receiver<ViewSnapshot> {
        self.shared.snapshots.subscribe()
    }

    async fn connect(&self, epoch: u64) {
        let subscription = self.change_feed.subscribe().await;

        let mut state = self.shared.state.lock().await;
        if state.epoch != epoch {
            debug!(epoch, "discarding subscription of a superseded view");
            return;
        }

        match subscription {
            Ok(subscription) => {
                state.status = ConnectionStatus::Connected;
                self.shared.replace_pump(Some(tokio::spawn(pump_changes(
                    Arc::downgrade(&self.shared),
                    epoch,
                    subscription,
                ))));
                info!(epoch, "change feed subscribed");
            }
            Err(error) => {
                state.status = ConnectionStatus::Disconnected;
                warn!(epoch, error = %error, "change feed subscription failed");
            }
        }
        self.shared.publish(&state);
    }

    async fn load(&self, epoch: u64, filter: &FilterSpec) {
        let result = self
            .repository
            .query_webhooks(WebhookQuery::from_filter_spec(filter))
            .await;

        let mut state = self.shared.state.lock().await;
        if state.epoch != epoch {
            debug!(epoch, current = state.epoch, "discarding stale initial fetch");
            return;
        }

        match result {
            Ok(records) => {
                state.view = ViewState::from_records(records);
                debug!(epoch, count = state.view.len(), "initial fetch applied");
            }
            Err(error) => {
                warn!(epoch, error = %error, "initial fetch failed, keeping previous records");
            }
        }
        state.refresh_stats();
        self.shared.publish(&state);
    }
}

impl Drop for RealtimeSynchronizer {
    fn drop(&mut self) {
        self.shared.stop_pump();
    }
}

async fn pump_changes(shared: Weak<SyncShared>, epoch: u64, mut subscription: WebhookSubscription) {
    while let Some(change) = subscription.next_change().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };

        let mut state = shared.state.lock().await;
        if state.epoch != epoch {
            return;
        }

        state.apply_raw(change);
        shared.publish(&state);
    }

    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut state = shared.state.lock().await;
    if state.epoch == epoch {
        // Detaches this task's own handle.
        drop(shared.pump.lock().unwrap_or_else(PoisonError::into_inner).take());
        state.status = ConnectionStatus::Disconnected;
        shared.publish(&state);
        warn!(epoch, "change feed closed");
    }
}
