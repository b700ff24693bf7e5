//! Combines the draft, the sort selector and the ordered feed into one
//! published snapshot.
//!
//! All three inputs live behind a single lock and every change recomputes and
//! publishes the snapshot while that lock is held, so publication order always
//! matches input order. The feed only runs while the aggregator is active:
//! the first subscriber activates it, and after the last subscriber leaves a
//! teardown timer shuts it down once the grace period passes.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use serde::Serialize;
use shared::{
    domain::{Contact, SortSelector},
    error::ContactError,
};
use storage::ContactStore;
use tokio::{runtime::Handle, sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    draft::DraftState,
    feed::{FeedEmission, OrderedRecordFeed, Selection},
    ViewModelConfig,
};

/// What the rendering layer sees. Each change produces a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewSnapshot {
    pub contacts: Vec<Contact>,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub dialog_visible: bool,
    pub sort_selector: SortSelector,
}

#[derive(Debug, Clone, Default)]
struct Published {
    snapshot: Arc<ViewSnapshot>,
    fault: Option<ContactError>,
}

#[derive(Debug)]
struct FeedBatch {
    selection: Selection,
    contacts: Vec<Contact>,
}

struct Activation {
    id: u64,
    feed: Option<JoinHandle<()>>,
    teardown: Option<JoinHandle<()>>,
}

impl Activation {
    fn shutdown(self) {
        if let Some(feed) = self.feed {
            feed.abort();
        }
        if let Some(teardown) = self.teardown {
            teardown.abort();
        }
    }
}

#[derive(Default)]
struct Inputs {
    draft: DraftState,
    selection: Selection,
    batch: Option<FeedBatch>,
    fault: Option<ContactError>,
    subscribers: usize,
    attach_epoch: u64,
    activations: u64,
    activation: Option<Activation>,
}

impl Inputs {
    /// The contact list is always paired with the selector it was queried
    /// under. Until the feed answers a new selector, the previous pair stays.
    fn snapshot(&self) -> ViewSnapshot {
        let (contacts, sort_selector) = match &self.batch {
            Some(batch) => (batch.contacts.clone(), batch.selection.selector),
            None => (Vec::new(), self.selection.selector),
        };
        ViewSnapshot {
            contacts,
            first_name: self.draft.first_name.clone(),
            last_name: self.draft.last_name.clone(),
            phone_number: self.draft.phone_number.clone(),
            dialog_visible: self.draft.dialog_visible,
            sort_selector,
        }
    }
}

struct Shared<S: ContactStore> {
    feed: OrderedRecordFeed<S>,
    runtime: Handle,
    grace_period: Duration,
    inputs: Mutex<Inputs>,
    published: watch::Sender<Published>,
    selections: watch::Sender<Selection>,
}

impl<S: ContactStore> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, Inputs> {
        self.inputs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inputs: &Inputs) {
        if inputs.activation.is_none() {
            return;
        }
        self.published.send_replace(Published {
            snapshot: Arc::new(inputs.snapshot()),
            fault: inputs.fault.clone(),
        });
    }

    fn spawn_feed(self: &Arc<Self>, activation: u64) -> JoinHandle<()> {
        let shared = Arc::downgrade(self);
        self.feed.spawn(
            &self.runtime,
            activation,
            self.selections.subscribe(),
            move |emission| {
                if let Some(shared) = shared.upgrade() {
                    shared.apply_feed(emission);
                }
            },
        )
    }

    fn attach(self: &Arc<Self>) -> watch::Receiver<Published> {
        let mut inputs = self.lock();
        inputs.subscribers += 1;
        inputs.attach_epoch += 1;

        match inputs.activation.as_mut() {
            Some(activation) => {
                if let Some(teardown) = activation.teardown.take() {
                    teardown.abort();
                    debug!(activation = activation.id, "reattached within grace period");
                }
                if activation.feed.is_none() {
                    let id = activation.id;
                    activation.feed = Some(self.spawn_feed(id));
                    inputs.fault = None;
                    info!(activation = id, "restarting feed after fault");
                    self.publish(&inputs);
                }
            }
            None => {
                inputs.activations += 1;
                let id = inputs.activations;
                inputs.batch = None;
                inputs.fault = None;
                inputs.activation = Some(Activation {
                    id,
                    feed: Some(self.spawn_feed(id)),
                    teardown: None,
                });
                self.published.send_replace(Published::default());
                info!(activation = id, "view state activated");
            }
        }

        self.published.subscribe()
    }

    fn detach(self: &Arc<Self>) {
        let mut inputs = self.lock();
        inputs.subscribers = inputs.subscribers.saturating_sub(1);
        if inputs.subscribers > 0 {
            return;
        }

        let epoch = inputs.attach_epoch;
        let grace_period = self.grace_period;
        let Some(activation) = inputs.activation.as_mut() else {
            return;
        };
        let shared: Weak<Self> = Arc::downgrade(self);
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(grace_period).await;
            if let Some(shared) = shared.upgrade() {
                shared.teardown_if_idle(epoch);
            }
        });
        if let Some(previous) = activation.teardown.replace(timer) {
            previous.abort();
        }
        debug!(
            activation = activation.id,
            grace_ms = u64::try_from(grace_period.as_millis()).unwrap_or(u64::MAX),
            "last subscriber detached"
        );
    }

    fn teardown_if_idle(&self, epoch: u64) {
        let mut inputs = self.lock();
        if inputs.subscribers > 0 || inputs.attach_epoch != epoch {
            return;
        }
        let Some(activation) = inputs.activation.take() else {
            return;
        };
        let id = activation.id;
        activation.shutdown();
        inputs.batch = None;
        inputs.fault = None;
        info!(activation = id, "view state torn down after grace period");
    }

    fn apply_feed(&self, emission: FeedEmission) {
        let mut inputs = self.lock();
        let live = inputs
            .activation
            .as_ref()
            .is_some_and(|activation| activation.id == emission.activation);
        if !live {
            debug!(activation = emission.activation, "dropping emission from retired feed");
            return;
        }
        if emission.selection.generation != inputs.selection.generation {
            debug!(
                generation = emission.selection.generation,
                current = inputs.selection.generation,
                "dropping stale feed emission"
            );
            return;
        }

        match emission.result {
            Ok(contacts) => {
                inputs.batch = Some(FeedBatch {
                    selection: emission.selection,
                    contacts,
                });
                inputs.fault = None;
            }
            Err(err) => {
                let fault = ContactError::StoreReadFailed(format!("{err:#}"));
                warn!(error = %fault, "contact feed faulted");
                inputs.fault = Some(fault);
                if let Some(activation) = inputs.activation.as_mut() {
                    activation.feed = None;
                }
            }
        }
        self.publish(&inputs);
    }
}

impl<S: ContactStore> Drop for Shared<S> {
    fn drop(&mut self) {
        let inputs = self.inputs.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(activation) = inputs.activation.take() {
            activation.shutdown();
        }
    }
}

pub struct StateAggregator<S: ContactStore> {
    shared: Arc<Shared<S>>,
}

impl<S: ContactStore> StateAggregator<S> {
    /// Must be called from within a Tokio runtime; feed and teardown tasks are
    /// spawned onto it.
    pub fn new(store: Arc<S>, config: &ViewModelConfig) -> Self {
        Self::with_runtime(store, config, Handle::current())
    }

    pub fn with_runtime(store: Arc<S>, config: &ViewModelConfig, runtime: Handle) -> Self {
        let (published, _) = watch::channel(Published::default());
        let (selections, _) = watch::channel(Selection::default());
        Self {
            shared: Arc::new(Shared {
                feed: OrderedRecordFeed::new(store),
                runtime,
                grace_period: config.grace_period,
                inputs: Mutex::new(Inputs::default()),
                published,
                selections,
            }),
        }
    }

    /// Attaches a consumer. Dropping the returned subscription detaches it.
    pub fn subscribe(&self) -> SnapshotSubscription<S> {
        let rx = self.shared.attach();
        SnapshotSubscription {
            rx,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Latest published snapshot, without attaching.
    pub fn current(&self) -> Arc<ViewSnapshot> {
        Arc::clone(&self.shared.published.borrow().snapshot)
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().activation.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().subscribers
    }

    pub fn draft(&self) -> DraftState {
        self.shared.lock().draft.clone()
    }

    pub fn selection(&self) -> Selection {
        self.shared.lock().selection
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.shared.runtime
    }

    /// Applies `update` to the draft and republishes if anything changed.
    /// Returns whatever `update` returns.
    pub(crate) fn update_draft<R>(&self, update: impl FnOnce(&mut DraftState) -> R) -> R {
        let mut inputs = self.shared.lock();
        let before = inputs.draft.clone();
        let result = update(&mut inputs.draft);
        if inputs.draft != before {
            self.shared.publish(&inputs);
        }
        result
    }

    /// Switches the live query. Re-selecting the active selector is a no-op.
    pub(crate) fn select(&self, selector: SortSelector) -> Selection {
        let mut inputs = self.shared.lock();
        if inputs.selection.selector == selector {
            return inputs.selection;
        }
        inputs.selection = Selection {
            generation: inputs.selection.generation + 1,
            selector,
        };
        self.shared.selections.send_replace(inputs.selection);
        self.shared.publish(&inputs);
        inputs.selection
    }

    #[cfg(test)]
    pub(crate) fn inject(&self, emission: FeedEmission) {
        self.shared.apply_feed(emission);
    }

    #[cfg(test)]
    pub(crate) fn activation_id(&self) -> Option<u64> {
        self.shared.lock().activation.as_ref().map(|a| a.id)
    }
}

/// A consumer attachment. Holds the aggregator active while alive.
pub struct SnapshotSubscription<S: ContactStore> {
    rx: watch::Receiver<Published>,
    shared: Arc<Shared<S>>,
}

impl<S: ContactStore> SnapshotSubscription<S> {
    pub fn current(&self) -> Arc<ViewSnapshot> {
        Arc::clone(&self.rx.borrow().snapshot)
    }

    pub fn fault(&self) -> Option<ContactError> {
        self.rx.borrow().fault.clone()
    }

    /// Waits for the next published snapshot. A feed fault is returned as
    /// `StoreReadFailed`; dropping and re-subscribing restarts the query.
    pub async fn changed(&mut self) -> Result<Arc<ViewSnapshot>, ContactError> {
        self.rx.changed().await.map_err(|_| closed())?;
        let published = self.rx.borrow_and_update();
        match &published.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(Arc::clone(&published.snapshot)),
        }
    }

    /// Waits until a published snapshot satisfies `predicate` (checking the
    /// current one first) or the feed faults.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&ViewSnapshot) -> bool,
    ) -> Result<Arc<ViewSnapshot>, ContactError> {
        let published = self
            .rx
            .wait_for(|published| {
                published.fault.is_some() || predicate(published.snapshot.as_ref())
            })
            .await
            .map_err(|_| closed())?;
        match &published.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(Arc::clone(&published.snapshot)),
        }
    }
}

impl<S: ContactStore> Drop for SnapshotSubscription<S> {
    fn drop(&mut self) {
        self.shared.detach();
    }
}

fn closed() -> ContactError {
    ContactError::StoreReadFailed("view state closed".to_string())
}

#[cfg(test)]
#[path = "tests/aggregator_tests.rs"]
mod tests;
