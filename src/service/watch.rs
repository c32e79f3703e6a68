//! Push-based watch subscriptions over a collection.
//!
//! A [`Subscription`] follows the informer lifecycle: it is opened with a
//! server-side filter, started, waited on until its initial state is
//! synchronized, then drained event by event until stopped. Events arrive
//! already classified as [`ChangeEvent`] variants.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::domain::{ChangeEvent, ListFilter, ResourceStore, StoreEvent};
use crate::error::GatewayError;

/// What a subscription watches: one collection, filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchTarget {
    /// Collection to watch.
    pub collection: String,
    /// Namespace and selector filter.
    pub filter: ListFilter,
}

/// Opens subscriptions.
#[async_trait]
pub trait WatchSource: Send + Sync + fmt::Debug {
    /// Opens a subscription for `target`. The subscription delivers
    /// nothing until [`Subscription::start`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the target cannot be watched.
    async fn subscribe(&self, target: WatchTarget) -> Result<Box<dyn Subscription>, GatewayError>;
}

/// One live subscription.
#[async_trait]
pub trait Subscription: Send + fmt::Debug {
    /// Begins the initial list and attaches to live changes.
    async fn start(&mut self);

    /// Waits for the initial synchronization. Returns `false` if `ctx` is
    /// cancelled first.
    async fn wait_synced(&mut self, ctx: &CancellationToken) -> bool;

    /// Next event, or `None` once the subscription is stopped or its
    /// source has gone away.
    async fn next_event(&mut self) -> Option<ChangeEvent>;

    /// Detaches from the source. Idempotent.
    fn stop(&mut self);
}

/// [`WatchSource`] backed by a [`ResourceStore`].
#[derive(Debug, Clone)]
pub struct StoreWatchSource {
    store: Arc<ResourceStore>,
}

impl StoreWatchSource {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: Arc<ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WatchSource for StoreWatchSource {
    async fn subscribe(&self, target: WatchTarget) -> Result<Box<dyn Subscription>, GatewayError> {
        if target.collection.is_empty() {
            return Err(GatewayError::InvalidCollection(target.collection));
        }
        Ok(Box::new(StoreSubscription {
            store: Arc::clone(&self.store),
            target,
            state: State::Idle,
        }))
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Running {
        backlog: VecDeque<ChangeEvent>,
        rx: broadcast::Receiver<StoreEvent>,
    },
    Stopped,
}

/// Subscription over a [`ResourceStore`]: the objects present at start are
/// replayed as [`ChangeEvent::Added`], followed by live changes.
#[derive(Debug)]
pub struct StoreSubscription {
    store: Arc<ResourceStore>,
    target: WatchTarget,
    state: State,
}

#[async_trait]
impl Subscription for StoreSubscription {
    async fn start(&mut self) {
        if !matches!(self.state, State::Idle) {
            return;
        }
        let (snapshot, rx) = self
            .store
            .snapshot_and_subscribe(&self.target.collection, &self.target.filter)
            .await;
        tracing::debug!(
            collection = %self.target.collection,
            initial = snapshot.len(),
            "subscription started"
        );
        self.state = State::Running {
            backlog: snapshot.into_iter().map(ChangeEvent::Added).collect(),
            rx,
        };
    }

    async fn wait_synced(&mut self, ctx: &CancellationToken) -> bool {
        if ctx.is_cancelled() {
            return false;
        }
        match self.state {
            State::Running { .. } => true,
            // Never started: nothing will ever sync.
            State::Idle | State::Stopped => {
                ctx.cancelled().await;
                false
            }
        }
    }

    async fn next_event(&mut self) -> Option<ChangeEvent> {
        let State::Running { backlog, rx } = &mut self.state else {
            return None;
        };
        if let Some(event) = backlog.pop_front() {
            return Some(event);
        }
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if event.collection == self.target.collection
                        && self.target.filter.matches(event.change.object())
                    {
                        return Some(event.change);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        collection = %self.target.collection,
                        skipped,
                        "subscription lagged behind event bus"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn stop(&mut self) {
        self.state = State::Stopped;
    }
}
