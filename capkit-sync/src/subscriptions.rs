//! Module subscription management.
//!
//! For a bound workspace, one live subscription per module plus one for
//! the user profile. Each subscription's deliveries are forwarded into the
//! coordinator's event loop tagged with the session epoch; closing drops
//! the store-side guard (the listener is gone synchronously) and aborts the
//! forwarder.

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use capkit_core::{DocumentPath, ModuleName, UserId};
use capkit_store::{DocumentStore, SubscriptionGuard};

use crate::runtime::Event;

/// What a subscription delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionTarget {
    Module(ModuleName),
    Profile,
}

impl SubscriptionTarget {
    pub fn path(self, uid: &UserId) -> DocumentPath {
        match self {
            SubscriptionTarget::Module(module) => DocumentPath::module(uid, module),
            SubscriptionTarget::Profile => DocumentPath::profile(uid),
        }
    }

    /// All nine modules followed by the profile.
    pub fn all() -> impl Iterator<Item = SubscriptionTarget> {
        ModuleName::ALL
            .into_iter()
            .map(SubscriptionTarget::Module)
            .chain(std::iter::once(SubscriptionTarget::Profile))
    }
}

struct OpenSubscription {
    _guard: SubscriptionGuard,
    forwarder: AbortHandle,
}

impl Drop for OpenSubscription {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

#[derive(Default)]
pub(crate) struct SubscriptionManager {
    open: Vec<OpenSubscription>,
    delivered: HashSet<ModuleName>,
}

impl SubscriptionManager {
    /// Subscribe to every module and the profile of `uid`. Any previously
    /// open subscriptions are closed first.
    pub(crate) fn open_all(
        &mut self,
        store: &dyn DocumentStore,
        uid: &UserId,
        epoch: u64,
        events: &mpsc::UnboundedSender<Event>,
    ) {
        self.close_all();
        for target in SubscriptionTarget::all() {
            let path = target.path(uid);
            let (mut deliveries, guard) = store.subscribe(&path).into_parts();
            let events = events.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(delivery) = deliveries.recv().await {
                    let event = Event::Remote {
                        epoch,
                        target,
                        delivery,
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
            });
            tracing::debug!(path = %path, "subscribed");
            self.open.push(OpenSubscription {
                _guard: guard,
                forwarder: forwarder.abort_handle(),
            });
        }
    }

    pub(crate) fn close_all(&mut self) {
        if !self.open.is_empty() {
            tracing::debug!(count = self.open.len(), "closing subscriptions");
        }
        self.open.clear();
        self.delivered.clear();
    }

    pub(crate) fn record_delivery(&mut self, target: SubscriptionTarget) {
        if let SubscriptionTarget::Module(module) = target {
            self.delivered.insert(module);
        }
    }

    pub(crate) fn has_delivered(&self, module: ModuleName) -> bool {
        self.delivered.contains(&module)
    }

    pub(crate) fn len(&self) -> usize {
        self.open.len()
    }
}
