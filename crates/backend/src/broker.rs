//! In-memory notification fan-out broker.
//!
//! Single-process, best-effort pub/sub. Two independent indexes map user
//! ids and store ids to the currently-open subscriber connections; one
//! physical connection may appear in both (a store-role account
//! subscribes as both a user and a store). Publishing writes the event to
//! every live match and nobody else - no queuing for offline subscribers,
//! no retroactive delivery, nothing durable beyond what the storage
//! collaborator already persisted.
//!
//! The broker holds no connection I/O of its own; it talks to the push
//! transport through the [`Connection`] trait. Writes are synchronous and
//! non-blocking (an SSE connection just enqueues into its channel), so a
//! stalled subscriber can never block the request that triggered the
//! notification.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use warrantly_core::{StoreId, UserId};

use crate::models::Notification;

/// Name of the framed event carrying a notification payload.
pub const NOTIFICATION_EVENT: &str = "notification";

/// The peer is gone; the write was dropped.
///
/// Publishing treats this as routine: the connection's own close handling
/// performs index cleanup, so the broker just skips the write.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("push connection closed")]
pub struct ConnectionClosed;

/// A live push connection, as the broker sees it.
///
/// One named, self-delimited event per call. Implementations must not
/// block: the publish path runs inside whatever request triggered the
/// notification.
pub trait Connection: Send + Sync + 'static {
    /// Write one framed event (event-type label plus JSON payload).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionClosed`] when the peer has gone away.
    fn write_event(&self, event: &str, payload: &serde_json::Value)
    -> Result<(), ConnectionClosed>;
}

struct Registration {
    token: u64,
    connection: Arc<dyn Connection>,
}

#[derive(Default)]
struct Indexes {
    by_user: HashMap<UserId, Vec<Registration>>,
    by_store: HashMap<StoreId, Vec<Registration>>,
}

impl Indexes {
    fn remove(&mut self, token: u64, user_id: Option<UserId>, store_id: Option<StoreId>) {
        if let Some(user_id) = user_id {
            prune(&mut self.by_user, user_id, token);
        }
        if let Some(store_id) = store_id {
            prune(&mut self.by_store, store_id, token);
        }
    }
}

fn prune<K: std::hash::Hash + Eq>(
    index: &mut HashMap<K, Vec<Registration>>,
    key: K,
    token: u64,
) {
    if let Some(list) = index.get_mut(&key) {
        list.retain(|registration| registration.token != token);
        if list.is_empty() {
            index.remove(&key);
        }
    }
}

/// The notification broker.
///
/// Cheap to clone; clones share the same indexes. Constructed once per
/// process and torn down with [`NotificationBroker::shutdown`].
#[derive(Clone, Default)]
pub struct NotificationBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Default)]
struct BrokerInner {
    indexes: Mutex<Indexes>,
    next_token: AtomicU64,
}

impl NotificationBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under whichever of `user_id` / `store_id`
    /// is present.
    ///
    /// The returned [`Subscription`] removes the connection from both
    /// indexes when dropped (or when [`Subscription::unsubscribe`] is
    /// called explicitly), so tying it to the connection's lifetime is
    /// all the cleanup a transport needs.
    pub fn subscribe(
        &self,
        user_id: Option<UserId>,
        store_id: Option<StoreId>,
        connection: Arc<dyn Connection>,
    ) -> Subscription {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);

        let mut indexes = self.lock_indexes();
        if let Some(user_id) = user_id {
            indexes.by_user.entry(user_id).or_default().push(Registration {
                token,
                connection: Arc::clone(&connection),
            });
        }
        if let Some(store_id) = store_id {
            indexes
                .by_store
                .entry(store_id)
                .or_default()
                .push(Registration { token, connection });
        }
        drop(indexes);

        debug!(?user_id, ?store_id, token, "subscriber registered");

        Subscription {
            inner: Arc::clone(&self.inner),
            token,
            user_id,
            store_id,
            active: AtomicBool::new(true),
        }
    }

    /// Push a notification to every live subscriber it addresses.
    ///
    /// Returns the number of writes performed. Zero matches is a normal
    /// outcome, not an error - most notifications have no live subscriber
    /// at publish time. Writes to closed connections are dropped; their
    /// subscriptions clean up via their own close path.
    pub fn publish(&self, notification: &Notification) -> usize {
        let payload = match serde_json::to_value(notification) {
            Ok(payload) => payload,
            Err(error) => {
                // Unreachable for our model types; don't lose the event
                // silently if it ever happens.
                tracing::warn!(%error, "notification not serializable, dropping publish");
                return 0;
            }
        };

        let targets: Vec<Arc<dyn Connection>> = {
            let indexes = self.lock_indexes();
            let users = notification
                .user_id
                .and_then(|id| indexes.by_user.get(&id))
                .into_iter()
                .flatten();
            let stores = notification
                .store_id
                .and_then(|id| indexes.by_store.get(&id))
                .into_iter()
                .flatten();
            users
                .chain(stores)
                .map(|registration| Arc::clone(&registration.connection))
                .collect()
        };

        let mut delivered = 0;
        for connection in targets {
            match connection.write_event(NOTIFICATION_EVENT, &payload) {
                Ok(()) => delivered += 1,
                Err(ConnectionClosed) => {
                    trace!(id = %notification.id, "skipped write to closed connection");
                }
            }
        }

        debug!(id = %notification.id, delivered, "notification published");
        delivered
    }

    /// Number of live registrations across both indexes.
    ///
    /// A connection registered as both user and store counts twice.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        let indexes = self.lock_indexes();
        indexes.by_user.values().map(Vec::len).sum::<usize>()
            + indexes.by_store.values().map(Vec::len).sum::<usize>()
    }

    /// Drop every registration. Subscribers see their streams end when
    /// their connections are closed by the transport on process shutdown.
    pub fn shutdown(&self) {
        let mut indexes = self.lock_indexes();
        let dropped = indexes.by_user.values().map(Vec::len).sum::<usize>()
            + indexes.by_store.values().map(Vec::len).sum::<usize>();
        indexes.by_user.clear();
        indexes.by_store.clear();
        drop(indexes);
        debug!(dropped, "notification broker shut down");
    }

    fn lock_indexes(&self) -> MutexGuard<'_, Indexes> {
        // Subscribe/publish never panic while holding the lock; if one
        // ever does, continuing with whatever state remains beats taking
        // the whole process down.
        self.inner
            .indexes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Handle for one registered subscriber.
///
/// Unsubscribes on drop; safe to call [`Subscription::unsubscribe`]
/// multiple times.
pub struct Subscription {
    inner: Arc<BrokerInner>,
    token: u64,
    user_id: Option<UserId>,
    store_id: Option<StoreId>,
    active: AtomicBool,
}

impl Subscription {
    /// Remove this connection from both indexes. Idempotent.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let mut indexes = self
            .inner
            .indexes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        indexes.remove(self.token, self.user_id, self.store_id);
        drop(indexes);
        debug!(token = self.token, "subscriber unregistered");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
