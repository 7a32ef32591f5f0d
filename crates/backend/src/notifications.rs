//! Persist-then-publish notification service.
//!
//! The composition the rest of the system calls: a notification is
//! persisted first, and only the persisted row (with its storage-assigned
//! id and timestamp) is handed to the broker. A subscriber therefore
//! never receives an event it cannot re-fetch by id.

use tracing::{debug, instrument};

use warrantly_core::{NotificationId, StoreId, UserId};

use crate::broker::NotificationBroker;
use crate::models::{NewNotification, Notification};
use crate::storage::{NotificationStore, StorageError};

/// Notification service, generic over the storage collaborator.
pub struct NotificationService<S> {
    store: S,
    broker: NotificationBroker,
}

impl<S: NotificationStore> NotificationService<S> {
    /// Create a service publishing through the given broker.
    pub const fn new(store: S, broker: NotificationBroker) -> Self {
        Self { store, broker }
    }

    /// The broker this service publishes through. Transports register
    /// their subscriber connections against it.
    #[must_use]
    pub const fn broker(&self) -> &NotificationBroker {
        &self.broker
    }

    /// Persist a notification, then push it to live subscribers.
    ///
    /// Zero live subscribers is a normal outcome. A storage failure
    /// propagates unchanged and nothing is published.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the insert fails.
    #[instrument(skip(self, attrs), fields(user_id = ?attrs.user_id, store_id = ?attrs.store_id))]
    pub async fn create_and_publish(
        &self,
        attrs: NewNotification,
    ) -> Result<Notification, StorageError> {
        let saved = self.store.insert_notification(attrs).await?;
        let delivered = self.broker.publish(&saved);
        debug!(id = %saved.id, delivered, "notification persisted and published");
        Ok(saved)
    }

    /// Most recent notifications for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, StorageError> {
        self.store.list_for_user(user_id, limit).await
    }

    /// Most recent notifications for a store, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the query fails.
    pub async fn list_for_store(
        &self,
        store_id: StoreId,
        limit: usize,
    ) -> Result<Vec<Notification>, StorageError> {
        self.store.list_for_store(store_id, limit).await
    }

    /// Mark a notification as read. The read flag is the only mutable
    /// field on a notification.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] for an unknown id.
    pub async fn mark_read(&self, id: NotificationId) -> Result<(), StorageError> {
        self.store.mark_read(id).await
    }
}
