//! Storage collaborator interfaces.
//!
//! The relational layer lives outside this crate; these traits are the
//! whole surface the lifecycle core needs from it. The crucial piece of
//! the contract is [`StorageError::UniqueViolation`]: the store must
//! report which constraint an insert tripped, because the allocator's
//! retry loop reacts differently to a code collision (retry with a fresh
//! number) than to a serial collision (fatal for the request).

use warrantly_core::{NotificationId, StoreId, UserId};

use crate::models::{NewNotification, NewWarranty, Notification, Warranty};

/// The uniqueness constraint an insert violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// `(store_id, code)` on warranty headers.
    WarrantyCode,
    /// `(warranty_id, serial)` on items.
    ItemSerial,
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WarrantyCode => write!(f, "(store_id, code)"),
            Self::ItemSerial => write!(f, "(warranty_id, serial)"),
        }
    }
}

/// Errors surfaced by the storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An insert violated a uniqueness constraint.
    #[error("unique constraint violated on {0}")]
    UniqueViolation(Constraint),

    /// The referenced record does not exist.
    #[error("record not found")]
    NotFound,

    /// Anything else (connection failures, transaction aborts). These
    /// propagate to the caller unchanged; the lifecycle core never masks
    /// them.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Storage operations needed by the warranty allocator.
pub trait WarrantyStore: Send + Sync {
    /// The lexicographically-last existing code for this store matching
    /// `prefix`, or `None` when the store has no codes yet.
    ///
    /// This read is only the allocator's guess at the next sequence
    /// number; it need not be fresh. Correctness rests entirely on
    /// [`WarrantyStore::insert_warranty`] enforcing the code constraint.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the query fails.
    fn last_code(
        &self,
        store_id: StoreId,
        prefix: &str,
    ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Insert a header and all its items as one all-or-nothing operation.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UniqueViolation`] naming the tripped
    /// constraint, or [`StorageError::Backend`] for anything else. On any
    /// error, nothing was persisted.
    fn insert_warranty(
        &self,
        warranty: NewWarranty,
    ) -> impl Future<Output = Result<Warranty, StorageError>> + Send;
}

// Stores are commonly shared behind an Arc (one pool-backed store serving
// several services); delegate so `Arc<S>` satisfies the trait wherever `S`
// does.
impl<S: WarrantyStore> WarrantyStore for std::sync::Arc<S> {
    fn last_code(
        &self,
        store_id: StoreId,
        prefix: &str,
    ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send {
        (**self).last_code(store_id, prefix)
    }

    fn insert_warranty(
        &self,
        warranty: NewWarranty,
    ) -> impl Future<Output = Result<Warranty, StorageError>> + Send {
        (**self).insert_warranty(warranty)
    }
}

/// Storage operations needed by the notification service.
pub trait NotificationStore: Send + Sync {
    /// Persist a notification, assigning its id and timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the insert fails.
    fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> impl Future<Output = Result<Notification, StorageError>> + Send;

    /// Most recent notifications addressed to a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the query fails.
    fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Notification>, StorageError>> + Send;

    /// Most recent notifications addressed to a store, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the query fails.
    fn list_for_store(
        &self,
        store_id: StoreId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Notification>, StorageError>> + Send;

    /// Set the read flag on a notification.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the id does not exist, or
    /// [`StorageError::Backend`] if the update fails.
    fn mark_read(
        &self,
        id: NotificationId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<S: NotificationStore> NotificationStore for std::sync::Arc<S> {
    fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> impl Future<Output = Result<Notification, StorageError>> + Send {
        (**self).insert_notification(notification)
    }

    fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Notification>, StorageError>> + Send {
        (**self).list_for_user(user_id, limit)
    }

    fn list_for_store(
        &self,
        store_id: StoreId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Notification>, StorageError>> + Send {
        (**self).list_for_store(store_id, limit)
    }

    fn mark_read(
        &self,
        id: NotificationId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).mark_read(id)
    }
}
