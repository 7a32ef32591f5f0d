//! Test doubles for the warranty lifecycle core.
//!
//! [`MemoryStore`] implements both storage collaborator traits over plain
//! in-memory state, enforcing the same uniqueness constraints the real
//! relational layer does: `(store_id, code)` across headers and
//! `(warranty_id, serial)` within one. [`RecordingConnection`] stands in
//! for a push connection and records every event written to it.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

use warrantly_backend::models::{
    NewNotification, NewWarranty, Notification, Warranty, WarrantyItem,
};
use warrantly_backend::storage::{Constraint, NotificationStore, StorageError, WarrantyStore};
use warrantly_core::{NotificationId, StoreId, UserId, WarrantyId, WarrantyItemId};

/// Install a tracing subscriber that writes to the test writer, filtered
/// by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory implementation of both storage traits.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    warranties: Vec<Warranty>,
    notifications: Vec<Notification>,
    next_warranty_id: i64,
    next_item_id: i64,
    next_notification_id: i64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted warranty headers.
    #[must_use]
    pub fn warranty_count(&self) -> usize {
        self.state.lock().expect("lock").warranties.len()
    }

    /// All codes persisted for one store, in insertion order.
    #[must_use]
    pub fn codes_for(&self, store_id: StoreId) -> Vec<String> {
        self.state
            .lock()
            .expect("lock")
            .warranties
            .iter()
            .filter(|w| w.store_id == store_id)
            .map(|w| w.code.clone())
            .collect()
    }

    /// Number of persisted notifications.
    #[must_use]
    pub fn notification_count(&self) -> usize {
        self.state.lock().expect("lock").notifications.len()
    }
}

impl WarrantyStore for MemoryStore {
    async fn last_code(
        &self,
        store_id: StoreId,
        prefix: &str,
    ) -> Result<Option<String>, StorageError> {
        let state = self.state.lock().expect("lock");
        // Lexicographic max, like the production `ORDER BY code DESC`
        // scan: past WR999 it ranks WR999 over WR1000, so tests stay
        // below four digits.
        Ok(state
            .warranties
            .iter()
            .filter(|w| w.store_id == store_id && w.code.starts_with(prefix))
            .map(|w| w.code.clone())
            .max())
    }

    async fn insert_warranty(&self, warranty: NewWarranty) -> Result<Warranty, StorageError> {
        let mut state = self.state.lock().expect("lock");

        if state
            .warranties
            .iter()
            .any(|w| w.store_id == warranty.store_id && w.code == warranty.code)
        {
            return Err(StorageError::UniqueViolation(Constraint::WarrantyCode));
        }

        for (i, item) in warranty.items.iter().enumerate() {
            if warranty.items.iter().take(i).any(|o| o.serial == item.serial) {
                return Err(StorageError::UniqueViolation(Constraint::ItemSerial));
            }
        }

        state.next_warranty_id += 1;
        let id = WarrantyId::new(state.next_warranty_id);
        let items = warranty
            .items
            .into_iter()
            .map(|item| {
                state.next_item_id += 1;
                WarrantyItem {
                    id: WarrantyItemId::new(state.next_item_id),
                    product_name: item.product_name,
                    model: item.model,
                    serial: item.serial,
                    purchase_date: item.purchase_date,
                    expiry_date: item.expiry_date,
                    duration_months: item.duration_months,
                    duration_days: item.duration_days,
                    coverage_note: item.coverage_note,
                    note: item.note,
                    images: item.images,
                }
            })
            .collect();

        let persisted = Warranty {
            id,
            store_id: warranty.store_id,
            code: warranty.code,
            customer: warranty.customer,
            items,
            created_at: Utc::now(),
        };
        state.warranties.push(persisted.clone());
        Ok(persisted)
    }
}

impl NotificationStore for MemoryStore {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StorageError> {
        let mut state = self.state.lock().expect("lock");
        state.next_notification_id += 1;
        let persisted = Notification {
            id: NotificationId::new(state.next_notification_id),
            user_id: notification.user_id,
            store_id: notification.store_id,
            title: notification.title,
            body: notification.body,
            data: notification.data,
            read: false,
            created_at: Utc::now(),
        };
        state.notifications.push(persisted.clone());
        Ok(persisted)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, StorageError> {
        let state = self.state.lock().expect("lock");
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == Some(user_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_for_store(
        &self,
        store_id: StoreId,
        limit: usize,
    ) -> Result<Vec<Notification>, StorageError> {
        let state = self.state.lock().expect("lock");
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.store_id == Some(store_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), StorageError> {
        let mut state = self.state.lock().expect("lock");
        match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.read = true;
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }
}

/// Push connection stub that records every event written to it.
#[derive(Default)]
pub struct RecordingConnection {
    events: Mutex<Vec<(String, serde_json::Value)>>,
    closed: AtomicBool,
}

impl RecordingConnection {
    /// Create an open connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, in order.
    #[must_use]
    pub fn received(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().expect("lock").clone()
    }

    /// Simulate the peer going away; subsequent writes fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl warrantly_backend::broker::Connection for RecordingConnection {
    fn write_event(
        &self,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), warrantly_backend::broker::ConnectionClosed> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(warrantly_backend::broker::ConnectionClosed);
        }
        self.events
            .lock()
            .expect("lock")
            .push((event.to_owned(), payload.clone()));
        Ok(())
    }
}
