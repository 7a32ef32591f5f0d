//! Notification records.
//!
//! A notification is addressed to a user id and/or a store id, persisted
//! once, then pushed to whichever subscribers are live at publish time.
//! Only the read flag ever changes after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warrantly_core::{NotificationId, StoreId, UserId};

/// Attributes for a notification about to be created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    /// Recipient user account, if any.
    pub user_id: Option<UserId>,
    /// Recipient store account, if any.
    pub store_id: Option<StoreId>,
    /// Short headline.
    pub title: String,
    /// Human-readable body.
    pub body: String,
    /// Arbitrary structured payload (e.g. `{"type": "store_profile_updated"}`).
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A persisted notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Storage-assigned id. Subscribers can re-fetch the record by this
    /// id, which is why publishing only ever happens after persistence.
    pub id: NotificationId,
    /// Recipient user account, if any.
    pub user_id: Option<UserId>,
    /// Recipient store account, if any.
    pub store_id: Option<StoreId>,
    /// Short headline.
    pub title: String,
    /// Human-readable body.
    pub body: String,
    /// Arbitrary structured payload.
    pub data: serde_json::Value,
    /// Whether the recipient has read it.
    pub read: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
