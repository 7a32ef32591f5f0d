//! Warranty headers and items.
//!
//! A header is one purchase transaction issued by a store, identified by a
//! human-readable code unique per store. Each header covers one or more
//! items, each with its own serial (unique within the header, not
//! globally) and its own expiry date.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use warrantly_core::dates::classify;
use warrantly_core::{
    Email, StatusCount, StatusSummary, StoreId, UserId, WarrantyId, WarrantyItemId,
};

/// Customer identity attached to a warranty header.
///
/// The email is the linking key: when it matches a registered customer
/// account, `user_id` carries that account. Linkage is re-resolved by the
/// surrounding system if the email is later edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    /// Normalized customer email, if supplied.
    pub email: Option<Email>,
    /// Registered account matching the email, if any.
    pub user_id: Option<UserId>,
    /// Display name.
    pub name: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
}

/// One item of a creation request, before serials and dates are resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    /// Product name (required by the surrounding validation layer).
    pub product_name: String,
    /// Product model, if known.
    pub model: Option<String>,
    /// Caller-supplied serial; synthesized when absent or duplicated
    /// within the request.
    pub serial: Option<String>,
    /// Purchase date; defaults to today (UTC) when absent.
    pub purchase_date: Option<NaiveDate>,
    /// Coverage duration in months; used to derive the expiry date when
    /// no explicit expiry is given.
    pub duration_months: Option<i32>,
    /// Explicit expiry date; wins over `duration_months`.
    pub expiry_date: Option<NaiveDate>,
    /// What the warranty covers.
    pub coverage_note: Option<String>,
    /// Free-text note.
    pub note: Option<String>,
    /// References to uploaded images (opaque to this crate).
    #[serde(default)]
    pub images: Vec<String>,
}

/// A warranty-creation request as received from the handler layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateWarranty {
    /// The issuing store.
    pub store_id: StoreId,
    /// Customer identity for the header.
    pub customer: CustomerDetails,
    /// Items to cover; must not be empty.
    pub items: Vec<ItemSpec>,
}

/// A fully-resolved header ready for the atomic insert.
///
/// Produced by [`crate::warranties::WarrantyService`]: the code has been
/// proposed, every serial is unique within the header, and expiry dates
/// are pre-computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWarranty {
    /// The issuing store.
    pub store_id: StoreId,
    /// Proposed code; the store's `(store_id, code)` constraint is the
    /// sole authority on whether it is actually free.
    pub code: String,
    /// Customer identity.
    pub customer: CustomerDetails,
    /// Resolved items.
    pub items: Vec<NewWarrantyItem>,
}

/// A fully-resolved item ready for insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWarrantyItem {
    /// Product name.
    pub product_name: String,
    /// Product model.
    pub model: Option<String>,
    /// Resolved serial, unique within this header.
    pub serial: String,
    /// Purchase date (date-only, UTC).
    pub purchase_date: NaiveDate,
    /// Pre-computed expiry date, if derivable.
    pub expiry_date: Option<NaiveDate>,
    /// Coverage duration in months.
    pub duration_months: Option<i32>,
    /// Coverage duration in days, derived from the dates.
    pub duration_days: Option<i64>,
    /// What the warranty covers.
    pub coverage_note: Option<String>,
    /// Free-text note.
    pub note: Option<String>,
    /// Image references.
    pub images: Vec<String>,
}

/// A persisted warranty header with its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warranty {
    /// Storage-assigned id.
    pub id: WarrantyId,
    /// The issuing store.
    pub store_id: StoreId,
    /// Human-readable code, unique per store, immutable after creation.
    pub code: String,
    /// Customer identity.
    pub customer: CustomerDetails,
    /// Covered items.
    pub items: Vec<WarrantyItem>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A persisted warranty item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarrantyItem {
    /// Storage-assigned id.
    pub id: WarrantyItemId,
    /// Product name.
    pub product_name: String,
    /// Product model.
    pub model: Option<String>,
    /// Serial, unique within the parent header.
    pub serial: String,
    /// Purchase date.
    pub purchase_date: NaiveDate,
    /// Expiry date; `None` means open-ended coverage.
    pub expiry_date: Option<NaiveDate>,
    /// Coverage duration in months.
    pub duration_months: Option<i32>,
    /// Coverage duration in days.
    pub duration_days: Option<i64>,
    /// What the warranty covers.
    pub coverage_note: Option<String>,
    /// Free-text note.
    pub note: Option<String>,
    /// Image references.
    pub images: Vec<String>,
}

impl WarrantyItem {
    /// Derive this item's lifecycle status as of today (UTC).
    ///
    /// Status is never persisted; every read path calls this with the
    /// owning store's configured notice window.
    #[must_use]
    pub fn status(&self, notice_days: i64) -> StatusSummary {
        classify(self.expiry_date, notice_days)
    }
}

/// Count items per derived status, preserving first-seen order.
///
/// Used by dashboard views to render status filter chips.
#[must_use]
pub fn summarize_statuses<'a, I>(items: I, notice_days: i64) -> Vec<StatusCount>
where
    I: IntoIterator<Item = &'a WarrantyItem>,
{
    let mut counts: Vec<StatusCount> = Vec::new();
    for item in items {
        let code = item.status(notice_days).code;
        match counts.iter_mut().find(|c| c.code == code) {
            Some(entry) => entry.count += 1,
            None => counts.push(StatusCount { code, count: 1 }),
        }
    }
    counts
}
