//! Warranty lifecycle status.
//!
//! A warranty item's status is never stored; it is recomputed from the
//! item's expiry date and the owning store's notice window on every read.
//! See [`crate::dates::classify`] for the derivation.

use serde::{Deserialize, Serialize};

/// Fallback notice window (days before expiry) for stores that have not
/// configured one on their profile. Callers pass the window explicitly;
/// nothing consults this constant implicitly.
pub const DEFAULT_NOTICE_DAYS: i64 = 14;

/// Lifecycle status of a warranty item, derived at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WarrantyStatus {
    /// Covered, expiry more than the notice window away (or no expiry set).
    #[default]
    Active,
    /// Covered, but expiring within the notice window.
    NearingExpiration,
    /// Expiry date has passed.
    Expired,
}

impl std::fmt::Display for WarrantyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::NearingExpiration => write!(f, "nearing_expiration"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for WarrantyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "nearing_expiration" => Ok(Self::NearingExpiration),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("invalid warranty status: {s}")),
        }
    }
}

/// A derived status plus the signed day count that produced it.
///
/// `days_left` is `None` when the item has no expiry date (status is then
/// always [`WarrantyStatus::Active`]), and negative once expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    /// The derived status code.
    pub code: WarrantyStatus,
    /// Whole days until expiry; negative when past, `None` when no expiry.
    pub days_left: Option<i64>,
}

impl StatusSummary {
    /// Summary for an item with no expiry date.
    #[must_use]
    pub const fn open_ended() -> Self {
        Self {
            code: WarrantyStatus::Active,
            days_left: None,
        }
    }
}

/// Count of items per derived status, for dashboard summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    /// The status being counted.
    pub code: WarrantyStatus,
    /// Number of items with this status.
    pub count: usize,
}
