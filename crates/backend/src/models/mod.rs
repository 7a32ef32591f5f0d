//! Domain models for the warranty lifecycle core.

pub mod notification;
pub mod warranty;

pub use notification::{NewNotification, Notification};
pub use warranty::{
    CreateWarranty, CustomerDetails, ItemSpec, NewWarranty, NewWarrantyItem, Warranty,
    WarrantyItem, summarize_statuses,
};
