//! Warrantly Backend - the warranty-record lifecycle core.
//!
//! This crate implements the three pieces of the system with real
//! engineering content, behind narrow collaborator interfaces:
//!
//! - [`warranties`] - collision-safe allocation of human-readable warranty
//!   codes and item serials, with expiry pre-computation, executed as one
//!   atomic insert against the storage collaborator
//! - [`broker`] - the in-memory notification fan-out broker, pushing
//!   framed events to live subscriber connections
//! - [`notifications`] - persist-then-publish composition on top of the
//!   broker
//!
//! Storage (the relational layer) and the push transport are consumed as
//! traits ([`storage::WarrantyStore`], [`storage::NotificationStore`],
//! [`broker::Connection`]); this crate never touches a database or a
//! socket directly. An axum Server-Sent-Events adapter for the
//! `Connection` seam lives in [`sse`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod broker;
pub mod codes;
pub mod error;
pub mod models;
pub mod notifications;
pub mod sse;
pub mod storage;
pub mod warranties;

pub use broker::{Connection, NotificationBroker, Subscription};
pub use error::WarrantyError;
pub use notifications::NotificationService;
pub use warranties::{AllocatorOptions, WarrantyService};
