//! Warrantly Core - Shared types and date engine.
//!
//! This crate provides the types and pure functions used across all
//! Warrantly components:
//! - `backend` - Warranty lifecycle services (allocation, notifications)
//! - the HTTP layer and CLI tools built on top of them
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows
//! it to be used anywhere, including inside database mapping code and
//! front-end view models.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, and statuses
//! - [`dates`] - UTC-safe date-only arithmetic and warranty status
//!   classification

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod dates;
pub mod types;

pub use types::*;
