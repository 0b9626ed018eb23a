//! Shelfwatch Core - Shared domain types.
//!
//! This crate provides common types used across all Shelfwatch components:
//! - `poller` - Polls the upstream storefront and detects restocks
//! - `worker` - Delivers queued back-in-stock notifications
//! - `cli` - Command-line tools for migrations and one-off runs
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, validated emails and pincodes, catalog and
//!   inventory types, and the notification batch shapes shared between the
//!   poller (producer) and the worker (consumer)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
