//! Core types for Shelfwatch.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod catalog;
pub mod email;
pub mod id;
pub mod inventory;
pub mod notification;
pub mod pincode;
pub mod session;
pub mod substore;

pub use catalog::Product;
pub use email::{Email, EmailError};
pub use id::*;
pub use inventory::{InventorySnapshot, ProductAvailability};
pub use notification::{JOB_PRODUCT_BACK_IN_STOCK, NotificationBatch, TrackedUser, TrackingMatch};
pub use pincode::{Pincode, PincodeError};
pub use session::SessionCookies;
pub use substore::SubstoreIdentity;
