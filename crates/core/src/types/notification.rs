//! Notification fan-out and queue payload types.

use serde::{Deserialize, Serialize};

use super::catalog::Product;
use super::email::Email;
use super::id::{SubstoreId, UserId};

/// Job type for restock notifications in the delivery queue.
///
/// The poller enqueues jobs under this name; the worker dispatches on it.
pub const JOB_PRODUCT_BACK_IN_STOCK: &str = "product_back_in_stock";

/// A user who asked to be notified about restocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedUser {
    /// User identifier.
    pub id: UserId,
    /// Display name, used in the email greeting.
    pub name: String,
    /// Delivery address.
    pub email: Email,
}

/// One tracking request joined with its user and product.
///
/// The fan-out step collects one of these per (user, product) pair that
/// matches a restocked product, then groups them per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingMatch {
    /// The user to notify.
    pub user: TrackedUser,
    /// The restocked product they track.
    pub product: Product,
    /// The substore the request is scoped to.
    pub substore_id: SubstoreId,
}

/// All restocked products for one user, delivered as a single email.
///
/// This is the delivery queue's job payload: the poller serializes it when
/// enqueueing and the worker deserializes it when rendering the email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationBatch {
    /// The recipient.
    pub user: TrackedUser,
    /// Products that just came back in stock for this user. Never empty.
    pub products: Vec<Product>,
}
