//! Substore identity.

use serde::{Deserialize, Serialize};

use super::id::SubstoreId;
use super::session::SessionCookies;

/// A fully resolved regional substore.
///
/// Produced by the pincode handshake and persisted in the substore
/// directory. The cookies are the session credentials last known to work
/// for this substore's inventory endpoint; they rotate on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstoreIdentity {
    /// Upstream substore identifier.
    pub substore_id: SubstoreId,
    /// Human-facing substore name (e.g. a state or region).
    pub substore_name: String,
    /// Session cookies bound to this substore.
    pub cookies: SessionCookies,
}
