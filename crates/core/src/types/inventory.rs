//! Inventory snapshot types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::{ProductId, SubstoreId};

/// Availability of a single product within one substore's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAvailability {
    /// Upstream product identifier.
    pub product_id: ProductId,
    /// Whether the product can currently be ordered.
    pub available: bool,
}

impl ProductAvailability {
    /// Convenience constructor.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, available: bool) -> Self {
        Self {
            product_id: product_id.into(),
            available,
        }
    }
}

/// The last observed inventory, keyed by substore.
///
/// A substore absent from the map has never produced data. A product absent
/// from a substore's entry counts as unavailable. `BTreeMap` keeps the
/// serialized document and all iteration deterministic.
pub type InventorySnapshot = BTreeMap<SubstoreId, Vec<ProductAvailability>>;
