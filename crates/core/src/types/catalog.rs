//! Catalog product mirror.

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// A product from the locally mirrored catalog.
///
/// The catalog is written by the web app; the tracker only reads it to put
/// names, links and prices into notification emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Upstream product identifier.
    pub id: ProductId,
    /// URL slug on the storefront (`/en/product/{alias}`).
    pub alias: String,
    /// Stock keeping unit.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Marketing description, when mirrored.
    pub description: Option<String>,
    /// Primary image URL, when mirrored.
    pub image: Option<String>,
    /// List price in whole rupees.
    pub usual_price: i32,
}
