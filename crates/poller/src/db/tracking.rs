//! Tracking request repository.
//!
//! Answers "who tracks this product in this substore" by joining tracks
//! against users and the mirrored product catalog. Queries use the runtime
//! sqlx API; rows are validated into domain types at the edge.

use sqlx::PgPool;

use shelfwatch_core::{
    Email, Product, ProductId, SubstoreId, TrackId, TrackedUser, TrackingMatch, UserId,
};

use super::RepositoryError;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for tracking request queries.
#[derive(Debug, sqlx::FromRow)]
struct TrackingRow {
    user_id: UserId,
    user_name: String,
    email: String,
    product_id: ProductId,
    alias: String,
    sku: String,
    product_name: String,
    description: Option<String>,
    image: Option<String>,
    usual_price: i32,
    substore_id: SubstoreId,
}

impl TryFrom<TrackingRow> for TrackingMatch {
    type Error = RepositoryError;

    fn try_from(row: TrackingRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            user: TrackedUser {
                id: row.user_id,
                name: row.user_name,
                email,
            },
            product: Product {
                id: row.product_id,
                alias: row.alias,
                sku: row.sku,
                name: row.product_name,
                description: row.description,
                image: row.image,
                usual_price: row.usual_price,
            },
            substore_id: row.substore_id,
        })
    }
}

const TRACKING_COLUMNS: &str = r"
    u.id AS user_id, u.name AS user_name, u.email,
    p.id AS product_id, p.alias, p.sku, p.name AS product_name,
    p.description, p.image, p.usual_price,
    t.substore_id
";

// =============================================================================
// Repository
// =============================================================================

/// Repository for tracking request reads.
pub struct TrackingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TrackingRepository<'a> {
    /// Create a new tracking repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All tracking requests for a product within a substore, joined with
    /// user and product records, ordered by user id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a row holds an invalid
    /// email address.
    pub async fn list_tracking_requests(
        &self,
        substore_id: &SubstoreId,
        product_id: &ProductId,
    ) -> Result<Vec<TrackingMatch>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {TRACKING_COLUMNS}
            FROM tracks t
            JOIN users u ON u.id = t.user_id
            JOIN products p ON p.id = t.product_id
            WHERE t.substore_id = $1 AND t.product_id = $2
            ORDER BY u.id
            "
        );
        let rows = sqlx::query_as::<_, TrackingRow>(&sql)
            .bind(substore_id)
            .bind(product_id)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// A single tracking request by id, joined the same way.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row holds an invalid
    /// email address.
    pub async fn get_tracking_request(
        &self,
        track_id: &TrackId,
    ) -> Result<Option<TrackingMatch>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {TRACKING_COLUMNS}
            FROM tracks t
            JOIN users u ON u.id = t.user_id
            JOIN products p ON p.id = t.product_id
            WHERE t.id = $1
            "
        );
        let row = sqlx::query_as::<_, TrackingRow>(&sql)
            .bind(track_id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }
}
