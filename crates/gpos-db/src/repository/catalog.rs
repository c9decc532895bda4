//! # Catalog Repository
//!
//! Local cache of the ERP catalog: units of measure, item prices per price
//! list and bin valuation rates. Lets the promotion form price rows while
//! the ERP is unreachable.
//!
//! ## Lookup Rules
//! ```text
//! item_price(item, list, Some(uom))  → exact (item, list, uom) row
//! item_price(item, list, None)       → unit-less row first, then any unit
//! valuation_rate(item, Some(uom))    → (item, stock_uom = uom) row
//! valuation_rate(item, None)         → any row for the item
//! ```
//!
//! A miss is `Ok(None)`, never an error.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use gpos_core::Money;

/// Repository for catalog cache operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Units of measure valid for an item, stock unit first.
    pub async fn item_uoms(&self, item_code: &str) -> DbResult<Vec<String>> {
        let uoms: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT uom FROM item_uoms
            WHERE item_code = ?1
            ORDER BY is_stock_uom DESC, uom ASC
            "#,
        )
        .bind(item_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(uoms)
    }

    /// Price of an item on a price list.
    pub async fn item_price(
        &self,
        item_code: &str,
        price_list: &str,
        uom: Option<&str>,
    ) -> DbResult<Option<Money>> {
        let cents: Option<i64> = match uom {
            Some(uom) => {
                sqlx::query_scalar(
                    r#"
                    SELECT price_list_rate FROM item_prices
                    WHERE item_code = ?1 AND price_list = ?2 AND uom = ?3
                    "#,
                )
                .bind(item_code)
                .bind(price_list)
                .bind(uom)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    r#"
                    SELECT price_list_rate FROM item_prices
                    WHERE item_code = ?1 AND price_list = ?2
                    ORDER BY (uom = '') DESC, uom ASC
                    LIMIT 1
                    "#,
                )
                .bind(item_code)
                .bind(price_list)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        debug!(
            item_code = %item_code,
            price_list = %price_list,
            uom = ?uom,
            hit = cents.is_some(),
            "Catalog price lookup"
        );

        Ok(cents.map(Money::from_cents))
    }

    /// Valuation rate of an item.
    pub async fn valuation_rate(&self, item_code: &str, uom: Option<&str>) -> DbResult<Option<Money>> {
        let cents: Option<i64> = match uom {
            Some(uom) => {
                sqlx::query_scalar(
                    r#"
                    SELECT valuation_rate FROM item_valuations
                    WHERE item_code = ?1 AND stock_uom = ?2
                    "#,
                )
                .bind(item_code)
                .bind(uom)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    r#"
                    SELECT valuation_rate FROM item_valuations
                    WHERE item_code = ?1
                    ORDER BY stock_uom ASC
                    LIMIT 1
                    "#,
                )
                .bind(item_code)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(cents.map(Money::from_cents))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts or replaces a unit of measure for an item.
    pub async fn upsert_uom(
        &self,
        item_code: &str,
        uom: &str,
        conversion_factor: f64,
        is_stock_uom: bool,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_uoms (item_code, uom, conversion_factor, is_stock_uom)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (item_code, uom) DO UPDATE SET
                conversion_factor = excluded.conversion_factor,
                is_stock_uom = excluded.is_stock_uom
            "#,
        )
        .bind(item_code)
        .bind(uom)
        .bind(conversion_factor)
        .bind(is_stock_uom)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts or replaces a price. `uom = None` stores a unit-less price.
    pub async fn upsert_price(
        &self,
        item_code: &str,
        price_list: &str,
        uom: Option<&str>,
        rate: Money,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_prices (item_code, price_list, uom, price_list_rate, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (item_code, price_list, uom) DO UPDATE SET
                price_list_rate = excluded.price_list_rate,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(item_code)
        .bind(price_list)
        .bind(uom.unwrap_or(""))
        .bind(rate.cents())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts or replaces a valuation rate.
    pub async fn upsert_valuation(&self, item_code: &str, stock_uom: &str, rate: Money) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_valuations (item_code, stock_uom, valuation_rate, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (item_code, stock_uom) DO UPDATE SET
                valuation_rate = excluded.valuation_rate,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(item_code)
        .bind(stock_uom)
        .bind(rate.cents())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use gpos_core::Money;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_uoms_stock_unit_first() {
        let db = db().await;
        let catalog = db.catalog();
        catalog.upsert_uom("COKE", "Box", 24.0, false).await.unwrap();
        catalog.upsert_uom("COKE", "Nos", 1.0, true).await.unwrap();
        catalog.upsert_uom("PEPSI", "Nos", 1.0, true).await.unwrap();

        assert_eq!(catalog.item_uoms("COKE").await.unwrap(), vec!["Nos", "Box"]);
        assert!(catalog.item_uoms("WATER").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_lookup_by_uom() {
        let db = db().await;
        let catalog = db.catalog();
        catalog
            .upsert_price("COKE", "Retail", None, Money::from_cents(350))
            .await
            .unwrap();
        catalog
            .upsert_price("COKE", "Retail", Some("Box"), Money::from_cents(7800))
            .await
            .unwrap();

        assert_eq!(
            catalog.item_price("COKE", "Retail", Some("Box")).await.unwrap(),
            Some(Money::from_cents(7800))
        );
        assert_eq!(
            catalog.item_price("COKE", "Retail", None).await.unwrap(),
            Some(Money::from_cents(350))
        );
        assert_eq!(catalog.item_price("COKE", "Retail", Some("Crate")).await.unwrap(), None);
        assert_eq!(catalog.item_price("COKE", "Wholesale", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_price_upsert_replaces() {
        let db = db().await;
        let catalog = db.catalog();
        catalog
            .upsert_price("COKE", "Retail", None, Money::from_cents(350))
            .await
            .unwrap();
        catalog
            .upsert_price("COKE", "Retail", None, Money::from_cents(375))
            .await
            .unwrap();

        assert_eq!(
            catalog.item_price("COKE", "Retail", None).await.unwrap(),
            Some(Money::from_cents(375))
        );
    }

    #[tokio::test]
    async fn test_valuation_lookup() {
        let db = db().await;
        let catalog = db.catalog();
        catalog
            .upsert_valuation("COKE", "Nos", Money::from_cents(210))
            .await
            .unwrap();

        assert_eq!(
            catalog.valuation_rate("COKE", Some("Nos")).await.unwrap(),
            Some(Money::from_cents(210))
        );
        assert_eq!(
            catalog.valuation_rate("COKE", None).await.unwrap(),
            Some(Money::from_cents(210))
        );
        assert_eq!(catalog.valuation_rate("COKE", Some("Box")).await.unwrap(), None);
    }
}
