//! SQLite-backed catalog and collection store
//!
//! Uses the schema from `wellpath_common::db`. List-valued columns
//! (`target_symptoms`, `time_of_day`, ...) hold JSON arrays; prices hold
//! decimal strings. Unreadable cells are logged and treated as empty so one
//! bad row never blocks a whole catalog read.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;
use wellpath_common::db::init_database;
use wellpath_common::models::{
    CandidateItem, CatalogFile, CatalogProduct, Contraindication, ProtocolCategory, ProtocolItem, Severity,
};
use wellpath_common::{Error, Result};

use super::{CatalogStore, StoredRecommendation, UserCollectionStore};
use crate::dedup::item_key;
use crate::scoring::ScoredCandidate;

/// Counts from one catalog import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub candidates: usize,
    pub products: usize,
}

/// SQLite store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::new(init_database(db_path).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upsert every candidate and product of a catalog file
    ///
    /// Runs in one transaction. Existing rows keep their position in catalog
    /// order; their contraindications and prices are replaced.
    pub async fn import_catalog(&self, catalog: &CatalogFile) -> Result<ImportSummary> {
        let mut tx = self.pool.begin().await?;

        for candidate in &catalog.candidates {
            if candidate.id.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "candidate '{}' has an empty id",
                    candidate.name
                )));
            }

            sqlx::query(
                r#"
                INSERT INTO candidate_items (
                    id, name, item_type, description, frequency, time_of_day, target_symptoms,
                    is_active, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    item_type = excluded.item_type,
                    description = excluded.description,
                    frequency = excluded.frequency,
                    time_of_day = excluded.time_of_day,
                    target_symptoms = excluded.target_symptoms,
                    is_active = 1,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(&candidate.id)
            .bind(&candidate.name)
            .bind(candidate.item_type.as_str())
            .bind(&candidate.description)
            .bind(&candidate.frequency)
            .bind(serde_json::to_string(&candidate.time_of_day)?)
            .bind(serde_json::to_string(&candidate.target_symptoms)?)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM candidate_contraindications WHERE candidate_id = ?")
                .bind(&candidate.id)
                .execute(&mut *tx)
                .await?;

            for (position, contraindication) in candidate.contraindications.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO candidate_contraindications (candidate_id, position, condition, severity) VALUES (?, ?, ?, ?)",
                )
                .bind(&candidate.id)
                .bind(position as i64)
                .bind(&contraindication.condition)
                .bind(contraindication.severity.as_str())
                .execute(&mut *tx)
                .await?;
            }
        }

        for product in &catalog.products {
            if product.id.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "product '{}' has an empty id",
                    product.name
                )));
            }

            sqlx::query(
                r#"
                INSERT INTO catalog_products (id, name, brand, is_active, created_at, updated_at)
                VALUES (?, ?, ?, 1, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    brand = excluded.brand,
                    is_active = 1,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(&product.id)
            .bind(&product.name)
            .bind(&product.brand)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM product_prices WHERE product_id = ?")
                .bind(&product.id)
                .execute(&mut *tx)
                .await?;

            for (currency, amount) in &product.prices {
                // Keys differing only in case keep the first in map order ("USD" before "usd")
                sqlx::query(
                    "INSERT INTO product_prices (product_id, currency, amount) VALUES (?, ?, ?) \
                     ON CONFLICT(product_id, currency) DO NOTHING",
                )
                .bind(&product.id)
                .bind(currency.trim().to_uppercase())
                .bind(amount.to_string())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        let summary = ImportSummary {
            candidates: catalog.candidates.len(),
            products: catalog.products.len(),
        };
        tracing::info!(
            candidates = summary.candidates,
            products = summary.products,
            "Imported catalog"
        );

        Ok(summary)
    }

    /// Deactivate a catalog product so it drops out of matching and pricing
    pub async fn deactivate_product(&self, product_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE catalog_products SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND is_active = 1",
        )
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Decode a JSON column, falling back to the empty value
fn json_column<T: DeserializeOwned + Default>(raw: &str, column: &str, owner: &str) -> T {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(owner = %owner, column = %column, error = %e, "Unreadable JSON column, using empty value");
        T::default()
    })
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn active_candidates(&self) -> Result<Vec<CandidateItem>> {
        let mut contraindications: HashMap<String, Vec<Contraindication>> = HashMap::new();
        let rows = sqlx::query(
            "SELECT candidate_id, condition, severity FROM candidate_contraindications ORDER BY candidate_id, position",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let candidate_id: String = row.try_get("candidate_id")?;
            let severity: String = row.try_get("severity")?;
            contraindications
                .entry(candidate_id)
                .or_default()
                .push(Contraindication::new(row.try_get::<String, _>("condition")?, Severity::from(severity)));
        }

        let rows = sqlx::query(
            r#"
            SELECT id, name, item_type, description, frequency, time_of_day, target_symptoms
            FROM candidate_items
            WHERE is_active = 1
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let item_type: String = row.try_get("item_type")?;
            let time_of_day: String = row.try_get("time_of_day")?;
            let target_symptoms: String = row.try_get("target_symptoms")?;

            candidates.push(CandidateItem {
                name: row.try_get("name")?,
                item_type: item_type.into(),
                description: row.try_get("description")?,
                frequency: row.try_get("frequency")?,
                time_of_day: json_column(&time_of_day, "time_of_day", &id),
                target_symptoms: json_column::<BTreeSet<String>>(&target_symptoms, "target_symptoms", &id),
                contraindications: contraindications.remove(&id).unwrap_or_default(),
                id,
            });
        }

        tracing::debug!(count = candidates.len(), "Loaded active candidates");
        Ok(candidates)
    }

    async fn active_products(&self) -> Result<Vec<CatalogProduct>> {
        let mut prices: HashMap<String, Vec<(String, Decimal)>> = HashMap::new();
        let rows = sqlx::query("SELECT product_id, currency, amount FROM product_prices")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let product_id: String = row.try_get("product_id")?;
            let amount: String = row.try_get("amount")?;
            match Decimal::from_str(&amount) {
                Ok(amount) => prices
                    .entry(product_id)
                    .or_default()
                    .push((row.try_get("currency")?, amount)),
                Err(e) => tracing::warn!(
                    product_id = %product_id,
                    amount = %amount,
                    error = %e,
                    "Skipping unparseable price"
                ),
            }
        }

        let rows = sqlx::query("SELECT id, name, brand FROM catalog_products WHERE is_active = 1 ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            let mut product = CatalogProduct::new(
                row.try_get::<String, _>("id")?,
                row.try_get::<String, _>("name")?,
                row.try_get::<String, _>("brand")?,
            );
            for (currency, amount) in prices.remove(&product.id).unwrap_or_default() {
                product = product.with_price(&currency, amount);
            }
            products.push(product);
        }

        tracing::debug!(count = products.len(), "Loaded active products");
        Ok(products)
    }
}

#[async_trait]
impl UserCollectionStore for SqliteStore {
    async fn existing_keys(&self, user_id: &str) -> Result<HashSet<String>> {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT dedup_key FROM protocol_items WHERE user_id = ? AND is_active = 1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(keys.into_iter().collect())
    }

    async fn active_items(&self, user_id: &str) -> Result<Vec<ProtocolItem>> {
        let rows = sqlx::query(
            r#"
            SELECT guid, name, description, category, item_type, frequency, time_of_day,
                   product_id, candidate_id
            FROM protocol_items
            WHERE user_id = ? AND is_active = 1
            ORDER BY rowid
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let guid: String = row.try_get("guid")?;
            let category: String = row.try_get("category")?;
            let category = match ProtocolCategory::from_str(&category) {
                Ok(category) => category,
                Err(e) => {
                    tracing::warn!(guid = %guid, error = %e, "Skipping protocol item with unknown category");
                    continue;
                }
            };
            let item_type: String = row.try_get("item_type")?;
            let time_of_day: String = row.try_get("time_of_day")?;

            items.push(ProtocolItem {
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                category,
                item_type: item_type.into(),
                frequency: row.try_get("frequency")?,
                time_of_day: json_column(&time_of_day, "time_of_day", &guid),
                product_id: row.try_get("product_id")?,
                candidate_id: row.try_get("candidate_id")?,
            });
        }

        Ok(items)
    }

    async fn upsert_item(&self, user_id: &str, item: &ProtocolItem) -> Result<bool> {
        let key = item_key(item);
        let result = sqlx::query(
            r#"
            INSERT INTO protocol_items (
                guid, user_id, dedup_key, name, description, category, item_type, frequency,
                time_of_day, product_id, candidate_id, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            ON CONFLICT(user_id, dedup_key) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                category = excluded.category,
                frequency = excluded.frequency,
                time_of_day = excluded.time_of_day,
                product_id = COALESCE(excluded.product_id, protocol_items.product_id),
                candidate_id = excluded.candidate_id,
                is_active = 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE protocol_items.is_active = 0
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&key)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.category.as_str())
        .bind(item.item_type.as_str())
        .bind(&item.frequency)
        .bind(serde_json::to_string(&item.time_of_day)?)
        .bind(&item.product_id)
        .bind(&item.candidate_id)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        tracing::debug!(user_id = %user_id, key = %key, inserted, "Upserted protocol item");
        Ok(inserted)
    }

    async fn link_product(&self, user_id: &str, dedup_key: &str, product_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE protocol_items
            SET product_id = ?, updated_at = CURRENT_TIMESTAMP
            WHERE user_id = ? AND dedup_key = ? AND is_active = 1
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .bind(dedup_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_item(&self, user_id: &str, dedup_key: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE protocol_items
            SET is_active = 0, updated_at = CURRENT_TIMESTAMP
            WHERE user_id = ? AND dedup_key = ? AND is_active = 1
            "#,
        )
        .bind(user_id)
        .bind(dedup_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn replace_recommendations(&self, user_id: &str, recommendations: &[ScoredCandidate]) -> Result<Uuid> {
        let run_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let superseded = sqlx::query("UPDATE recommendations SET is_current = 0 WHERE user_id = ? AND is_current = 1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for scored in recommendations {
            sqlx::query(
                r#"
                INSERT INTO recommendations (
                    user_id, candidate_id, run_id, suitability, applicability, combined,
                    matched_symptoms, flagged_contraindications, priority_rank, is_current, generated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, CURRENT_TIMESTAMP)
                "#,
            )
            .bind(user_id)
            .bind(&scored.candidate.id)
            .bind(run_id.to_string())
            .bind(i64::from(scored.suitability))
            .bind(i64::from(scored.applicability))
            .bind(scored.combined)
            .bind(serde_json::to_string(&scored.matched_symptoms)?)
            .bind(serde_json::to_string(&scored.flagged_contraindications)?)
            .bind(scored.priority_rank as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            run_id = %run_id,
            count = recommendations.len(),
            superseded,
            "Stored recommendation run"
        );
        Ok(run_id)
    }

    async fn current_recommendations(&self, user_id: &str) -> Result<Vec<StoredRecommendation>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, candidate_id, suitability, applicability, combined,
                   matched_symptoms, flagged_contraindications, priority_rank
            FROM recommendations
            WHERE user_id = ? AND is_current = 1
            ORDER BY priority_rank
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut recommendations = Vec::with_capacity(rows.len());
        for row in rows {
            let run_id: String = row.try_get("run_id")?;
            let run_id = Uuid::parse_str(&run_id)
                .map_err(|e| Error::Internal(format!("invalid run_id '{}': {}", run_id, e)))?;
            let candidate_id: String = row.try_get("candidate_id")?;
            let matched: String = row.try_get("matched_symptoms")?;
            let flagged: String = row.try_get("flagged_contraindications")?;

            recommendations.push(StoredRecommendation {
                run_id,
                suitability: row.try_get::<i64, _>("suitability")?.clamp(0, 100) as u8,
                applicability: row.try_get::<i64, _>("applicability")?.clamp(0, 100) as u8,
                combined: row.try_get("combined")?,
                matched_symptoms: json_column(&matched, "matched_symptoms", &candidate_id),
                flagged_contraindications: json_column(&flagged, "flagged_contraindications", &candidate_id),
                priority_rank: row.try_get::<i64, _>("priority_rank")?.max(0) as usize,
                candidate_id,
            });
        }

        Ok(recommendations)
    }
}
