use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::traits::CrawlerStorage;
use crate::types::*;

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn fingerprint_from_row(r: &PgRow) -> PageFingerprint {
    PageFingerprint {
        url: r.get("url"),
        content_hash: r.get("content_hash"),
        last_crawled: r.get("last_crawled"),
        last_modified: r.get("last_modified"),
        property_count: r.get::<i32, _>("property_count").max(0) as u32,
        change_detected: r.get("change_detected"),
        ai_enriched: r.get("ai_enriched"),
        last_ai_processed: r.get("last_ai_processed"),
    }
}

#[async_trait]
impl CrawlerStorage for PostgresStorage {
    type Error = sqlx::Error;

    // ========================================================================
    // FINGERPRINTS
    // ========================================================================

    async fn get_fingerprint(&self, url: &str) -> Result<Option<PageFingerprint>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT url, content_hash, last_crawled, last_modified, property_count,
                   change_detected, ai_enriched, last_ai_processed
            FROM page_fingerprints
            WHERE url = $1
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(fingerprint_from_row))
    }

    async fn save_fingerprint(&self, fingerprint: &PageFingerprint) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO page_fingerprints (
                url, content_hash, last_crawled, last_modified, property_count,
                change_detected, ai_enriched, last_ai_processed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (url) DO UPDATE SET
                content_hash = EXCLUDED.content_hash,
                last_crawled = EXCLUDED.last_crawled,
                last_modified = EXCLUDED.last_modified,
                property_count = EXCLUDED.property_count,
                change_detected = EXCLUDED.change_detected,
                ai_enriched = EXCLUDED.ai_enriched,
                last_ai_processed = EXCLUDED.last_ai_processed
            "#,
        )
        .bind(&fingerprint.url)
        .bind(&fingerprint.content_hash)
        .bind(fingerprint.last_crawled)
        .bind(fingerprint.last_modified)
        .bind(fingerprint.property_count.min(i32::MAX as u32) as i32)
        .bind(fingerprint.change_detected)
        .bind(fingerprint.ai_enriched)
        .bind(fingerprint.last_ai_processed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========================================================================
    // URL LEDGER
    // ========================================================================

    async fn get_processed_url(
        &self,
        normalized_url: &str,
    ) -> Result<Option<UrlLedgerEntry>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT url, normalized_url, status, processed_at, error_message
            FROM processed_urls
            WHERE normalized_url = $1
            "#,
        )
        .bind(normalized_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let status: String = r.get("status");
            UrlLedgerEntry {
                url: r.get("url"),
                normalized_url: r.get("normalized_url"),
                status: LedgerStatus::parse(&status),
                processed_at: r.get("processed_at"),
                error_message: r.get("error_message"),
            }
        }))
    }

    async fn save_processed_url(&self, entry: &UrlLedgerEntry) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO processed_urls (normalized_url, url, status, processed_at, error_message)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (normalized_url) DO UPDATE SET
                url = EXCLUDED.url,
                status = EXCLUDED.status,
                processed_at = EXCLUDED.processed_at,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(&entry.normalized_url)
        .bind(&entry.url)
        .bind(entry.status.as_str())
        .bind(entry.processed_at)
        .bind(entry.error_message.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========================================================================
    // PROPERTIES
    // ========================================================================

    async fn save_property(&self, property: &PropertyRecord) -> Result<(), Self::Error> {
        // Keep the first discovery time and never downgrade an enriched record
        sqlx::query(
            r#"
            INSERT INTO properties (
                normalized_url, url, domain, title, price, address, description,
                content_hash, confidence, enriched, enrichment, discovered_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (normalized_url) DO UPDATE SET
                url = EXCLUDED.url,
                title = EXCLUDED.title,
                price = EXCLUDED.price,
                address = EXCLUDED.address,
                description = EXCLUDED.description,
                content_hash = EXCLUDED.content_hash,
                confidence = EXCLUDED.confidence,
                enriched = properties.enriched OR EXCLUDED.enriched,
                enrichment = COALESCE(EXCLUDED.enrichment, properties.enrichment),
                updated_at = NOW()
            "#,
        )
        .bind(&property.normalized_url)
        .bind(&property.url)
        .bind(&property.domain)
        .bind(property.fields.title.as_deref())
        .bind(property.fields.price.as_deref())
        .bind(property.fields.address.as_deref())
        .bind(property.fields.description.as_deref())
        .bind(&property.content_hash)
        .bind(property.confidence)
        .bind(property.enriched)
        .bind(&property.enrichment)
        .bind(property.discovered_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    async fn cleanup_older_than(&self, age: Duration) -> Result<u64, Self::Error> {
        let seconds = age.as_secs_f64();
        let mut tx = self.pool.begin().await?;

        let ledger = sqlx::query(
            "DELETE FROM processed_urls WHERE processed_at < NOW() - make_interval(secs => $1)",
        )
        .bind(seconds)
        .execute(&mut *tx)
        .await?;

        let fingerprints = sqlx::query(
            "DELETE FROM page_fingerprints WHERE last_crawled < NOW() - make_interval(secs => $1)",
        )
        .bind(seconds)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ledger.rows_affected() + fingerprints.rows_affected())
    }
}
