//! Service Properties Store
//!
//! One JSON document per account, holding CORS rules, metrics, logging,
//! static-website, and delete-retention settings. Lives in the shared
//! metadata database.
//!
//! `get` never fails for an unknown account: it returns the documented
//! defaults. `upsert` implements the service's merge rule - supplied
//! top-level properties replace, absent ones are preserved, and an explicit
//! empty CORS list clears the stored rules while an absent CORS field keeps
//! them.

use crate::error::Result;
use crate::metadata::MetadataDb;
use crate::types::ServiceProperties;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

#[derive(Clone)]
pub struct ServicePropertiesStore {
    pool: SqlitePool,
}

impl ServicePropertiesStore {
    pub fn new(metadata: &MetadataDb) -> Self {
        Self {
            pool: metadata.pool(),
        }
    }

    /// Properties for `account`, or the defaults if none were ever stored.
    pub async fn get(&self, account: &str) -> Result<ServiceProperties> {
        let row = sqlx::query("SELECT document FROM service_properties WHERE account = ?")
            .bind(account)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(serde_json::from_str(row.try_get("document")?)?),
            None => Ok(ServiceProperties::defaults()),
        }
    }

    /// Merge `update` into the stored document and persist the result.
    /// Returns the merged document.
    pub async fn upsert(
        &self,
        account: &str,
        update: ServiceProperties,
    ) -> Result<ServiceProperties> {
        let mut current = self.get(account).await?;
        current.merge_from(update);

        let document = serde_json::to_string(&current)?;
        sqlx::query(
            r#"
            INSERT INTO service_properties (account, document)
            VALUES (?, ?)
            ON CONFLICT(account) DO UPDATE SET document = excluded.document
            "#,
        )
        .bind(account)
        .bind(document)
        .execute(&self.pool)
        .await?;

        Ok(current)
    }
}
