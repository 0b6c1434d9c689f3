//! Account Store
//!
//! Provisioned storage accounts (name, shared key, enabled flag) on their
//! own SQLite file. The request path only ever reads it; writes happen
//! during administrative provisioning.

use crate::db;
use crate::error::Result;
use crate::types::Account;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS accounts (
    name TEXT PRIMARY KEY,
    key TEXT NOT NULL,
    enabled INTEGER NOT NULL
)";

pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let pool = db::open_file(path.as_ref()).await?;
        sqlx::query(SCHEMA).execute(&pool).await?;

        tracing::info!(path = %path.as_ref().display(), "Account store opened");

        Ok(Self { pool })
    }

    pub async fn open_in_memory() -> Result<Self> {
        let pool = db::open_memory().await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn get(&self, name: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT name, key, enabled FROM accounts WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .map(|row| -> Result<Account> {
                Ok(Account {
                    name: row.try_get("name")?,
                    key: row.try_get("key")?,
                    enabled: row.try_get::<i64, _>("enabled")? != 0,
                })
            })
            .transpose()?)
    }

    pub async fn upsert(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (name, key, enabled)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                key = excluded.key,
                enabled = excluded.enabled
            "#,
        )
        .bind(&account.name)
        .bind(&account.key)
        .bind(account.enabled as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query("SELECT name, key, enabled FROM accounts ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<Account> {
                Ok(Account {
                    name: row.try_get("name")?,
                    key: row.try_get("key")?,
                    enabled: row.try_get::<i64, _>("enabled")? != 0,
                })
            })
            .collect()
    }

    pub async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provision_and_look_up() {
        let store = AccountStore::open_in_memory().await.unwrap();

        let account = Account {
            name: "devstoreaccount1".to_string(),
            key: "Eby8vdM02xNOcqF==".to_string(),
            enabled: true,
        };
        store.upsert(&account).await.unwrap();

        let got = store.get("devstoreaccount1").await.unwrap().unwrap();
        assert_eq!(got, account);
        assert!(store.get("nope").await.unwrap().is_none());

        // Rotating the key overwrites in place.
        let rotated = Account {
            key: "NewKey==".to_string(),
            ..account
        };
        store.upsert(&rotated).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec![rotated]);
    }
}
