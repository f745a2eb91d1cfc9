//! Postgres-backed raw zone

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::{validate_identifier, RawRow, Warehouse};
use crate::error::Result;

pub struct PgWarehouse {
    pool: PgPool,
    schema: String,
}

impl PgWarehouse {
    /// Configure the pool without connecting; the first query opens a connection.
    pub fn connect_lazy(url: &str, schema: &str, max_connections: u32) -> Result<Self> {
        validate_identifier(schema)?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy(url)?;

        info!(schema, max_connections, "Warehouse pool configured");

        Ok(Self::from_pool(pool, schema))
    }

    pub fn from_pool(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    fn qualified(&self, table: &str) -> Result<String> {
        validate_identifier(&self.schema)?;
        validate_identifier(table)?;
        Ok(format!("{}.{}", self.schema, table))
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    #[instrument(skip(self))]
    async fn ensure_raw_table(&self, table: &str) -> Result<()> {
        let qualified = self.qualified(table)?;

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema))
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                source      TEXT        NOT NULL,
                ingested_at TIMESTAMPTZ NOT NULL,
                payload     JSONB       NOT NULL
            )
            "#,
            qualified
        ))
        .execute(&self.pool)
        .await?;

        debug!(table = %qualified, "Raw table ready");
        Ok(())
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn append(&self, table: &str, rows: Vec<RawRow>) -> Result<u64> {
        let insert = format!(
            "INSERT INTO {} (source, ingested_at, payload) VALUES ($1, $2, $3)",
            self.qualified(table)?
        );

        let mut tx = self.pool.begin().await?;
        let mut appended = 0u64;

        for row in &rows {
            appended += sqlx::query(&insert)
                .bind(&row.source)
                .bind(row.ingested_at)
                .bind(Json(&row.payload))
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;

        Ok(appended)
    }
}
