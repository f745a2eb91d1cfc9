//! Postgres warehouse integration tests
//!
//! Skipped unless DATABASE_URL points at a reachable Postgres instance.
//! Each test works in its own throwaway schema.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use firmo_pipeline::warehouse::{PgWarehouse, RawRow, Warehouse};
use serde_json::json;
use sqlx::PgPool;

async fn setup() -> Option<(PgPool, String)> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = match PgPool::connect(&url).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Failed to connect to DATABASE_URL: {}", e);
            return None;
        },
    };
    let schema = format!("firmo_test_{}", uuid::Uuid::new_v4().simple());
    Some((pool, schema))
}

async fn teardown(pool: &PgPool, schema: &str) {
    sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
        .execute(pool)
        .await
        .ok();
}

#[tokio::test]
async fn test_append_writes_raw_rows() {
    let Some((pool, schema)) = setup().await else {
        println!("Skipping test: DATABASE_URL not configured");
        return;
    };
    let warehouse = PgWarehouse::from_pool(pool.clone(), schema.clone());

    warehouse.ensure_raw_table("fortune_500").await.unwrap();
    // Idempotent
    warehouse.ensure_raw_table("fortune_500").await.unwrap();

    let row = RawRow {
        source: "fortune500".to_string(),
        ingested_at: Utc::now(),
        payload: json!({"items": [{"rank": 1}]}),
    };
    let appended = warehouse
        .append("fortune_500", vec![row.clone(), row])
        .await
        .unwrap();
    assert_eq!(appended, 2);

    let (count, source): (i64, String) = sqlx::query_as(&format!(
        "SELECT COUNT(*), MIN(source) FROM {}.fortune_500",
        schema
    ))
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 2);
    assert_eq!(source, "fortune500");

    teardown(&pool, &schema).await;
}

#[tokio::test]
async fn test_invalid_table_name_is_rejected() {
    let Some((pool, schema)) = setup().await else {
        println!("Skipping test: DATABASE_URL not configured");
        return;
    };
    let warehouse = PgWarehouse::from_pool(pool.clone(), schema.clone());

    assert!(warehouse.ensure_raw_table("fortune_500; drop").await.is_err());

    teardown(&pool, &schema).await;
}
