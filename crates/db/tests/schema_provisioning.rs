//! Integration tests for runtime schema provisioning.
//!
//! - Registry and sample relations are created on demand
//! - Provisioning is idempotent and convergent under concurrent callers
//! - Each sample relation carries exactly one descending `ts` index

use fleetwatch_core::identifier::TableName;
use fleetwatch_db::schema;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn relation_count(pool: &PgPool, name: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = $1",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn index_defs(pool: &PgPool, table: &str) -> Vec<(String, String)> {
    sqlx::query_as(
        "SELECT indexname, indexdef FROM pg_indexes \
         WHERE schemaname = current_schema() AND tablename = $1 AND indexname LIKE 'idx_%' \
         ORDER BY indexname",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = false)]
async fn registry_is_created_with_unique_table_name(pool: PgPool) {
    schema::ensure_registry(&pool).await.unwrap();
    schema::ensure_registry(&pool).await.unwrap();
    assert_eq!(relation_count(&pool, schema::REGISTRY_TABLE).await, 1);

    let unique: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pg_indexes \
         WHERE tablename = 'machine_registry' AND indexdef LIKE 'CREATE UNIQUE INDEX%(table_name)'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(unique, 1);
}

#[sqlx::test(migrations = false)]
async fn sample_table_provisioning_is_idempotent(pool: PgPool) {
    let table = TableName::derive("alpha", "lab1");

    schema::ensure_sample_table(&pool, &table).await.unwrap();
    schema::ensure_sample_table(&pool, &table).await.unwrap();

    assert_eq!(relation_count(&pool, table.as_str()).await, 1);
    let indexes = index_defs(&pool, table.as_str()).await;
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].0, table.ts_index_name());
    assert!(indexes[0].1.contains("ts DESC"), "got {}", indexes[0].1);
}

#[sqlx::test(migrations = false)]
async fn concurrent_provisioning_converges(pool: PgPool) {
    let table = TableName::derive("beta", "lab2");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let table = table.clone();
        handles.push(tokio::spawn(async move {
            schema::ensure_sample_table(&pool, &table).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(relation_count(&pool, table.as_str()).await, 1);
    assert_eq!(index_defs(&pool, table.as_str()).await.len(), 1);
}

#[sqlx::test(migrations = false)]
async fn long_names_sharing_a_prefix_each_get_an_index(pool: PgPool) {
    let shared = "rack".repeat(11);
    let first = TableName::derive(&shared, "hall_a");
    let second = TableName::derive(&shared, "hall_b");

    schema::ensure_sample_table(&pool, &first).await.unwrap();
    schema::ensure_sample_table(&pool, &second).await.unwrap();

    for table in [&first, &second] {
        let indexes = index_defs(&pool, table.as_str()).await;
        assert_eq!(indexes.len(), 1, "{table}");
        assert_eq!(indexes[0].0, table.ts_index_name());
    }
    assert_ne!(first.ts_index_name(), second.ts_index_name());
}
