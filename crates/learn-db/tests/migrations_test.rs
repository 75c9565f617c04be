//! Integration tests for the embedded migrations.

use sqlx::Row;

use learn_db::pool;
use learn_test_utils::{create_test_db, drop_test_db};

#[tokio::test]
async fn migrations_create_both_tables() {
    let (pool, db_name) = create_test_db().await;

    let rows = sqlx::query(
        "SELECT tablename::text AS name FROM pg_tables \
         WHERE schemaname = 'public' AND tablename <> '_sqlx_migrations' \
         ORDER BY tablename",
    )
    .fetch_all(&pool)
    .await
    .expect("listing tables should succeed");

    let names: Vec<String> = rows.iter().map(|r| r.get("name")).collect();
    assert_eq!(names, vec!["chapters", "learning_plans"]);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (pool, db_name) = create_test_db().await;

    // create_test_db already ran them once.
    pool::run_migrations(&pool)
        .await
        .expect("re-running migrations should be a no-op");

    let counts = pool::table_counts(&pool).await.expect("table_counts");
    assert_eq!(
        counts,
        vec![("learning_plans".to_string(), 0), ("chapters".to_string(), 0)]
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn status_check_constraint_rejects_unknown_values() {
    let (pool, db_name) = create_test_db().await;

    let result = sqlx::query(
        "INSERT INTO learning_plans (topic, status) VALUES ('x', 'finished')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "unknown status should violate CHECK");

    pool.close().await;
    drop_test_db(&db_name).await;
}
