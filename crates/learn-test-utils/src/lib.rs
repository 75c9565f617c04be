//! Shared test utilities for expresslearn integration tests.
//!
//! Every test gets a freshly migrated database inside one PostgreSQL server
//! shared by the whole test binary. The server is either:
//! - the one named by **`EXPRESSLEARN_TEST_PG_URL`** (CI service container,
//!   local Postgres), or
//! - a container started on first use via testcontainers.
//!
//! Seeding helpers build plans and outlines through the real query layer so
//! tests exercise the same SQL as production code.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use learn_db::models::{Chapter, Plan, PlanMode};
use learn_db::pool;
use learn_db::queries::chapters::{self, OutlineChapter};
use learn_db::queries::plans::{self, NewPlan};

struct SharedPg {
    base_url: String,
    /// Held to keep the container alive. `None` for an external server.
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<SharedPg> = OnceCell::const_new();

async fn init_shared_pg() -> SharedPg {
    if let Ok(url) = std::env::var("EXPRESSLEARN_TEST_PG_URL") {
        return SharedPg {
            base_url: url.trim_end_matches('/').to_owned(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("16")
        .start()
        .await
        .expect("failed to start PostgreSQL container");

    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");

    SharedPg {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Server root URL (no database name) of the shared PostgreSQL.
pub async fn pg_url() -> &'static str {
    &SHARED_PG.get_or_init(init_shared_pg).await.base_url
}

async fn maintenance_pool(base_url: &str) -> PgPool {
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&format!("{base_url}/postgres"))
        .await
        .expect("failed to connect to maintenance database")
}

/// Create a uniquely named database with migrations applied.
///
/// Returns `(pool, db_name)`; pass `db_name` to [`drop_test_db`] when done.
pub async fn create_test_db() -> (PgPool, String) {
    let base_url = pg_url().await;

    let db_name = format!("learn_test_{}", Uuid::new_v4().simple());
    let maint = maintenance_pool(base_url).await;
    maint
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("failed to create temp database {db_name}: {e}"));
    maint.close().await;

    let temp_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&format!("{base_url}/{db_name}"))
        .await
        .unwrap_or_else(|e| panic!("failed to connect to temp database {db_name}: {e}"));

    pool::run_migrations(&temp_pool)
        .await
        .expect("migrations should succeed");

    (temp_pool, db_name)
}

/// Terminate connections to and drop a temporary database. Safe to call
/// twice.
pub async fn drop_test_db(db_name: &str) {
    let maint = maintenance_pool(pg_url().await).await;

    let terminate = format!(
        "SELECT pg_terminate_backend(pid) \
         FROM pg_stat_activity \
         WHERE datname = '{db_name}' AND pid <> pg_backend_pid()"
    );
    let _ = maint.execute(terminate.as_str()).await;
    let _ = maint
        .execute(format!("DROP DATABASE IF EXISTS {db_name}").as_str())
        .await;
    maint.close().await;
}

/// Insert a plan for `topic` with ordinary defaults (English, beginner,
/// standard mode, no document).
pub async fn seed_plan(pool: &PgPool, topic: &str) -> Plan {
    plans::insert_plan(
        pool,
        &NewPlan {
            topic,
            urgency: "today",
            level: "beginner",
            language: "English",
            mode: PlanMode::Standard,
            document_context: None,
        },
    )
    .await
    .expect("insert_plan should succeed")
}

/// Insert outline chapters with the given titles, numbered from 1.
pub async fn seed_outline(pool: &PgPool, plan_id: Uuid, titles: &[&str]) -> Vec<Chapter> {
    let outline: Vec<OutlineChapter> = titles
        .iter()
        .map(|t| OutlineChapter {
            title: (*t).to_owned(),
            mental_model: format!("Think of {t} as a machine."),
            key_takeaway: format!("{t} matters."),
        })
        .collect();

    chapters::insert_outline_chapters(pool, plan_id, &outline)
        .await
        .expect("insert_outline_chapters should succeed")
}
