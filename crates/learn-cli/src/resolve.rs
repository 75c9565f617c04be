//! Plan and chapter ID resolution for CLI arguments.
//!
//! Plans may be named by UUID or by `latest`, which picks the most recently
//! created plan. Chapters may be named by UUID or by `<plan>:<order>`.

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use uuid::Uuid;

use learn_db::queries::{chapters as chapter_queries, plans as plan_queries};

fn is_latest(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "latest" | "last")
}

/// Resolve a plan argument to its UUID.
pub async fn resolve_plan_id(pool: &PgPool, input: &str) -> Result<Uuid> {
    if is_latest(input) {
        return match plan_queries::latest_plan(pool).await? {
            Some(plan) => Ok(plan.id),
            None => bail!("no plans yet; create one with `expresslearn plan create <topic>`"),
        };
    }
    Uuid::parse_str(input.trim())
        .with_context(|| format!("invalid plan ID: {input:?} (expected a UUID or `latest`)"))
}

/// Split `<plan>:<order>` into its parts. Returns `None` for anything else.
fn split_plan_order(input: &str) -> Option<(&str, i32)> {
    let (plan, order) = input.rsplit_once(':')?;
    let order = order.trim().parse().ok()?;
    Some((plan, order))
}

/// Resolve a chapter argument to its UUID.
pub async fn resolve_chapter_id(pool: &PgPool, input: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input.trim()) {
        return Ok(id);
    }
    let Some((plan, order)) = split_plan_order(input) else {
        bail!("invalid chapter ID: {input:?} (expected a UUID or `<plan>:<order>`)");
    };
    let plan_id = resolve_plan_id(pool, plan).await?;
    chapter_queries::list_chapters_for_plan(pool, plan_id)
        .await?
        .into_iter()
        .find(|c| c.order == order)
        .map(|c| c.id)
        .with_context(|| format!("plan {plan_id} has no chapter {order}"))
}
