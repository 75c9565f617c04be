//! Database query functions for the `learning_plans` table.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{Chapter, LearningIntent, Plan, PlanMode, PlanStatus};
use crate::queries::chapters::{OutlineChapter, insert_outline_chapters_on};

/// Fields supplied by the learner when submitting a plan.
#[derive(Debug, Clone)]
pub struct NewPlan<'a> {
    pub topic: &'a str,
    pub urgency: &'a str,
    pub level: &'a str,
    pub language: &'a str,
    pub mode: PlanMode,
    /// Base64-encoded PDF, if one was uploaded.
    pub document_context: Option<&'a str>,
}

/// Insert a new plan row with status `generating` and no next steps.
pub async fn insert_plan(pool: &PgPool, new: &NewPlan<'_>) -> Result<Plan> {
    let plan = sqlx::query_as::<_, Plan>(
        "INSERT INTO learning_plans (topic, urgency, level, language, mode, document_context) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(new.topic)
    .bind(new.urgency)
    .bind(new.level)
    .bind(new.language)
    .bind(new.mode)
    .bind(new.document_context)
    .fetch_one(pool)
    .await
    .context("failed to insert plan")?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan(pool: &PgPool, id: Uuid) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM learning_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plan")?;

    Ok(plan)
}

/// List all plans, newest first.
pub async fn list_plans(pool: &PgPool) -> Result<Vec<Plan>> {
    let plans =
        sqlx::query_as::<_, Plan>("SELECT * FROM learning_plans ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
            .context("failed to list plans")?;

    Ok(plans)
}

/// Fetch the most recently created plan, if any.
pub async fn latest_plan(pool: &PgPool) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "SELECT * FROM learning_plans ORDER BY created_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .context("failed to fetch latest plan")?;

    Ok(plan)
}

/// Move a plan forward to `to` if it is currently in any earlier status.
///
/// Returns `true` when the row changed. A plan already at or past `to` is
/// left untouched, so repeated calls are harmless.
pub async fn advance_plan_status(pool: &PgPool, id: Uuid, to: PlanStatus) -> Result<bool> {
    let earlier: Vec<String> = [
        PlanStatus::Generating,
        PlanStatus::StructureReady,
        PlanStatus::Generated,
    ]
    .into_iter()
    .filter(|s| s.can_advance_to(to))
    .map(|s| s.to_string())
    .collect();

    let result = sqlx::query(
        "UPDATE learning_plans SET status = $1 \
         WHERE id = $2 AND status = ANY($3)",
    )
    .bind(to)
    .bind(id)
    .bind(&earlier)
    .execute(pool)
    .await
    .context("failed to advance plan status")?;

    Ok(result.rows_affected() > 0)
}

/// Outline metadata written once the outline step succeeds.
#[derive(Debug, Clone)]
pub struct OutlineRecord<'a> {
    pub intent: LearningIntent,
    pub curriculum_strategy: Option<&'a str>,
    pub next_steps: &'a [String],
}

/// Record the outline metadata and move the plan to `structure_ready`.
pub async fn record_outline(pool: &PgPool, id: Uuid, record: &OutlineRecord<'_>) -> Result<Plan> {
    let mut conn = pool.acquire().await.context("failed to acquire connection")?;
    record_outline_on(&mut conn, id, record).await
}

/// Same as [`record_outline`], on a caller-owned connection or transaction.
pub async fn record_outline_on(
    conn: &mut PgConnection,
    id: Uuid,
    record: &OutlineRecord<'_>,
) -> Result<Plan> {
    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE learning_plans \
         SET status = 'structure_ready', intent = $1, curriculum_strategy = $2, next_steps = $3 \
         WHERE id = $4 AND status = 'generating' \
         RETURNING *",
    )
    .bind(record.intent)
    .bind(record.curriculum_strategy)
    .bind(record.next_steps)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("failed to record plan outline")?;

    if let Some(p) = plan {
        return Ok(p);
    }

    let status: Option<PlanStatus> =
        sqlx::query_scalar("SELECT status FROM learning_plans WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .context("failed to fetch plan status")?;
    match status {
        None => anyhow::bail!("plan {id} not found"),
        Some(s) => anyhow::bail!(
            "plan {id} cannot record an outline: current status is {:?} (must be generating)",
            s.to_string()
        ),
    }
}

/// Insert the outline chapters and record the outline metadata in one
/// transaction. Either both land or neither does.
pub async fn store_outline(
    pool: &PgPool,
    id: Uuid,
    chapters: &[OutlineChapter],
    record: &OutlineRecord<'_>,
) -> Result<(Plan, Vec<Chapter>)> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let inserted = insert_outline_chapters_on(&mut tx, id, chapters).await?;
    let plan = record_outline_on(&mut tx, id, record).await?;
    tx.commit().await.context("failed to commit transaction")?;
    Ok((plan, inserted))
}
