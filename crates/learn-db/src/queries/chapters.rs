//! Database query functions for the `chapters` table.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{Chapter, Plan, VisualType};

/// Outline fields for one chapter, as produced by the outline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineChapter {
    pub title: String,
    pub mental_model: String,
    pub key_takeaway: String,
}

/// Detail fields written by the detail step (and optionally translated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDetailUpdate<'a> {
    pub explanation: &'a str,
    pub common_misconception: &'a str,
    pub real_world_example: &'a str,
    pub quiz_question: &'a str,
    pub quiz_answer: &'a str,
    pub visual_type: VisualType,
    pub visual_content: &'a str,
}

/// Insert one row per outline chapter, numbered from 1, inside a single
/// transaction. Detail fields start empty.
///
/// Fails (and rolls back) if the plan already has chapters at any of the
/// requested positions, so a racing duplicate outline cannot interleave.
pub async fn insert_outline_chapters(
    pool: &PgPool,
    plan_id: Uuid,
    outline: &[OutlineChapter],
) -> Result<Vec<Chapter>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let inserted = insert_outline_chapters_on(&mut tx, plan_id, outline).await?;
    tx.commit().await.context("failed to commit transaction")?;
    Ok(inserted)
}

/// Same as [`insert_outline_chapters`], on a caller-owned connection or
/// transaction.
pub async fn insert_outline_chapters_on(
    conn: &mut PgConnection,
    plan_id: Uuid,
    outline: &[OutlineChapter],
) -> Result<Vec<Chapter>> {
    let mut inserted = Vec::with_capacity(outline.len());

    for (index, ch) in outline.iter().enumerate() {
        let order = i32::try_from(index + 1).context("too many chapters")?;
        let chapter = sqlx::query_as::<_, Chapter>(
            "INSERT INTO chapters (plan_id, chapter_order, title, mental_model, key_takeaway) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING *",
        )
        .bind(plan_id)
        .bind(order)
        .bind(&ch.title)
        .bind(&ch.mental_model)
        .bind(&ch.key_takeaway)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to insert chapter {order} ({:?})", ch.title))?;
        inserted.push(chapter);
    }

    Ok(inserted)
}

/// Count the chapters belonging to a plan.
pub async fn count_chapters_for_plan(pool: &PgPool, plan_id: Uuid) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chapters WHERE plan_id = $1")
        .bind(plan_id)
        .fetch_one(pool)
        .await
        .context("failed to count chapters")?;

    Ok(row.0)
}

/// Count chapters of a plan still waiting for their detail content.
pub async fn count_pending_chapters(pool: &PgPool, plan_id: Uuid) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM chapters WHERE plan_id = $1 AND btrim(explanation) = ''",
    )
    .bind(plan_id)
    .fetch_one(pool)
    .await
    .context("failed to count pending chapters")?;

    Ok(row.0)
}

/// List all chapters for a plan in ascending order.
pub async fn list_chapters_for_plan(pool: &PgPool, plan_id: Uuid) -> Result<Vec<Chapter>> {
    let chapters = sqlx::query_as::<_, Chapter>(
        "SELECT * FROM chapters WHERE plan_id = $1 ORDER BY chapter_order ASC",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await
    .context("failed to list chapters for plan")?;

    Ok(chapters)
}

/// Fetch a single chapter by ID.
pub async fn get_chapter(pool: &PgPool, id: Uuid) -> Result<Option<Chapter>> {
    let chapter = sqlx::query_as::<_, Chapter>("SELECT * FROM chapters WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch chapter")?;

    Ok(chapter)
}

/// Fetch a chapter together with its owning plan.
pub async fn get_chapter_with_plan(pool: &PgPool, id: Uuid) -> Result<Option<(Chapter, Plan)>> {
    let Some(chapter) = get_chapter(pool, id).await? else {
        return Ok(None);
    };

    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM learning_plans WHERE id = $1")
        .bind(chapter.plan_id)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to fetch plan for chapter {id}"))?;

    Ok(Some((chapter, plan)))
}

/// Sibling chapters that come before `order` and already have content,
/// in ascending order. Used as "previous sections completed" context.
pub async fn list_completed_before(
    pool: &PgPool,
    plan_id: Uuid,
    order: i32,
) -> Result<Vec<Chapter>> {
    let chapters = sqlx::query_as::<_, Chapter>(
        "SELECT * FROM chapters \
         WHERE plan_id = $1 AND chapter_order < $2 AND btrim(explanation) <> '' \
         ORDER BY chapter_order ASC",
    )
    .bind(plan_id)
    .bind(order)
    .fetch_all(pool)
    .await
    .context("failed to list completed chapters")?;

    Ok(chapters)
}

/// Write the detail fields of a chapter. Title, order, and outline fields
/// are never touched here.
pub async fn update_chapter_detail(
    pool: &PgPool,
    id: Uuid,
    detail: &ChapterDetailUpdate<'_>,
) -> Result<Chapter> {
    let chapter = sqlx::query_as::<_, Chapter>(
        "UPDATE chapters \
         SET explanation = $1, common_misconception = $2, real_world_example = $3, \
             quiz_question = $4, quiz_answer = $5, visual_type = $6, visual_content = $7 \
         WHERE id = $8 \
         RETURNING *",
    )
    .bind(detail.explanation)
    .bind(detail.common_misconception)
    .bind(detail.real_world_example)
    .bind(detail.quiz_question)
    .bind(detail.quiz_answer)
    .bind(detail.visual_type)
    .bind(detail.visual_content)
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to update chapter detail")?;

    chapter.with_context(|| format!("chapter {id} not found"))
}

/// Set or clear the learner's completion flag on a chapter.
pub async fn set_chapter_completed(pool: &PgPool, id: Uuid, completed: bool) -> Result<()> {
    let result = sqlx::query("UPDATE chapters SET is_completed = $1 WHERE id = $2")
        .bind(completed)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update chapter completion")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("chapter {id} not found");
    }

    Ok(())
}
