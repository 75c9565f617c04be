//! The chapter-detail pipeline.

use sqlx::PgPool;
use uuid::Uuid;

use learn_db::models::{Chapter, PlanStatus};
use learn_db::queries::{chapters as chapter_queries, plans as plan_queries};

use super::detail::parse_chapter_detail;
use super::prompts::build_detail_request;
use crate::error::GenerationError;
use crate::llm::CompletionProvider;
use crate::translate::translate_detail;

/// Generate, validate, translate, and store the detail for one chapter.
///
/// Once no chapter of the plan is left without an explanation, the plan is
/// advanced to `generated`.
pub async fn generate_chapter_content(
    pool: &PgPool,
    llm: &dyn CompletionProvider,
    chapter_id: Uuid,
) -> Result<Chapter, GenerationError> {
    let (chapter, plan) = chapter_queries::get_chapter_with_plan(pool, chapter_id)
        .await?
        .ok_or(GenerationError::ChapterNotFound(chapter_id))?;
    let previous = chapter_queries::list_completed_before(pool, plan.id, chapter.order).await?;

    tracing::info!(
        plan_id = %plan.id,
        chapter_id = %chapter_id,
        order = chapter.order,
        previous = previous.len(),
        intent = %plan.effective_intent(),
        "generating chapter detail"
    );

    let raw = llm
        .complete(&build_detail_request(&plan, &chapter, &previous))
        .await?;
    let detail = match parse_chapter_detail(&raw) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(chapter_id = %chapter_id, error = %e, "rejected chapter detail");
            return Err(e);
        }
    };
    let detail = translate_detail(llm, &detail, &plan.language).await?;

    let updated = chapter_queries::update_chapter_detail(pool, chapter_id, &detail.as_update()).await?;

    if chapter_queries::count_pending_chapters(pool, plan.id).await? == 0
        && plan_queries::advance_plan_status(pool, plan.id, PlanStatus::Generated).await?
    {
        tracing::info!(plan_id = %plan.id, "all chapters ready, plan generated");
    }

    tracing::info!(
        chapter_id = %chapter_id,
        visual = %updated.visual_type,
        explanation_chars = updated.explanation.len(),
        "chapter detail stored"
    );
    Ok(updated)
}

/// Set or clear the learner's completion flag.
pub async fn mark_chapter_completed(
    pool: &PgPool,
    chapter_id: Uuid,
    completed: bool,
) -> Result<Chapter, GenerationError> {
    if chapter_queries::get_chapter(pool, chapter_id).await?.is_none() {
        return Err(GenerationError::ChapterNotFound(chapter_id));
    }
    chapter_queries::set_chapter_completed(pool, chapter_id, completed).await?;
    chapter_queries::get_chapter(pool, chapter_id)
        .await?
        .ok_or(GenerationError::ChapterNotFound(chapter_id))
}
