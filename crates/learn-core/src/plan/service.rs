//! Plan service layer: submission and the outline pipeline.
//!
//! The outline step is guarded by a row count: a plan that already has
//! chapters is never sent to the model again, so repeated or racing calls
//! cannot duplicate the curriculum.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sqlx::PgPool;
use uuid::Uuid;

use learn_db::models::{Chapter, Plan, PlanMode};
use learn_db::queries::{chapters as chapter_queries, plans as plan_queries};

use super::outline::parse_outline;
use super::prompts::{build_outline_request, select_outline_template};
use crate::error::GenerationError;
use crate::llm::CompletionProvider;
use crate::llm::types::bare_base64;
use crate::translate::translate_outline;

/// A learner's submission.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub topic: String,
    pub urgency: String,
    pub level: String,
    pub language: String,
    pub mode: PlanMode,
    /// Base64 PDF, optionally as a `data:` URI.
    pub document: Option<String>,
}

impl PlanRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }
}

impl Default for PlanRequest {
    fn default() -> Self {
        Self {
            topic: String::new(),
            urgency: "today".to_owned(),
            level: "beginner".to_owned(),
            language: "English".to_owned(),
            mode: PlanMode::Standard,
            document: None,
        }
    }
}

/// Decode and check an uploaded document. Returns the bare base64 payload
/// with whitespace removed.
pub fn validate_document(raw: &str) -> Result<String, GenerationError> {
    let compact: String = bare_base64(raw.trim())
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| GenerationError::InvalidRequest(format!("document is not valid base64: {e}")))?;
    if !bytes.starts_with(b"%PDF") {
        return Err(GenerationError::InvalidRequest(
            "document is not a PDF".to_owned(),
        ));
    }
    Ok(compact)
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() { default } else { trimmed }
}

/// Validate a submission and store it as a `generating` plan.
pub async fn create_plan(pool: &PgPool, request: &PlanRequest) -> Result<Plan, GenerationError> {
    let topic = request.topic.trim();
    if topic.is_empty() {
        return Err(GenerationError::InvalidRequest("topic is required".to_owned()));
    }

    let document = match request.document.as_deref() {
        Some(d) if !d.trim().is_empty() => Some(validate_document(d)?),
        _ => None,
    };

    let plan = plan_queries::insert_plan(
        pool,
        &plan_queries::NewPlan {
            topic,
            urgency: non_empty_or(&request.urgency, "today"),
            level: non_empty_or(&request.level, "beginner"),
            language: non_empty_or(&request.language, "English"),
            mode: request.mode,
            document_context: document.as_deref(),
        },
    )
    .await?;

    tracing::info!(
        plan_id = %plan.id,
        topic = %plan.topic,
        mode = %plan.mode,
        has_document = plan.has_document(),
        "plan created"
    );
    Ok(plan)
}

/// Result of running the outline pipeline.
#[derive(Debug)]
pub enum OutlineOutcome {
    /// The plan already had chapters; nothing was generated.
    AlreadyGenerated,
    /// A fresh outline was generated and stored.
    Generated { plan: Plan, chapters: Vec<Chapter> },
}

/// Generate and store a plan's outline unless it already has one.
pub async fn generate_plan_content(
    pool: &PgPool,
    llm: &dyn CompletionProvider,
    plan_id: Uuid,
) -> Result<OutlineOutcome, GenerationError> {
    let plan = plan_queries::get_plan(pool, plan_id)
        .await?
        .ok_or(GenerationError::PlanNotFound(plan_id))?;

    if chapter_queries::count_chapters_for_plan(pool, plan_id).await? > 0 {
        tracing::info!(plan_id = %plan_id, status = %plan.status, "outline already generated, skipping");
        return Ok(OutlineOutcome::AlreadyGenerated);
    }

    let template = select_outline_template(&plan);
    tracing::info!(
        plan_id = %plan_id,
        template = ?template,
        provider = llm.name(),
        "generating outline"
    );

    let raw = llm.complete(&build_outline_request(&plan)).await?;
    let mut outline = parse_outline(&raw)?;
    outline = translate_outline(llm, &outline, &plan.language).await?;

    let record = plan_queries::OutlineRecord {
        intent: outline.intent,
        curriculum_strategy: outline.strategy.as_deref(),
        next_steps: &outline.next_steps,
    };
    let (plan, chapters) =
        match plan_queries::store_outline(pool, plan_id, &outline.chapters, &record).await {
            Ok(stored) => stored,
            Err(e) => {
                // A concurrent run may have won the race to insert.
                if chapter_queries::count_chapters_for_plan(pool, plan_id).await? > 0 {
                    tracing::warn!(plan_id = %plan_id, error = %e, "outline inserted concurrently");
                    return Ok(OutlineOutcome::AlreadyGenerated);
                }
                return Err(e.into());
            }
        };

    tracing::info!(
        plan_id = %plan_id,
        chapters = chapters.len(),
        intent = %outline.intent,
        "outline stored"
    );
    Ok(OutlineOutcome::Generated { plan, chapters })
}

/// Fetch a plan and its chapters in ascending order.
pub async fn get_plan_with_chapters(
    pool: &PgPool,
    plan_id: Uuid,
) -> Result<(Plan, Vec<Chapter>), GenerationError> {
    let plan = plan_queries::get_plan(pool, plan_id)
        .await?
        .ok_or(GenerationError::PlanNotFound(plan_id))?;
    let chapters = chapter_queries::list_chapters_for_plan(pool, plan_id).await?;
    Ok((plan, chapters))
}
