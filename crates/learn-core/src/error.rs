//! Errors surfaced by the generation pipelines.

use thiserror::Error;
use uuid::Uuid;

use crate::llm::LlmError;

/// Minimum trimmed explanation length accepted from the detail step.
pub const MIN_EXPLANATION_CHARS: usize = 20;

/// Failure of a plan, chapter, or translation pipeline run.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("plan {0} not found")]
    PlanNotFound(Uuid),

    #[error("chapter {0} not found")]
    ChapterNotFound(Uuid),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("model returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("model response has no chapters")]
    MissingChapters,

    #[error("explanation too short ({len} chars, need at least {min})")]
    TooShort { len: usize, min: usize },

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl GenerationError {
    /// Whether the failure came from the model (transport or output shape)
    /// rather than from the request or the database.
    pub fn is_model_failure(&self) -> bool {
        matches!(
            self,
            Self::Llm(_) | Self::InvalidJson(_) | Self::MissingChapters | Self::TooShort { .. }
        )
    }
}

pub type GenerationResult<T> = Result<T, GenerationError>;
