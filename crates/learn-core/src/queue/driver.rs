//! Async loop that runs a [`LazyLoadQueue`] to idle.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use learn_db::models::Chapter;

use super::LazyLoadQueue;
use crate::chapter::generate_chapter_content;
use crate::error::GenerationError;
use crate::llm::CompletionProvider;

/// Something that can fill in a chapter's detail.
#[async_trait]
pub trait ChapterSource: Send + Sync {
    async fn generate(&self, chapter_id: Uuid) -> Result<Chapter, GenerationError>;
}

/// The database-backed detail pipeline.
#[derive(Clone)]
pub struct PipelineSource {
    pool: PgPool,
    llm: Arc<dyn CompletionProvider>,
}

impl PipelineSource {
    pub fn new(pool: PgPool, llm: Arc<dyn CompletionProvider>) -> Self {
        Self { pool, llm }
    }
}

#[async_trait]
impl ChapterSource for PipelineSource {
    async fn generate(&self, chapter_id: Uuid) -> Result<Chapter, GenerationError> {
        generate_chapter_content(&self.pool, self.llm.as_ref(), chapter_id).await
    }
}

/// Progress reported by [`drive`].
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Started {
        chapter_id: Uuid,
        order: i32,
        title: String,
    },
    Ready(Chapter),
    Failed {
        chapter_id: Uuid,
        order: i32,
        reason: String,
    },
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveSummary {
    pub generated: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Request chapters one at a time until the queue is idle or `cancel`
/// fires. A cancelled in-flight request is abandoned and its chapter stays
/// pending.
pub async fn drive<F>(
    queue: &mut LazyLoadQueue,
    source: &dyn ChapterSource,
    cancel: &CancellationToken,
    mut on_event: F,
) -> DriveSummary
where
    F: FnMut(&QueueEvent),
{
    let mut summary = DriveSummary::default();

    loop {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            on_event(&QueueEvent::Cancelled);
            break;
        }

        let Some(next) = queue.next_candidate() else {
            break;
        };
        let (id, order, title) = (next.id, next.order, next.title.clone());
        if let Err(e) = queue.begin(id) {
            // Unreachable with a single driver; stop rather than spin.
            tracing::error!(chapter_id = %id, error = %e, "queue refused to start chapter");
            break;
        }
        on_event(&QueueEvent::Started {
            chapter_id: id,
            order,
            title,
        });

        let result = tokio::select! {
            r = source.generate(id) => r,
            () = cancel.cancelled() => {
                queue.abandon(id);
                summary.cancelled = true;
                on_event(&QueueEvent::Cancelled);
                break;
            }
        };

        match result {
            Ok(chapter) => {
                if queue.complete(chapter.clone()).is_ok() {
                    summary.generated += 1;
                    on_event(&QueueEvent::Ready(chapter));
                }
            }
            Err(e) => {
                tracing::warn!(chapter_id = %id, order, error = %e, "chapter generation failed");
                let reason = e.to_string();
                // The id came from this queue, so it is always known.
                let _ = queue.fail(id, reason.clone());
                summary.failed += 1;
                on_event(&QueueEvent::Failed {
                    chapter_id: id,
                    order,
                    reason,
                });
            }
        }
    }

    summary
}
