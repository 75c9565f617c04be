//! Lazy-load queue: fills chapter detail one chapter at a time.
//!
//! ```text
//! pending --begin--> generating --complete--> ready
//!    ^                    |
//!    |                    `--fail--> failed
//!    `-------retry-------------------'
//! ```
//!
//! At most one chapter is generating at any moment. Candidates are picked
//! by scanning in ascending order for the first chapter that has no
//! explanation, has not been processed this session, and has not failed.
//! [`LazyLoadQueue`] is a pure state machine; [`driver::drive`] runs it
//! against a [`driver::ChapterSource`].

pub mod driver;

use std::collections::{HashMap, HashSet};

use learn_db::models::Chapter;
use thiserror::Error;
use uuid::Uuid;

pub use driver::{ChapterSource, DriveSummary, PipelineSource, QueueEvent, drive};

/// Where a chapter stands in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterState {
    Pending,
    Generating,
    Ready,
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("chapter {requested} cannot start while chapter {generating} is generating")]
    Busy { requested: Uuid, generating: Uuid },

    #[error("chapter {0} is not in this queue")]
    UnknownChapter(Uuid),

    #[error("chapter {id} is {state:?}, not pending")]
    NotPending { id: Uuid, state: ChapterState },
}

#[derive(Debug, Clone, Default)]
pub struct LazyLoadQueue {
    chapters: Vec<Chapter>,
    generating: Option<Uuid>,
    failed: HashMap<Uuid, String>,
    processed: HashSet<Uuid>,
}

impl LazyLoadQueue {
    pub fn new(mut chapters: Vec<Chapter>) -> Self {
        chapters.sort_by_key(|c| c.order);
        Self {
            chapters,
            ..Self::default()
        }
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn get(&self, id: Uuid) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    pub fn generating(&self) -> Option<Uuid> {
        self.generating
    }

    /// The next chapter to request, or `None` while one is in flight.
    pub fn next_candidate(&self) -> Option<&Chapter> {
        if self.generating.is_some() {
            return None;
        }
        self.chapters.iter().find(|c| {
            !c.is_ready() && !self.processed.contains(&c.id) && !self.failed.contains_key(&c.id)
        })
    }

    pub fn state_of(&self, id: Uuid) -> Option<ChapterState> {
        let chapter = self.get(id)?;
        Some(if self.generating == Some(id) {
            ChapterState::Generating
        } else if chapter.is_ready() {
            ChapterState::Ready
        } else if self.failed.contains_key(&id) {
            ChapterState::Failed
        } else {
            ChapterState::Pending
        })
    }

    /// Mark `id` as the chapter in flight.
    pub fn begin(&mut self, id: Uuid) -> Result<(), QueueError> {
        if let Some(generating) = self.generating {
            return Err(QueueError::Busy {
                requested: id,
                generating,
            });
        }
        match self.state_of(id) {
            None => Err(QueueError::UnknownChapter(id)),
            Some(ChapterState::Pending) => {
                self.generating = Some(id);
                Ok(())
            }
            Some(state) => Err(QueueError::NotPending { id, state }),
        }
    }

    /// Merge a freshly generated chapter into local state.
    pub fn complete(&mut self, chapter: Chapter) -> Result<(), QueueError> {
        let id = chapter.id;
        let slot = self
            .chapters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(QueueError::UnknownChapter(id))?;
        *slot = chapter;
        if self.generating == Some(id) {
            self.generating = None;
        }
        self.processed.insert(id);
        self.failed.remove(&id);
        Ok(())
    }

    /// Record a failed attempt. The chapter stays failed until [`retry`](Self::retry).
    pub fn fail(&mut self, id: Uuid, reason: impl Into<String>) -> Result<(), QueueError> {
        if self.get(id).is_none() {
            return Err(QueueError::UnknownChapter(id));
        }
        if self.generating == Some(id) {
            self.generating = None;
        }
        self.failed.insert(id, reason.into());
        Ok(())
    }

    /// Drop an in-flight attempt without recording a failure (cancellation).
    pub fn abandon(&mut self, id: Uuid) {
        if self.generating == Some(id) {
            self.generating = None;
        }
    }

    /// Clear a failure so the chapter is picked up again. Returns whether
    /// the chapter was failed.
    pub fn retry(&mut self, id: Uuid) -> bool {
        let was_failed = self.failed.remove(&id).is_some();
        if was_failed {
            self.processed.remove(&id);
        }
        was_failed
    }

    /// Retry every failed chapter. Returns how many were re-queued.
    pub fn retry_all(&mut self) -> usize {
        let ids: Vec<Uuid> = self.failed.keys().copied().collect();
        ids.into_iter().filter(|id| self.retry(*id)).count()
    }

    /// Nothing in flight and nothing left to start.
    pub fn is_idle(&self) -> bool {
        self.generating.is_none() && self.next_candidate().is_none()
    }

    pub fn all_ready(&self) -> bool {
        self.chapters.iter().all(Chapter::is_ready)
    }

    /// Failed chapters in ascending order.
    pub fn failed(&self) -> Vec<&Chapter> {
        self.chapters
            .iter()
            .filter(|c| self.failed.contains_key(&c.id))
            .collect()
    }

    pub fn failure_reason(&self, id: Uuid) -> Option<&str> {
        self.failed.get(&id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use learn_db::models::PlanMode;

    use super::*;
    use crate::testing::{chapter, plan, ready};

    fn queue_of(n: i32) -> LazyLoadQueue {
        let p = plan(PlanMode::Standard, None);
        // Deliberately out of order.
        let chapters = (1..=n).rev().map(|i| chapter(p.id, i, &format!("Ch {i}"))).collect();
        LazyLoadQueue::new(chapters)
    }

    #[test]
    fn picks_lowest_pending_chapter() {
        let q = queue_of(3);
        assert_eq!(q.next_candidate().unwrap().order, 1);
    }

    #[test]
    fn skips_chapters_that_are_already_ready() {
        let p = plan(PlanMode::Standard, None);
        let q = LazyLoadQueue::new(vec![
            ready(chapter(p.id, 1, "Done")),
            chapter(p.id, 2, "Todo"),
        ]);
        assert_eq!(q.next_candidate().unwrap().title, "Todo");
        assert_eq!(q.state_of(q.chapters()[0].id), Some(ChapterState::Ready));
    }

    #[test]
    fn only_one_chapter_generates_at_a_time() {
        let mut q = queue_of(3);
        let first = q.next_candidate().unwrap().id;
        let second = q.chapters()[1].id;

        q.begin(first).unwrap();
        assert!(q.next_candidate().is_none());
        assert_eq!(
            q.begin(second),
            Err(QueueError::Busy {
                requested: second,
                generating: first
            })
        );
        assert_eq!(q.state_of(first), Some(ChapterState::Generating));
    }

    #[test]
    fn complete_merges_and_advances() {
        let mut q = queue_of(2);
        let first = q.next_candidate().unwrap().clone();
        q.begin(first.id).unwrap();
        q.complete(ready(first.clone())).unwrap();

        assert_eq!(q.state_of(first.id), Some(ChapterState::Ready));
        assert!(q.get(first.id).unwrap().is_ready());
        assert_eq!(q.next_candidate().unwrap().order, 2);
    }

    #[test]
    fn completed_but_empty_chapter_is_not_retried_in_a_loop() {
        let mut q = queue_of(1);
        let only = q.next_candidate().unwrap().clone();
        q.begin(only.id).unwrap();
        q.complete(only.clone()).unwrap();
        assert!(q.next_candidate().is_none());
        assert!(q.is_idle());
        assert!(!q.all_ready());
    }

    #[test]
    fn failure_then_manual_retry() {
        let mut q = queue_of(2);
        let first = q.next_candidate().unwrap().id;
        q.begin(first).unwrap();
        q.fail(first, "model timed out").unwrap();

        assert_eq!(q.state_of(first), Some(ChapterState::Failed));
        assert_eq!(q.failure_reason(first), Some("model timed out"));
        assert_eq!(q.next_candidate().unwrap().order, 2);
        assert!(matches!(
            q.begin(first),
            Err(QueueError::NotPending {
                state: ChapterState::Failed,
                ..
            })
        ));

        assert!(q.retry(first));
        assert!(!q.retry(first));
        assert_eq!(q.state_of(first), Some(ChapterState::Pending));
        assert_eq!(q.next_candidate().unwrap().id, first);
    }

    #[test]
    fn retry_all_requeues_every_failure() {
        let mut q = queue_of(3);
        for id in q.chapters().iter().map(|c| c.id).collect::<Vec<_>>() {
            q.begin(id).unwrap();
            q.fail(id, "boom").unwrap();
        }
        assert_eq!(q.failed().len(), 3);
        assert!(q.is_idle());
        assert_eq!(q.retry_all(), 3);
        assert!(q.failed().is_empty());
        assert!(!q.is_idle());
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let mut q = queue_of(1);
        let stranger = Uuid::new_v4();
        assert_eq!(q.begin(stranger), Err(QueueError::UnknownChapter(stranger)));
        assert!(q.fail(stranger, "x").is_err());
        assert_eq!(q.state_of(stranger), None);
    }
}
