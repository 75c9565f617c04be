//! In-memory row fixtures for unit tests.

use chrono::Utc;
use learn_db::models::{Chapter, Plan, PlanMode, PlanStatus, VisualType};
use uuid::Uuid;

pub(crate) fn plan(mode: PlanMode, document: Option<&str>) -> Plan {
    Plan {
        id: Uuid::new_v4(),
        topic: "How vaccines work".into(),
        urgency: "today".into(),
        level: "beginner".into(),
        language: "English".into(),
        mode,
        status: PlanStatus::Generating,
        intent: None,
        curriculum_strategy: None,
        document_context: document.map(str::to_owned),
        next_steps: Vec::new(),
        created_at: Utc::now(),
    }
}

/// An outline-only chapter (no detail yet).
pub(crate) fn chapter(plan_id: Uuid, order: i32, title: &str) -> Chapter {
    Chapter {
        id: Uuid::new_v4(),
        plan_id,
        order,
        title: title.into(),
        mental_model: format!("{title} is like a lock and key"),
        key_takeaway: format!("{title} matters"),
        explanation: String::new(),
        common_misconception: String::new(),
        real_world_example: String::new(),
        quiz_question: String::new(),
        quiz_answer: String::new(),
        visual_type: VisualType::Text,
        visual_content: String::new(),
        is_completed: false,
        created_at: Utc::now(),
    }
}

pub(crate) fn ready(mut chapter: Chapter) -> Chapter {
    chapter.explanation = format!("{} explained in plenty of detail.", chapter.title);
    chapter
}
