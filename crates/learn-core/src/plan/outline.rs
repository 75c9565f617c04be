//! Outline reply parsing.

use learn_db::models::LearningIntent;
use learn_db::queries::chapters::OutlineChapter;
use serde_json::{Map, Value};

use crate::error::GenerationError;
use crate::parse::{field, field_text, parse_json_object, string_list};

const CHAPTER_KEYS: &[&str] = &["chapters", "sections", "modules"];
const TITLE_KEYS: &[&str] = &["title", "chapter_title", "name"];
const MENTAL_MODEL_KEYS: &[&str] = &["mental_model", "mentalModel", "analogy"];
const TAKEAWAY_KEYS: &[&str] = &["key_takeaway", "keyTakeaway", "takeaway"];
const STRATEGY_KEYS: &[&str] = &["curriculum_strategy", "curriculumStrategy", "strategy"];
const NEXT_STEP_KEYS: &[&str] = &["next_steps", "nextSteps"];

/// The outline step's result, normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    pub intent: LearningIntent,
    pub strategy: Option<String>,
    pub chapters: Vec<OutlineChapter>,
    pub next_steps: Vec<String>,
}

fn outline_chapter(item: &Value) -> Option<OutlineChapter> {
    let chapter = match item {
        Value::String(title) => OutlineChapter {
            title: title.trim().to_owned(),
            mental_model: String::new(),
            key_takeaway: String::new(),
        },
        Value::Object(obj) => OutlineChapter {
            title: field_text(obj, TITLE_KEYS).trim().to_owned(),
            mental_model: field_text(obj, MENTAL_MODEL_KEYS).trim().to_owned(),
            key_takeaway: field_text(obj, TAKEAWAY_KEYS).trim().to_owned(),
        },
        _ => return None,
    };
    (!chapter.title.is_empty()).then_some(chapter)
}

fn chapters_of(obj: &Map<String, Value>) -> Vec<OutlineChapter> {
    match field(obj, CHAPTER_KEYS) {
        Some(Value::Array(items)) => items.iter().filter_map(outline_chapter).collect(),
        _ => Vec::new(),
    }
}

/// Parse an outline reply.
///
/// Untitled chapters are dropped. No chapters left is
/// [`GenerationError::MissingChapters`].
pub fn parse_outline(raw: &str) -> Result<Outline, GenerationError> {
    let obj = parse_json_object(raw).map_err(GenerationError::InvalidJson)?;

    let chapters = chapters_of(&obj);
    if chapters.is_empty() {
        return Err(GenerationError::MissingChapters);
    }

    let strategy = field_text(&obj, STRATEGY_KEYS);
    Ok(Outline {
        intent: LearningIntent::from_lenient(&field_text(&obj, &["intent"])),
        strategy: (!strategy.trim().is_empty()).then(|| strategy.trim().to_owned()),
        chapters,
        next_steps: string_list(&obj, NEXT_STEP_KEYS),
    })
}
