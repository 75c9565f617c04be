//! Detail reply parsing and validation.

use learn_db::models::VisualType;
use learn_db::queries::chapters::ChapterDetailUpdate;
use serde_json::Value;

use crate::error::{GenerationError, MIN_EXPLANATION_CHARS};
use crate::parse::{field, field_text, parse_json_object, value_text};

/// Normalised content for one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDetail {
    pub explanation: String,
    pub common_misconception: String,
    pub real_world_example: String,
    pub quiz_question: String,
    pub quiz_answer: String,
    pub visual_type: VisualType,
    pub visual_content: String,
}

impl ChapterDetail {
    pub fn as_update(&self) -> ChapterDetailUpdate<'_> {
        ChapterDetailUpdate {
            explanation: &self.explanation,
            common_misconception: &self.common_misconception,
            real_world_example: &self.real_world_example,
            quiz_question: &self.quiz_question,
            quiz_answer: &self.quiz_answer,
            visual_type: self.visual_type,
            visual_content: &self.visual_content,
        }
    }
}

/// Structured visual content (tables, objects) is stored as JSON text.
fn visual_content_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(other) => other.to_string(),
    }
}

/// Quiz fields arrive flat or nested under `quiz`.
fn quiz(obj: &serde_json::Map<String, Value>) -> (String, String) {
    let mut question = field_text(obj, &["quiz_question", "quizQuestion", "question"]);
    let mut answer = field_text(obj, &["quiz_answer", "quizAnswer", "answer"]);

    if let Some(Value::Object(nested)) = field(obj, &["quiz"]) {
        if question.trim().is_empty() {
            question = field_text(nested, &["question", "q"]);
        }
        if answer.trim().is_empty() {
            answer = field_text(nested, &["answer", "a"]);
        }
    }
    (question.trim().to_owned(), answer.trim().to_owned())
}

/// Parse and validate a detail reply.
pub fn parse_chapter_detail(raw: &str) -> Result<ChapterDetail, GenerationError> {
    let obj = parse_json_object(raw).map_err(GenerationError::InvalidJson)?;

    let explanation = field_text(&obj, &["explanation", "content", "body"])
        .trim()
        .to_owned();
    let len = explanation.chars().count();
    if len < MIN_EXPLANATION_CHARS {
        return Err(GenerationError::TooShort {
            len,
            min: MIN_EXPLANATION_CHARS,
        });
    }

    let (quiz_question, quiz_answer) = quiz(&obj);
    let visual_type = field(&obj, &["visual_type", "visualType"])
        .map(value_text)
        .map(|t| VisualType::from_lenient(&t))
        .unwrap_or_default();

    Ok(ChapterDetail {
        explanation,
        common_misconception: field_text(
            &obj,
            &["common_misconception", "commonMisconception", "misconception"],
        )
        .trim()
        .to_owned(),
        real_world_example: field_text(&obj, &["real_world_example", "realWorldExample", "example"])
            .trim()
            .to_owned(),
        quiz_question,
        quiz_answer,
        visual_type,
        visual_content: visual_content_text(field(&obj, &["visual_content", "visualContent", "visual"])),
    })
}
