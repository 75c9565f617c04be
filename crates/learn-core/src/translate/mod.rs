//! Optional translation step.
//!
//! Generation prompts always produce English; when the plan's language is
//! something else, the text fields go through one extra completion call that
//! rewrites them while keeping technical terms in English.

use std::collections::BTreeMap;

use learn_db::models::VisualType;
use learn_db::queries::chapters::OutlineChapter;
use serde_json::{Map, Value};

use crate::chapter::ChapterDetail;
use crate::error::GenerationError;
use crate::llm::{CompletionProvider, CompletionRequest, Message};
use crate::parse::{field_text, parse_json_object};
use crate::plan::Outline;

/// Named text fields to translate. Keys come back unchanged.
pub type Fields = BTreeMap<String, String>;

const SYSTEM_PROMPT: &str = "You are a professional technical translator. Output valid JSON.";

/// Whether text for `language` must be translated from English.
pub fn needs_translation(language: &str) -> bool {
    let lang = language.trim();
    !(lang.is_empty() || lang.eq_ignore_ascii_case("english") || lang.eq_ignore_ascii_case("en"))
}

fn translation_prompt(payload: &str, language: &str) -> String {
    format!(
        "Translate every string value in the JSON object below into {language}.\n\
         \n\
         Rules:\n\
         - Keep technical terms, product names, code, formulas and acronyms in English.\n\
         - Keep the same keys. Do not add, drop or merge keys.\n\
         - Keep line breaks and list structure.\n\
         - Return only the translated JSON object.\n\
         \n\
         {payload}"
    )
}

/// Translate `fields` into `language`.
///
/// Returns the input untouched without calling the model when no
/// translation is needed or every field is blank. Keys missing from the
/// reply (or blank in it) keep their original text.
pub async fn translate_fields(
    llm: &dyn CompletionProvider,
    fields: &Fields,
    language: &str,
) -> Result<Fields, GenerationError> {
    if !needs_translation(language) {
        return Ok(fields.clone());
    }

    let to_send: Map<String, Value> = fields
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    if to_send.is_empty() {
        return Ok(fields.clone());
    }

    let payload = Value::Object(to_send).to_string();
    tracing::info!(
        language = language.trim(),
        fields = fields.len(),
        provider = llm.name(),
        "translating content"
    );

    let request = CompletionRequest::json(vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(translation_prompt(&payload, language.trim())),
    ]);
    let raw = llm.complete(&request).await?;
    let reply = parse_json_object(&raw).map_err(GenerationError::InvalidJson)?;

    let mut translated = fields.clone();
    let mut kept = 0usize;
    for (key, value) in translated.iter_mut() {
        if value.trim().is_empty() {
            continue;
        }
        let candidate = field_text(&reply, &[key.as_str()]);
        if candidate.trim().is_empty() {
            kept += 1;
        } else {
            *value = candidate;
        }
    }
    if kept > 0 {
        tracing::warn!(kept, "translation reply omitted fields, keeping originals");
    }
    Ok(translated)
}

fn take(fields: &mut Fields, key: &str) -> String {
    fields.remove(key).unwrap_or_default()
}

/// Translate the learner-facing fields of a chapter detail.
///
/// Diagram and table content is structural and stays as generated.
pub async fn translate_detail(
    llm: &dyn CompletionProvider,
    detail: &ChapterDetail,
    language: &str,
) -> Result<ChapterDetail, GenerationError> {
    if !needs_translation(language) {
        return Ok(detail.clone());
    }

    let prose_visual = matches!(detail.visual_type, VisualType::Text | VisualType::Image);
    let mut fields = Fields::new();
    fields.insert("explanation".into(), detail.explanation.clone());
    fields.insert("common_misconception".into(), detail.common_misconception.clone());
    fields.insert("real_world_example".into(), detail.real_world_example.clone());
    fields.insert("quiz_question".into(), detail.quiz_question.clone());
    fields.insert("quiz_answer".into(), detail.quiz_answer.clone());
    if prose_visual {
        fields.insert("visual_content".into(), detail.visual_content.clone());
    }

    let mut out = translate_fields(llm, &fields, language).await?;
    Ok(ChapterDetail {
        explanation: take(&mut out, "explanation"),
        common_misconception: take(&mut out, "common_misconception"),
        real_world_example: take(&mut out, "real_world_example"),
        quiz_question: take(&mut out, "quiz_question"),
        quiz_answer: take(&mut out, "quiz_answer"),
        visual_type: detail.visual_type,
        visual_content: if prose_visual {
            take(&mut out, "visual_content")
        } else {
            detail.visual_content.clone()
        },
    })
}

/// Translate an outline: strategy, chapter titles, mental models,
/// takeaways, and next steps. Chapter count and order never change.
pub async fn translate_outline(
    llm: &dyn CompletionProvider,
    outline: &Outline,
    language: &str,
) -> Result<Outline, GenerationError> {
    if !needs_translation(language) {
        return Ok(outline.clone());
    }

    let mut fields = Fields::new();
    if let Some(strategy) = &outline.strategy {
        fields.insert("curriculum_strategy".into(), strategy.clone());
    }
    for (i, ch) in outline.chapters.iter().enumerate() {
        fields.insert(format!("chapter_{i}_title"), ch.title.clone());
        fields.insert(format!("chapter_{i}_mental_model"), ch.mental_model.clone());
        fields.insert(format!("chapter_{i}_key_takeaway"), ch.key_takeaway.clone());
    }
    for (i, step) in outline.next_steps.iter().enumerate() {
        fields.insert(format!("next_step_{i}"), step.clone());
    }

    let mut out = translate_fields(llm, &fields, language).await?;
    let chapters = (0..outline.chapters.len())
        .map(|i| OutlineChapter {
            title: take(&mut out, &format!("chapter_{i}_title")),
            mental_model: take(&mut out, &format!("chapter_{i}_mental_model")),
            key_takeaway: take(&mut out, &format!("chapter_{i}_key_takeaway")),
        })
        .collect();
    let next_steps = (0..outline.next_steps.len())
        .map(|i| take(&mut out, &format!("next_step_{i}")))
        .collect();

    Ok(Outline {
        intent: outline.intent,
        strategy: outline
            .strategy
            .as_ref()
            .map(|_| take(&mut out, "curriculum_strategy")),
        chapters,
        next_steps,
    })
}
