//! Prompt construction for the chapter-detail step.

use learn_db::models::{Chapter, LearningIntent, Plan, PlanMode};

use crate::llm::{CompletionRequest, ContentPart, Message};

const SYSTEM_PROMPT: &str = "You are a domain expert. You prioritize deep understanding over \
     simplification. Output valid JSON.";

const OUTPUT_SHAPE: &str = r#"Structure JSON:
{
  "explanation": "...",
  "common_misconception": "...",
  "real_world_example": "...",
  "quiz_question": "...",
  "quiz_answer": "...",
  "visual_type": "...",
  "visual_content": "..."
}"#;

fn intent_instructions(intent: LearningIntent) -> &'static str {
    match intent {
        LearningIntent::Learning => {
            "Instruction (LEARNING):\n\
             - Be concrete. Use specific examples, not generalities.\n\
             - Explain the MECHANISM. Do not just say it works, say HOW.\n\
             - explanation: 5-8 lines. Start with the why, then the how.\n\
             - common_misconception: correct a specific error beginners make.\n\
             - real_world_example: a concrete application in industry or daily life.\n\
             - quiz_question: test deep understanding, not surface facts."
        }
        LearningIntent::Solving => {
            "Instruction (SOLVING):\n\
             - You are writing the ACTUAL deliverable for this section, not advice about it.\n\
             - explanation: the finished section text, with every calculation, argument \
             or design decision written out in full.\n\
             - common_misconception: a mistake that would lose marks in this section.\n\
             - real_world_example: how this result would be checked or used.\n\
             - quiz_question: a check the learner can run on the answer."
        }
        LearningIntent::Preparing => {
            "Instruction (PREPARING):\n\
             - Last-minute revision format. Focus on what to remember.\n\
             - explanation: the key points as short memorable lines, with a mnemonic.\n\
             - common_misconception: the classic exam or interview trap.\n\
             - real_world_example: a typical question where this point appears.\n\
             - quiz_question: a rapid-recall question."
        }
    }
}

fn visual_directive(plan: &Plan) -> &'static str {
    if plan.mode == PlanMode::Story {
        return "Visual: this is an illustrated story. visual_type MUST be \"image\" and \
                visual_content is a vivid one-paragraph illustration prompt for this scene.";
    }
    "Visual: pick the most useful of\n\
     - \"mermaid\": visual_content is Mermaid flowchart text (e.g. \"flowchart TD\\nA[Input] --> B[Output]\"). \
     Quote node labels.\n\
     - \"react\": visual_content is a JSON array of row objects with identical keys, \
     e.g. [{\"Step\": \"1\", \"Action\": \"...\"}].\n\
     - \"image\": visual_content is a one-sentence illustration prompt."
}

fn previous_sections(previous: &[Chapter]) -> String {
    if previous.is_empty() {
        return "Previous sections completed: none (this is the first section).".to_owned();
    }
    let mut out = String::from("Previous sections completed (build on these, do not repeat them):\n");
    for ch in previous {
        out.push_str(&format!("{}. {}: {}\n", ch.order, ch.title, ch.key_takeaway));
    }
    out
}

/// Build the detail request for `chapter`, given the ready chapters before it.
pub fn build_detail_request(plan: &Plan, chapter: &Chapter, previous: &[Chapter]) -> CompletionRequest {
    let prompt = format!(
        "Write the detailed content for section {order} of a \"{topic}\" course.\n\n\
         Chapter Title: \"{title}\"\n\
         Mental Model: \"{mental_model}\"\n\
         Key Takeaway: \"{takeaway}\"\n\n\
         Context:\n- Level: {level}\n- Urgency: {urgency}\n- Language: English\n\n\
         {previous}\n\n\
         {instructions}\n\n\
         {visual}\n\n\
         {OUTPUT_SHAPE}",
        order = chapter.order,
        topic = plan.topic,
        title = chapter.title,
        mental_model = chapter.mental_model,
        takeaway = chapter.key_takeaway,
        level = plan.level,
        urgency = plan.urgency,
        previous = previous_sections(previous).trim_end(),
        instructions = intent_instructions(plan.effective_intent()),
        visual = visual_directive(plan),
    );

    let user = match plan.document_context.as_deref() {
        Some(doc) if plan.has_document() => Message::user_parts(vec![
            ContentPart::pdf("document.pdf", doc),
            ContentPart::text(prompt),
        ]),
        _ => Message::user(prompt),
    };
    CompletionRequest::json(vec![Message::system(SYSTEM_PROMPT), user])
}
