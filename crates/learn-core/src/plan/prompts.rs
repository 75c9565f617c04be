//! Prompt construction for the outline step. Pure functions, no I/O.

use learn_db::models::{Plan, PlanMode};

use crate::llm::{CompletionRequest, ContentPart, Message};

/// Which outline prompt a plan gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineTemplate {
    /// A PDF is attached: chapters come only from the document.
    Document,
    /// Narrative mode: chapters are scenes in a story arc.
    Story,
    /// Plain topic string.
    Topic,
}

/// Document beats story beats topic.
pub fn select_outline_template(plan: &Plan) -> OutlineTemplate {
    if plan.has_document() {
        OutlineTemplate::Document
    } else if plan.mode == PlanMode::Story {
        OutlineTemplate::Story
    } else {
        OutlineTemplate::Topic
    }
}

const SYSTEM_PROMPT: &str =
    "You are a strict, no-nonsense teacher. You hate fluff. Output valid JSON.";

const OUTPUT_SHAPE: &str = r#"Output JSON (valid JSON only, no extra text):
{
  "intent": "learning" | "solving" | "preparing",
  "curriculum_strategy": "2-sentence approach explanation",
  "chapters": [{ "title": "...", "mental_model": "...", "key_takeaway": "..." }],
  "next_steps": ["..."]
}"#;

const INTENT_RULES: &str = r#"INTENT DETECTION (choose EXACTLY ONE; it controls everything below)

SOLVING: the learner wants you to DO THE WORK and produce a deliverable.
  Keywords: solve, answer, calculate, complete, write, finish, assignment, homework.
PREPARING: the learner wants quick revision for a test or interview.
  Keywords: prepare, revise, interview, exam, test, review, remember, cram.
LEARNING: the learner wants to UNDERSTAND concepts (default).
  Keywords: explain, teach, understand, what is, how does, why.

Decision rules:
1. If the material contains problems, questions or assignments, choose SOLVING.
2. If the learner says solve, answer, complete, write or "do this", choose SOLVING.
3. If the learner mentions an exam, interview, test or revision, choose PREPARING.
4. If unsure between SOLVING and LEARNING, choose SOLVING.
5. Choose LEARNING only when the learner wants to understand concepts.
Do NOT mix intents.

IF LEARNING:
- Each chapter teaches ONE concept, in simple bite-sized language.
- Each chapter continues where the previous one left off. No jumps.
- Focus on the "why" and the "how".

IF SOLVING:
- You are NOT making a plan. You ARE writing the actual submission.
- Each chapter is ONE COMPLETED SECTION of the answer.
- key_takeaway is THE ACTUAL WRITTEN CONTENT, not a description of it.
  WRONG: "Calculate the total cost"  RIGHT: "Total cost = $150 + $75 + $25 = $250"

IF PREPARING:
- Each chapter is one key point to remember, in last-minute revision format.
- Include mnemonics, quick facts and common mistakes to avoid.

Chapter fields by intent:
- LEARNING: title=concept, mental_model=analogy, key_takeaway=key insight
- SOLVING: title=step, mental_model=approach used, key_takeaway=ACTUAL RESULT
- PREPARING: title=topic to remember, mental_model=memory trick, key_takeaway=key fact"#;

const QUALITY_RULES: &str = r#"OUTPUT QUALITY RULES:
- Keep chapter titles short, specific and action-oriented.
- Every chapter has a distinct mental_model.
- key_takeaway is 1-2 dense, specific sentences.
- curriculum_strategy is exactly 2 sentences on how you chose the sequence.
- next_steps are 3-7 actionable, specific follow-ups."#;

fn context_block(plan: &Plan) -> String {
    format!(
        "Context:\n- Urgency: {}\n- Level: {}\n- Language: English (content is translated later)",
        plan.urgency, plan.level
    )
}

fn document_prompt(plan: &Plan) -> String {
    format!(
        "You are an expert curriculum designer. The learner attached a PDF.\n\
         The learner entered: \"{topic}\"\n\n\
         {INTENT_RULES}\n\n\
         CRITICAL: Generate 10-12 mini-chapters using ONLY information from the PDF.\n\
         If the PDF does not cover the request fully, produce the best chapters you can \
         from what it contains and note the missing information in \"next_steps\".\n\n\
         {context}\n\n{QUALITY_RULES}\n\n{OUTPUT_SHAPE}",
        topic = plan.topic,
        context = context_block(plan),
    )
}

fn story_prompt(plan: &Plan) -> String {
    format!(
        "You are a storyteller who teaches through narrative.\n\
         Turn \"{topic}\" into a short illustrated story with a clear arc: \
         setup, rising tension, turning point, resolution.\n\n\
         - Produce 5-7 scenes. Each scene is one chapter.\n\
         - Each scene teaches exactly one idea through what the characters do.\n\
         - title names the scene; mental_model is the image or metaphor the reader \
         should keep; key_takeaway is the lesson of the scene.\n\
         - Use \"learning\" as the intent unless the request is clearly an assignment.\n\n\
         {context}\n\n{QUALITY_RULES}\n\n{OUTPUT_SHAPE}",
        topic = plan.topic,
        context = context_block(plan),
    )
}

fn topic_prompt(plan: &Plan) -> String {
    format!(
        "You are an expert curriculum designer.\n\
         Think first: determine the critical path to understanding this topic before writing.\n\n\
         Create a learning plan for: \"{topic}\"\n\n\
         {INTENT_RULES}\n\n\
         Goal: the learner must understand the broad concepts AND the specific mechanics. \
         Avoid vague fluff. Focus on how it works and why it matters.\n\
         Produce 5-7 chapters.\n\n\
         {context}\n\n{QUALITY_RULES}\n\n{OUTPUT_SHAPE}",
        topic = plan.topic,
        context = context_block(plan),
    )
}

/// Build the outline request for a plan.
pub fn build_outline_request(plan: &Plan) -> CompletionRequest {
    let template = select_outline_template(plan);
    let user = match template {
        OutlineTemplate::Document => {
            let document = plan.document_context.clone().unwrap_or_default();
            Message::user_parts(vec![
                ContentPart::pdf("document.pdf", document),
                ContentPart::text(document_prompt(plan)),
            ])
        }
        OutlineTemplate::Story => Message::user(story_prompt(plan)),
        OutlineTemplate::Topic => Message::user(topic_prompt(plan)),
    };
    CompletionRequest::json(vec![Message::system(SYSTEM_PROMPT), user])
}
