//! CLI handlers for `expresslearn chapter` subcommands.

use anyhow::Result;
use sqlx::PgPool;

use learn_core::chapter::{generate_chapter_content, mark_chapter_completed};
use learn_core::visual::{Visual, render_visual};
use learn_db::models::Chapter;

use crate::ChapterCommands;
use crate::config::AppConfig;
use crate::resolve::resolve_chapter_id;

pub async fn run_chapter_command(
    command: ChapterCommands,
    pool: &PgPool,
    config: &AppConfig,
) -> Result<()> {
    match command {
        ChapterCommands::Generate { chapter_id } => {
            let id = resolve_chapter_id(pool, &chapter_id).await?;
            let llm = crate::build_llm(config)?;
            let chapter = generate_chapter_content(pool, llm.as_ref(), id).await?;
            print!("{}", format_chapter(&chapter));
            Ok(())
        }
        ChapterCommands::Complete { chapter_id, undo } => {
            let id = resolve_chapter_id(pool, &chapter_id).await?;
            let chapter = mark_chapter_completed(pool, id, !undo).await?;
            let state = if chapter.is_completed { "completed" } else { "not completed" };
            println!("Chapter {}. {} marked {state}.", chapter.order, chapter.title);
            Ok(())
        }
    }
}

fn format_visual(visual: &Visual) -> String {
    match visual {
        Visual::None => String::new(),
        Visual::Diagram { source } => format!("  [diagram]\n{}\n", indent(source, 4)),
        Visual::Table { headers, rows } => {
            let mut out = format!("    {}\n", headers.join(" | "));
            for row in rows {
                out.push_str(&format!("    {}\n", row.join(" | ")));
            }
            out
        }
        Visual::Text { text } => format!("{}\n", indent(text, 4)),
        Visual::Illustration { prompt } => format!("  [illustration] {prompt}\n"),
        Visual::Unrenderable { message } => format!("  [{message}]\n"),
    }
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|l| format!("{pad}{l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain-text rendering of a chapter for the terminal.
pub fn format_chapter(ch: &Chapter) -> String {
    let mut out = format!("\n== {}. {} ==\n\n", ch.order, ch.title.trim());
    if !ch.mental_model.trim().is_empty() {
        out.push_str(&format!("Mental model: {}\n\n", ch.mental_model.trim()));
    }
    if !ch.is_ready() {
        out.push_str("(not generated yet)\n");
        return out;
    }
    out.push_str(&format!("{}\n\n", ch.explanation.trim()));

    let visual = format_visual(&render_visual(ch.visual_type, &ch.visual_content));
    if !visual.is_empty() {
        out.push_str(&visual);
        out.push('\n');
    }
    for (label, body) in [
        ("Misconception", &ch.common_misconception),
        ("Example", &ch.real_world_example),
        ("Quiz", &ch.quiz_question),
        ("Answer", &ch.quiz_answer),
        ("Takeaway", &ch.key_takeaway),
    ] {
        if !body.trim().is_empty() {
            out.push_str(&format!("{label}: {}\n", body.trim()));
        }
    }
    out
}
