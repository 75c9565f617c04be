//! Markdown export of a plan and its chapters.

use std::fmt::Write as _;

use learn_db::models::{Chapter, Plan};

use crate::visual::{Visual, render_visual};

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', "<br>")
}

fn push_visual(out: &mut String, visual: &Visual) {
    match visual {
        Visual::None | Visual::Unrenderable { .. } => {}
        Visual::Diagram { source } => {
            let _ = writeln!(out, "```mermaid\n{source}\n```\n");
        }
        Visual::Table { headers, rows } => {
            let _ = writeln!(
                out,
                "| {} |",
                headers.iter().map(|h| escape_cell(h)).collect::<Vec<_>>().join(" | ")
            );
            let _ = writeln!(out, "|{}", " --- |".repeat(headers.len().max(1)));
            for row in rows {
                let _ = writeln!(
                    out,
                    "| {} |",
                    row.iter().map(|c| escape_cell(c)).collect::<Vec<_>>().join(" | ")
                );
            }
            out.push('\n');
        }
        Visual::Text { text } => {
            let _ = writeln!(out, "> {}\n", text.replace('\n', "\n> "));
        }
        Visual::Illustration { prompt } => {
            let _ = writeln!(out, "*Illustration: {prompt}*\n");
        }
    }
}

fn push_section(out: &mut String, heading: &str, body: &str) {
    if !body.trim().is_empty() {
        let _ = writeln!(out, "**{heading}:** {}\n", body.trim());
    }
}

/// Render a plan as a standalone Markdown document.
pub fn plan_to_markdown(plan: &Plan, chapters: &[Chapter]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", plan.topic.trim());
    let _ = writeln!(
        out,
        "*Level: {} · Urgency: {} · Language: {} · Mode: {}*\n",
        plan.level, plan.urgency, plan.language, plan.mode
    );
    if let Some(strategy) = plan.curriculum_strategy.as_deref().filter(|s| !s.trim().is_empty()) {
        let _ = writeln!(out, "{}\n", strategy.trim());
    }

    let mut ordered: Vec<&Chapter> = chapters.iter().collect();
    ordered.sort_by_key(|c| c.order);

    for ch in ordered {
        let done = if ch.is_completed { " ✓" } else { "" };
        let _ = writeln!(out, "## {}. {}{done}\n", ch.order, ch.title.trim());
        push_section(&mut out, "Mental model", &ch.mental_model);

        if !ch.is_ready() {
            out.push_str("_This chapter has not been generated yet._\n\n");
            continue;
        }

        let _ = writeln!(out, "{}\n", ch.explanation.trim());
        push_visual(&mut out, &render_visual(ch.visual_type, &ch.visual_content));
        push_section(&mut out, "Common misconception", &ch.common_misconception);
        push_section(&mut out, "Real-world example", &ch.real_world_example);
        if !ch.quiz_question.trim().is_empty() {
            let _ = writeln!(out, "**Quiz:** {}\n", ch.quiz_question.trim());
            if !ch.quiz_answer.trim().is_empty() {
                let _ = writeln!(
                    out,
                    "<details><summary>Answer</summary>\n\n{}\n\n</details>\n",
                    ch.quiz_answer.trim()
                );
            }
        }
        push_section(&mut out, "Key takeaway", &ch.key_takeaway);
    }

    if !plan.next_steps.is_empty() {
        out.push_str("## Next steps\n\n");
        for step in &plan.next_steps {
            let _ = writeln!(out, "- {}", step.trim());
        }
        out.push('\n');
    }

    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}
