//! CLI handlers for `expresslearn plan` subcommands.
//!
//! Implements:
//! - `expresslearn plan create <topic>`   -- submit a plan (optionally from a PDF)
//! - `expresslearn plan show [plan-id]`   -- show one plan or list all plans
//! - `expresslearn plan generate <plan>`  -- run the outline step
//! - `expresslearn plan export <plan>`    -- write the plan as Markdown

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sqlx::PgPool;
use uuid::Uuid;

use learn_core::export::plan_to_markdown;
use learn_core::plan::{
    OutlineOutcome, PlanRequest, create_plan, generate_plan_content, get_plan_with_chapters,
};
use learn_db::models::{Chapter, Plan};
use learn_db::queries::{chapters as chapter_queries, plans as plan_queries};

use crate::PlanCommands;
use crate::config::AppConfig;
use crate::resolve::resolve_plan_id;

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(command: PlanCommands, pool: &PgPool, config: &AppConfig) -> Result<()> {
    match command {
        PlanCommands::Create {
            topic,
            urgency,
            level,
            language,
            mode,
            document,
            generate,
        } => {
            let document = document.as_deref().map(read_document).transpose()?;
            let request = PlanRequest {
                topic,
                urgency,
                level,
                language,
                mode,
                document,
            };
            let plan = cmd_create(pool, &request).await?;
            if generate {
                cmd_generate(pool, config, plan.id).await?;
            }
            Ok(())
        }
        PlanCommands::Show { plan_id } => match plan_id {
            Some(id) => cmd_show_one(pool, resolve_plan_id(pool, &id).await?).await,
            None => cmd_show_all(pool).await,
        },
        PlanCommands::Generate { plan_id } => {
            cmd_generate(pool, config, resolve_plan_id(pool, &plan_id).await?).await
        }
        PlanCommands::Export { plan_id, output } => {
            cmd_export(pool, resolve_plan_id(pool, &plan_id).await?, output.as_deref()).await
        }
    }
}

/// Read a PDF from disk and base64-encode it for submission.
fn read_document(path: &str) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read document: {path}"))?;
    Ok(STANDARD.encode(bytes))
}

async fn cmd_create(pool: &PgPool, request: &PlanRequest) -> Result<Plan> {
    let plan = create_plan(pool, request).await?;

    println!("Plan created.");
    println!();
    println!("  Plan ID:   {}", plan.id);
    println!("  Topic:     {}", plan.topic);
    println!("  Mode:      {}", plan.mode);
    println!("  Language:  {}", plan.language);
    println!("  Document:  {}", if plan.has_document() { "attached" } else { "none" });
    println!();
    println!("Next: `expresslearn learn {}`", plan.id);

    Ok(plan)
}

// -----------------------------------------------------------------------
// expresslearn plan show
// -----------------------------------------------------------------------

async fn cmd_show_all(pool: &PgPool) -> Result<()> {
    let plans = plan_queries::list_plans(pool).await?;

    if plans.is_empty() {
        println!("No plans found. Use `expresslearn plan create <topic>` to create one.");
        return Ok(());
    }

    let mut rows = Vec::with_capacity(plans.len());
    for plan in &plans {
        let total = chapter_queries::count_chapters_for_plan(pool, plan.id).await?;
        let pending = chapter_queries::count_pending_chapters(pool, plan.id).await?;
        rows.push((plan, format!("{}/{}", total - pending, total)));
    }

    // ID is always 36 chars (UUID). Longest status is structure_ready.
    let id_w = 36;
    let topic_w = plans
        .iter()
        .map(|p| p.topic.chars().count().min(40))
        .max()
        .unwrap_or(5)
        .max(5);
    let status_w = 15;
    let ready_w = 7;

    println!(
        "{:<id_w$}  {:<topic_w$}  {:<status_w$}  {:>ready_w$}  CREATED",
        "ID", "TOPIC", "STATUS", "READY",
    );
    for (plan, ready) in rows {
        let topic: String = plan.topic.chars().take(40).collect();
        let created = plan.created_at.format("%Y-%m-%d %H:%M");
        println!(
            "{:<id_w$}  {:<topic_w$}  {:<status_w$}  {:>ready_w$}  {}",
            plan.id, topic, plan.status.to_string(), ready, created,
        );
    }

    Ok(())
}

async fn cmd_show_one(pool: &PgPool, plan_id: Uuid) -> Result<()> {
    let (plan, chapters) = get_plan_with_chapters(pool, plan_id).await?;
    print_plan(&plan, &chapters);
    Ok(())
}

fn print_plan(plan: &Plan, chapters: &[Chapter]) {
    println!("Plan: {}", plan.topic);
    println!("  ID:        {}", plan.id);
    println!("  Status:    {}", plan.status);
    println!("  Mode:      {}", plan.mode);
    println!("  Level:     {}", plan.level);
    println!("  Urgency:   {}", plan.urgency);
    println!("  Language:  {}", plan.language);
    if let Some(intent) = plan.intent {
        println!("  Intent:    {intent}");
    }
    println!(
        "  Created:   {}",
        plan.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(strategy) = plan.curriculum_strategy.as_deref() {
        println!();
        println!("  {}", strategy.trim());
    }

    if chapters.is_empty() {
        println!();
        println!("No chapters yet. Run `expresslearn plan generate {}`.", plan.id);
        return;
    }

    println!();
    println!("Chapters:");
    for ch in chapters {
        let marker = match (ch.is_completed, ch.is_ready()) {
            (true, _) => "x",
            (false, true) => "+",
            (false, false) => " ",
        };
        println!("  [{marker}] {:>2}. {}", ch.order, ch.title);
        if !ch.key_takeaway.trim().is_empty() {
            println!("         {}", ch.key_takeaway.trim());
        }
    }

    if !plan.next_steps.is_empty() {
        println!();
        println!("Next steps:");
        for step in &plan.next_steps {
            println!("  - {step}");
        }
    }
}

// -----------------------------------------------------------------------
// expresslearn plan generate
// -----------------------------------------------------------------------

pub async fn cmd_generate(pool: &PgPool, config: &AppConfig, plan_id: Uuid) -> Result<()> {
    let llm = crate::build_llm(config)?;
    match generate_plan_content(pool, llm.as_ref(), plan_id).await? {
        OutlineOutcome::AlreadyGenerated => {
            println!("Plan {plan_id} already has an outline; nothing to do.");
        }
        OutlineOutcome::Generated { plan, chapters } => {
            println!("Outline generated: {} chapters.", chapters.len());
            println!();
            print_plan(&plan, &chapters);
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------
// expresslearn plan export
// -----------------------------------------------------------------------

async fn cmd_export(pool: &PgPool, plan_id: Uuid, output: Option<&str>) -> Result<()> {
    let (plan, chapters) = get_plan_with_chapters(pool, plan_id).await?;
    let markdown = plan_to_markdown(&plan, &chapters);

    match output {
        Some(path) => {
            std::fs::write(path, &markdown)
                .with_context(|| format!("failed to write to {path}"))?;
            println!("Plan exported to {path}");
        }
        None => print!("{markdown}"),
    }

    Ok(())
}
