//! `expresslearn learn <plan>`: build the outline if needed, then generate
//! chapters one at a time and print each as it becomes ready.
//!
//! Ctrl+C stops after abandoning the in-flight chapter, which stays pending
//! for the next run.

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use learn_core::plan::{OutlineOutcome, generate_plan_content, get_plan_with_chapters};
use learn_core::queue::{DriveSummary, LazyLoadQueue, PipelineSource, QueueEvent, drive};

use crate::chapter_cmds::format_chapter;
use crate::config::AppConfig;
use crate::resolve::resolve_plan_id;

fn print_event(event: &QueueEvent) {
    match event {
        QueueEvent::Started { order, title, .. } => {
            println!("Generating chapter {order}: {title} ...");
        }
        QueueEvent::Ready(chapter) => print!("{}", format_chapter(chapter)),
        QueueEvent::Failed { order, reason, .. } => {
            println!("Chapter {order} failed: {reason}");
        }
        QueueEvent::Cancelled => println!("Stopped."),
    }
}

fn merge(total: &mut DriveSummary, pass: DriveSummary) {
    total.generated += pass.generated;
    total.failed += pass.failed;
    total.cancelled |= pass.cancelled;
}

pub async fn run_learn(
    pool: &PgPool,
    config: &AppConfig,
    plan_arg: &str,
    retry_failed: bool,
) -> Result<()> {
    let plan_id = resolve_plan_id(pool, plan_arg).await?;
    let llm = crate::build_llm(config)?;

    if let OutlineOutcome::Generated { chapters, .. } =
        generate_plan_content(pool, llm.as_ref(), plan_id).await?
    {
        println!("Outline ready: {} chapters.", chapters.len());
    }

    let (plan, chapters) = get_plan_with_chapters(pool, plan_id).await?;
    println!("{} ({})", plan.topic, plan.status);
    for ch in chapters.iter().filter(|c| c.is_ready()) {
        print!("{}", format_chapter(ch));
    }

    let mut queue = LazyLoadQueue::new(chapters);
    let source = PipelineSource::new(pool.clone(), Arc::clone(&llm));
    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut summary = drive(&mut queue, &source, &cancel, print_event).await;

    if retry_failed && !summary.cancelled && !queue.failed().is_empty() {
        let retried = queue.retry_all();
        println!("Retrying {retried} failed chapter(s)...");
        let pass = drive(&mut queue, &source, &cancel, print_event).await;
        merge(&mut summary, pass);
    }
    ctrl_c.abort();

    tracing::info!(
        plan_id = %plan_id,
        generated = summary.generated,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "learn session finished"
    );

    println!();
    println!(
        "Generated {} chapter(s), {} failure(s).",
        summary.generated, summary.failed
    );
    let failed = queue.failed();
    if !failed.is_empty() {
        println!("Still failed:");
        for ch in failed {
            let reason = queue.failure_reason(ch.id).unwrap_or("unknown error");
            println!("  {}. {} ({reason})", ch.order, ch.title);
        }
        println!("Run again with --retry-failed to try them once more.");
    } else if queue.all_ready() {
        println!("All chapters ready. Export with `expresslearn plan export {plan_id}`.");
    }

    Ok(())
}
