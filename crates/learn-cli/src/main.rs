mod chapter_cmds;
mod config;
mod learn_cmd;
mod plan_cmds;
mod resolve;
mod serve_cmd;
#[cfg(test)]
mod test_util;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::PgPool;

use learn_core::llm::{self, CompletionProvider};
use learn_db::models::PlanMode;
use learn_db::pool;

use config::{AppConfig, LlmOverrides};

#[derive(Parser)]
#[command(
    name = "expresslearn",
    about = "Generate short learning curricula from a topic or a PDF"
)]
struct Cli {
    /// Database URL (overrides EXPRESSLEARN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Model provider: openai or gemini (overrides AI_PROVIDER)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name (overrides EXPRESSLEARN_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/expresslearn")]
        db_url: String,
        /// API key for the chosen provider
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the database
    DbInit,
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Chapter management
    Chapter {
        #[command(subcommand)]
        command: ChapterCommands,
    },
    /// Build a plan's outline if needed, then generate chapters one at a time
    Learn {
        /// Plan ID or `latest`
        plan_id: String,
        /// Re-enter failed chapters once after the first pass
        #[arg(long)]
        retry_failed: bool,
    },
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Submit a new plan
    Create {
        /// What to learn
        topic: String,
        /// How soon the learner needs it (e.g. today, this week)
        #[arg(long, default_value = "today")]
        urgency: String,
        /// Learner level (e.g. beginner, expert)
        #[arg(long, default_value = "beginner")]
        level: String,
        /// Output language
        #[arg(long, default_value = "English")]
        language: String,
        /// standard or story
        #[arg(long, default_value = "standard")]
        mode: PlanMode,
        /// PDF to build the curriculum from
        #[arg(long)]
        document: Option<String>,
        /// Run the outline step right away
        #[arg(long)]
        generate: bool,
    },
    /// Show plan details (or list all plans)
    Show {
        /// Plan ID or `latest` (omit to list all)
        plan_id: Option<String>,
    },
    /// Generate the chapter outline (no-op if it already exists)
    Generate {
        /// Plan ID or `latest`
        plan_id: String,
    },
    /// Export a plan as Markdown
    Export {
        /// Plan ID or `latest`
        plan_id: String,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ChapterCommands {
    /// Generate the detail for one chapter
    Generate {
        /// Chapter ID or `<plan>:<order>`
        chapter_id: String,
    },
    /// Mark a chapter as read (or unread with --undo)
    Complete {
        /// Chapter ID or `<plan>:<order>`
        chapter_id: String,
        #[arg(long)]
        undo: bool,
    },
}

/// Execute `expresslearn init`: write the config file.
fn cmd_init(
    db_url: &str,
    overrides: &LlmOverrides,
    api_key: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_owned(),
        },
        llm: config::LlmSection {
            provider: overrides.provider.clone(),
            model: overrides.model.clone(),
            api_key,
            ..config::LlmSection::default()
        },
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if let Some(provider) = &cfg.llm.provider {
        println!("  llm.provider = {provider}");
    }
    if cfg.llm.api_key.is_some() {
        println!("  llm.api_key  = (set)");
    }
    println!();
    println!("Next: run `expresslearn db-init` to create and migrate the database.");

    Ok(())
}

/// Execute `expresslearn db-init`: create the database and run migrations.
async fn cmd_db_init(config: &AppConfig) -> anyhow::Result<()> {
    println!("Initializing expresslearn database...");

    pool::ensure_database_exists(&config.db_config).await?;
    let db_pool = pool::create_pool(&config.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;
    println!("expresslearn db-init complete.");
    Ok(())
}

/// Build the configured completion provider.
pub fn build_llm(config: &AppConfig) -> anyhow::Result<Arc<dyn CompletionProvider>> {
    let llm_config = config.llm_config()?;
    Ok(llm::provider_from_config(&llm_config)?)
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    pool::create_pool(&config.db_config).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let overrides = LlmOverrides {
        provider: cli.provider,
        model: cli.model,
    };

    let config = AppConfig::resolve(cli.database_url.as_deref(), overrides.clone());

    match cli.command {
        Commands::Init {
            db_url,
            api_key,
            force,
        } => {
            cmd_init(&db_url, &overrides, api_key, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(&config).await?;
        }
        Commands::Plan { command } => {
            let db_pool = connect(&config).await?;
            let result = plan_cmds::run_plan_command(command, &db_pool, &config).await;
            db_pool.close().await;
            result?;
        }
        Commands::Chapter { command } => {
            let db_pool = connect(&config).await?;
            let result = chapter_cmds::run_chapter_command(command, &db_pool, &config).await;
            db_pool.close().await;
            result?;
        }
        Commands::Learn {
            plan_id,
            retry_failed,
        } => {
            let db_pool = connect(&config).await?;
            let result = learn_cmd::run_learn(&db_pool, &config, &plan_id, retry_failed).await;
            db_pool.close().await;
            result?;
        }
        Commands::Serve { bind, port } => {
            let db_pool = connect(&config).await?;
            let llm_config = config.llm_config()?;
            let state = serve_cmd::AppState {
                pool: db_pool.clone(),
                llm: llm::provider_from_config(&llm_config)?,
                images: llm::image_generator_from_config(&llm_config),
            };
            let result = serve_cmd::run_serve(state, &bind, port).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
