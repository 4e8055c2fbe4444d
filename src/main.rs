use actix_web::{web, App, HttpServer};
use anyhow::{bail, Context, Result};
use clap::Parser;
use journal_prompts::analysis::Taxonomy;
use journal_prompts::gateway::{OpenAiConfig, OpenAiGenerator};
use journal_prompts::scheduler::{spawn_cleanup, spawn_workers};
use journal_prompts::storage::{EntrySource, FileSystemStorage, MemoryStorage, PostgresStorage, ProfileSource, PromptStorage};
use journal_prompts::triggers::SessionRegistry;
use journal_prompts::{GenerationConfig, Orchestrator, PromptService, Scheduler, SessionConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to run the server on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Storage backend type (memory, filesystem, postgres)
    #[arg(long, env = "STORAGE", default_value = "filesystem")]
    storage: String,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    db_url: Option<String>,

    /// Directory for prompt, profile and entry files (filesystem storage)
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Base URL of the OpenAI-compatible chat completions API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o")]
    openai_model: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Background generation workers
    #[arg(long, env = "WORKERS", default_value_t = 4)]
    workers: usize,

    /// Seconds before a generation call is abandoned
    #[arg(long, env = "GENERATION_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Days an inactive prompt is kept before cleanup deletes it
    #[arg(long, env = "RETENTION_DAYS", default_value_t = 30)]
    retention_days: u32,

    /// Seconds between cleanup runs
    #[arg(long, env = "CLEANUP_INTERVAL_SECS", default_value_t = 86_400)]
    cleanup_interval_secs: u64,

    /// JSON file replacing the built-in keyword taxonomy
    #[arg(long, env = "TAXONOMY")]
    taxonomy: Option<PathBuf>,
}

struct Backends {
    prompts: Arc<dyn PromptStorage>,
    profiles: Arc<dyn ProfileSource>,
    entries: Arc<dyn EntrySource>,
}

impl Backends {
    fn shared<S>(store: S) -> Self
    where
        S: PromptStorage + ProfileSource + EntrySource,
    {
        let store = Arc::new(store);
        Self {
            prompts: store.clone(),
            profiles: store.clone(),
            entries: store,
        }
    }
}

async fn open_storage(args: &Cli) -> Result<Backends> {
    match args.storage.as_str() {
        "memory" => {
            tracing::info!("Using in-memory storage");
            Ok(Backends::shared(MemoryStorage::new()))
        }
        "filesystem" => {
            tracing::info!(path = %args.data_dir.display(), "Using filesystem storage");
            Ok(Backends::shared(FileSystemStorage::new(&args.data_dir)))
        }
        "postgres" => {
            let db_url = args
                .db_url
                .as_deref()
                .context("--db-url is required for postgres storage")?;
            tracing::info!("Using PostgreSQL storage");
            let pg_storage = PostgresStorage::new(db_url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            pg_storage.init_schema().await.context("Failed to initialize DB schema")?;
            tracing::info!("Database schema initialized (if not exists)");
            Ok(Backends::shared(pg_storage))
        }
        other => bail!("Unsupported storage type: {other}"),
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    // RUST_LOG=journal_prompts=debug for workflow detail
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Cli::parse();
    tracing::info!(port = args.port, storage = %args.storage, workers = args.workers, "Starting journal prompts server");

    let backends = open_storage(&args).await?;
    let taxonomy = Arc::new(Taxonomy::load(args.taxonomy.as_deref()).await?);
    let timeout = Duration::from_secs(args.timeout_secs);

    if args.openai_api_key.is_none() {
        tracing::warn!("No OpenAI API key configured; generation will fall back to templates");
    }
    let generator = OpenAiGenerator::new(
        OpenAiConfig {
            base_url: args.openai_base_url.clone(),
            api_key: args.openai_api_key.clone(),
            model: args.openai_model.clone(),
            timeout,
        },
        taxonomy,
    )
    .context("Failed to build text generator client")?;

    let config = GenerationConfig {
        generation_timeout: timeout,
        ..GenerationConfig::default()
    };
    let orchestrator = Orchestrator::new(
        backends.prompts.clone(),
        backends.profiles.clone(),
        backends.entries.clone(),
        Arc::new(generator),
        config.clone(),
    )
    .context("Failed to compile instruction templates")?;

    let (scheduler, rx) = Scheduler::channel();
    let _workers = spawn_workers(Arc::new(orchestrator), rx, args.workers);
    let _cleanup = spawn_cleanup(
        backends.prompts.clone(),
        Duration::from_secs(args.cleanup_interval_secs),
        args.retention_days,
    );

    let sessions = SessionRegistry::new(SessionConfig::default(), scheduler.clone());
    let service = web::Data::new(PromptService::new(
        backends.prompts,
        backends.entries,
        scheduler,
        sessions,
        &config,
    ));

    let addr = ("127.0.0.1", args.port);
    tracing::info!(address = ?addr, "Starting HTTP server");
    HttpServer::new(move || App::new().app_data(service.clone()).configure(journal_prompts::api::configure))
        .bind(addr)?
        .run()
        .await?;
    Ok(())
}
