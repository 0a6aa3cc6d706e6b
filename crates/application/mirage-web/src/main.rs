//! Mirage web server
//!
//! ## Usage
//!
//! ```bash
//! mirage-web                         # HOST/PORT from the environment (0.0.0.0:80)
//! mirage-web --port 8080             # Custom port
//! mirage-web --env-file prod.env     # Load settings from a specific file
//! LOG_FORMAT=json mirage-web         # Structured logs
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use mirage_config::Config;
use mirage_pipeline::{load_system_prompt, GenerationPipeline, OpenAiClientFactory, OpenAiSettings};
use mirage_retention::{DirectoryWatcher, RetentionConfig, RetentionScheduler};
use mirage_store::ResultStore;
use mirage_web::{serve, AppState, RateLimiter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mirage-web", version, about = "Hallucinate whole webpages on demand")]
struct Cli {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Env file to load instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "mirage_web=info,mirage_store=info,mirage_retention=info,mirage_pipeline=info,tower_http=info"
            .into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = match &cli.env_file {
        Some(path) => Config::from_env_file(path),
        None => Config::from_env(),
    }
    .context("invalid configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let store = ResultStore::new(&config.results.dir, config.results.max_files);
    store.ensure_directory().await.with_context(|| {
        format!(
            "failed to prepare result directory {}",
            config.results.dir.display()
        )
    })?;

    let system_prompt = load_system_prompt(config.openai.system_prompt_path.as_deref()).await?;
    let clients = OpenAiClientFactory::new(OpenAiSettings {
        base_url: config.openai.base_url.clone(),
        model: config.openai.model.clone(),
        timeout: config.openai.timeout,
    })?;
    let pipeline = GenerationPipeline::new(store.clone(), Arc::new(clients), system_prompt);

    // Retention: periodic passes always, debounced passes while the watch holds.
    let (watcher, changes) = match DirectoryWatcher::watch(store.dir()) {
        Ok((watcher, changes)) => (Some(watcher), changes),
        Err(e) => {
            tracing::warn!("Directory watch unavailable, relying on periodic cleanup: {}", e);
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            (None, rx)
        }
    };
    let retention = RetentionScheduler::new(
        Arc::new(store),
        RetentionConfig {
            max_files: config.results.max_files,
            interval: config.results.cleanup_interval,
            debounce: config.results.cleanup_debounce,
        },
    )
    .spawn(changes);

    let state = Arc::new(AppState::new(
        pipeline,
        config.results.history_page_size,
        RateLimiter::new(config.rate_limit),
        config.public_dir.clone(),
    ));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    serve(state, listener, shutdown_signal()).await?;

    tracing::info!("Server stopped, shutting down retention");
    drop(watcher);
    let stats = retention.stats();
    retention.shutdown().await;
    tracing::info!(
        periodic = stats.periodic_passes,
        debounced = stats.debounced_passes,
        evicted = stats.evicted,
        failures = stats.failures,
        "Retention stopped"
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Ctrl-C received, draining connections");
}
