//! toolrelay - let a model drive a sandboxed coding tool server.
//!
//! Main entry point for the toolrelay CLI.

mod cli;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use toolrelay_config::{ConfigLoader, RunConfig, default_config_path};
use toolrelay_oracle_openai::OpenAiOracle;
use toolrelay_protocols::{NoopObserver, ProgressObserver};
use toolrelay_runtime::RunSession;

use crate::cli::Cli;
use crate::progress::ConsoleProgress;

/// Get the toolrelay home directory (~/.toolrelay).
fn toolrelay_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".toolrelay"))
        .unwrap_or_else(|| PathBuf::from(".toolrelay"))
}

/// Initialize tracing with stderr and daily rolling file output.
///
/// Log files are written to ~/.toolrelay/logs/.
fn init_tracing() -> anyhow::Result<()> {
    let log_dir = toolrelay_dir().join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("toolrelay")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The worker flushes until the guard drops, so keep it for the whole process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<RunConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = PathBuf::from(ConfigLoader::expand_path(&path.to_string_lossy()));
            ConfigLoader::load(&path)?
        }
        None => ConfigLoader::load_or_default(&default_config_path())?,
    };
    cli.apply(&mut config);
    Ok(config)
}

fn build_oracle(config: &RunConfig) -> anyhow::Result<OpenAiOracle> {
    let api_key = config
        .oracle
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|key| !key.trim().is_empty())
        .context("OPENAI_API_KEY is not set (export it or put it in .env)")?;

    let mut oracle = OpenAiOracle::new(api_key)
        .with_model(&config.oracle.model)
        .with_temperature(config.oracle.temperature);
    let base_url = config
        .oracle
        .base_url
        .clone()
        .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
        .filter(|url| !url.trim().is_empty());
    if let Some(url) = base_url {
        oracle = oracle.with_base_url(url);
    }
    Ok(oracle)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the key may already be exported.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing()?;

    let config = load_config(&cli)?;
    let oracle = build_oracle(&config)?;
    info!(
        model = %config.oracle.model,
        cwd = %config.resolved_cwd().display(),
        sandbox = %config.sandbox,
        "toolrelay starting"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping tool servers");
                cancel.cancel();
            }
        }
    });

    let observer: Arc<dyn ProgressObserver> = if cli.quiet {
        Arc::new(NoopObserver)
    } else {
        Arc::new(ConsoleProgress)
    };
    let session = RunSession::new(config, Arc::new(oracle))
        .with_observer(observer)
        .with_cancellation(cancel);

    match session.run(&cli.prompt(), cli.resume.clone()).await {
        Ok(result) => {
            println!("{}", result.answer);
            if let Some(thread_id) = &result.thread_id {
                println!("\nRun `codex resume {thread_id}` to continue.");
            }
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            eprintln!("Cancelled.");
            std::process::exit(130);
        }
        Err(e) => Err(e.into()),
    }
}
