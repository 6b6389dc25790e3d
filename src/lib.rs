pub mod app;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod firewall;
pub mod lifecycle;
pub mod notify;
pub mod settings;

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cli::Cli;
use error::AppError;
use lifecycle::{OsPrivilege, StartupDecision};
use notify::ConsoleSink;

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in SaveBlocker: {info}");
        default_hook(info);
    }));

    init_logging(cli.verbose, &cli.log_path());

    match try_run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let code = e
                .downcast_ref::<AppError>()
                .map(AppError::exit_code)
                .unwrap_or(config::EXIT_FATAL);
            tracing::error!("Fatal error: {e:#}");
            eprintln!("Application failed: {e:#}");
            ExitCode::from(code)
        }
    }
}

fn try_run(cli: Cli) -> anyhow::Result<u8> {
    lifecycle::ensure_supported_platform()?;

    let decision = lifecycle::resolve_privilege(&OsPrivilege, &ConsoleSink, !cli.no_elevation)?;
    if decision == StartupDecision::HandedOff {
        return Ok(config::EXIT_OK);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config::WORKER_THREADS)
        .thread_name("saveblocker-worker")
        .enable_all()
        .build()
        .context("failed to start worker pool")?;

    let options = app::AppOptions {
        config_path: cli.config_path(),
        debounce: cli.debounce(),
        firewall_timeout: cli.firewall_timeout(),
        surfaces: cli.surfaces(),
        hotkeys: !cli.no_hotkeys,
    };
    let result = runtime.block_on(app::run(options));

    // In-flight work is abandoned rather than awaited.
    runtime.shutdown_background();
    result?;
    Ok(config::EXIT_OK)
}

/// Console plus `app.log`. `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool, log_path: &Path) {
    let default_level = if verbose { "saveblocker_lib=debug" } else { "saveblocker_lib=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());

    let file_layer = match open_log_file(log_path) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        ),
        Err(e) => {
            eprintln!("Unable to open log file {}: {e:#}", log_path.display());
            None
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    tracing::debug!("Logging configured (verbose={verbose})");
}

fn open_log_file(path: &Path) -> anyhow::Result<std::fs::File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("failed to open for append")
}
