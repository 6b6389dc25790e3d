//! Command-line surface.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::config;
use crate::notify::Surfaces;

#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version)]
pub struct Cli {
    /// Settings file path [default: $SAVEBLOCKER_HOME/config.json or ~/.saveblocker/config.json]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run without the status overlay
    #[arg(long)]
    pub headless: bool,

    /// Do not use global keyboard hotkeys
    #[arg(long)]
    pub no_hotkeys: bool,

    /// Do not show a system tray icon
    #[arg(long)]
    pub no_tray: bool,

    /// Minimum seconds between accepted toggle requests
    #[arg(long, default_value_t = config::DEFAULT_DEBOUNCE_SECS, value_parser = parse_debounce)]
    pub debounce: f64,

    /// Timeout in seconds for each firewall command
    #[arg(long, default_value_t = config::DEFAULT_FIREWALL_TIMEOUT_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub firewall_timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Exit instead of asking for administrator elevation
    #[arg(long)]
    pub no_elevation: bool,
}

fn parse_debounce(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err("must be a non-negative number of seconds".into());
    }
    Ok(secs)
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| settings_home().join(config::CONFIG_FILE_NAME))
    }

    /// Log file sits next to the settings file.
    pub fn log_path(&self) -> PathBuf {
        log_path_for(&self.config_path())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs_f64(self.debounce)
    }

    pub fn firewall_timeout(&self) -> Duration {
        Duration::from_secs(self.firewall_timeout)
    }

    pub fn surfaces(&self) -> Surfaces {
        Surfaces {
            overlay: !self.headless,
            tray: !self.no_tray,
        }
    }
}

fn log_path_for(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(config::LOG_FILE_NAME)
}

/// `$SAVEBLOCKER_HOME`, else `~/.saveblocker`, else the working directory.
pub fn settings_home() -> PathBuf {
    if let Some(home) = std::env::var_os(config::HOME_ENV_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(config::HOME_DIR_NAME),
        None => PathBuf::from(config::HOME_DIR_NAME),
    }
}
