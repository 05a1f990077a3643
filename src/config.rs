//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

use crate::state::StateSettings;

/// Application name, used for the default data directory
pub const APP_NAME: &str = "countdown-keeper";

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "countdown-keeper")]
#[command(about = "A countdown timer service with categories and a completion history")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Directory holding the persisted timers and history
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory history exports are written to
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Quiet period in milliseconds before a change is written to disk
    #[arg(long, default_value = "250")]
    pub write_debounce_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Data directory: explicit flag, else the platform data dir
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join(APP_NAME))
                .unwrap_or_else(|| PathBuf::from(".").join(APP_NAME))
        })
    }

    /// Export directory: explicit flag, else the user's download directory
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Settings handed to `AppState`
    pub fn state_settings(&self) -> StateSettings {
        StateSettings {
            port: self.port,
            host: self.host.clone(),
            export_dir: self.export_dir(),
            write_debounce: Duration::from_millis(self.write_debounce_ms),
        }
    }
}
