//! `profile-store` command-line entry point.
//!
//! Opens the file-backed store described by the TOML config, runs one UI
//! bridge command, and prints its `CommandResult` as JSON on stdout.  Logs go
//! to stderr so the JSON stays machine-readable.
//!
//! ```text
//! main()
//!  └─ load StoreConfig        -- --config / PROFILE_STORE_CONFIG or platform path
//!  └─ init tracing            -- RUST_LOG, else [store] log_level
//!  └─ AppState::from_config   -- FileBlobStore + StaticLegacyState
//!  └─ dispatch subcommand     -- ui_bridge command → JSON
//! ```
//!
//! The exit code is 0 when the command succeeded and 1 when it returned an
//! error payload.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use profile_core::{Document, SettingMap, SettingValue};
use profile_store::infrastructure::storage::config::{config_file_path, load_config_from};
use profile_store::infrastructure::ui_bridge::{self, AppState, CommandResult};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Persisted multi-profile configuration store.
#[derive(Debug, Parser)]
#[command(name = "profile-store", version)]
struct Cli {
    /// Path to the TOML config file.  Defaults to the platform config
    /// directory.
    #[arg(long, global = true, env = "PROFILE_STORE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the stored document.  Overrides `[store] data_dir`.
    #[arg(long, global = true, env = "PROFILE_STORE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List all profiles.
    List,
    /// Show one profile's settings without activating it.
    Show { name: String },
    /// Create or replace a profile.
    Save {
        name: String,
        /// A `key=value` setting; repeatable.  Values are typed: `true`, `5`,
        /// `0.8`, `[a,b]`, otherwise text.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        settings: Vec<String>,
    },
    /// Print a profile's settings and make it current.
    Load { name: String },
    /// Delete a profile.
    Delete { name: String },
    /// Make a profile current.
    Use { name: String },
    /// Print the current profile's name.
    Current,
    /// Check whether a profile exists.
    Exists { name: String },
    /// Bind a mode to a profile id.
    Bind { mode: String, profile_id: String },
    /// Print the profile id bound to a mode.
    Binding { mode: String },
    /// Print the whole stored document.
    Export,
    /// Replace the stored document with the JSON document in `file`.
    Import { file: PathBuf },
    /// Delete all profiles.
    Reset,
}

fn parse_settings(pairs: &[String]) -> anyhow::Result<SettingMap> {
    let mut settings = SettingMap::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("invalid --set {pair:?}: expected KEY=VALUE");
        };
        if key.is_empty() {
            bail!("invalid --set {pair:?}: empty key");
        }
        settings.insert(key.to_string(), SettingValue::parse(raw));
    }
    Ok(settings)
}

fn emit<T: Serialize>(result: CommandResult<T>) -> anyhow::Result<ExitCode> {
    let json = serde_json::to_string_pretty(&result).context("failed to render command result")?;
    println!("{json}");
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run(state: Arc<AppState>, command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::List => emit(ui_bridge::list_profiles(state).await),
        Command::Show { name } => emit(ui_bridge::get_profile(state, name).await),
        Command::Save { name, settings } => {
            let settings = parse_settings(&settings)?;
            emit(ui_bridge::save_profile(state, name, settings).await)
        }
        Command::Load { name } => emit(ui_bridge::load_profile(state, name).await),
        Command::Delete { name } => emit(ui_bridge::delete_profile(state, name).await),
        Command::Use { name } => emit(ui_bridge::set_current_profile(state, name).await),
        Command::Current => emit(ui_bridge::get_current_profile(state).await),
        Command::Exists { name } => emit(ui_bridge::has_profile(state, name).await),
        Command::Bind { mode, profile_id } => {
            emit(ui_bridge::set_mode_binding(state, mode, profile_id).await)
        }
        Command::Binding { mode } => emit(ui_bridge::get_mode_binding(state, mode).await),
        Command::Export => emit(ui_bridge::export_document(state).await),
        Command::Import { file } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let document: Document = serde_json::from_str(&content)
                .with_context(|| format!("{} is not a profile document", file.display()))?;
            emit(ui_bridge::import_document(state, document).await)
        }
        Command::Reset => emit(ui_bridge::reset_all(state).await),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path().context("no --config given and no platform config dir")?,
    };
    let mut config = load_config_from(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = Some(dir);
    }

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.store.log_level)),
        )
        .init();
    debug!(config = %config_path.display(), "configuration loaded");

    let state = AppState::from_config(&config).context("failed to open profile store")?;
    run(state, cli.command).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
