//! Runtime configuration: CLI arguments, data directory, identity, logging.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use skyrchitect_core::DocumentId;
use skyrchitect_session::{AutosaveConfig, UserId};
use tracing_subscriber::EnvFilter;

/// Terminal editor for cloud architecture diagrams
#[derive(Parser, Debug)]
#[command(name = "skyrchitect")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Identity that owns the autosave snapshots (defaults to $USER)
    #[arg(long, value_name = "NAME")]
    pub user: Option<String>,

    /// Document to open; defaults to the most recently saved one
    #[arg(long, value_name = "UUID")]
    pub document: Option<DocumentId>,

    /// Where snapshots and the log file live
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Forced save period while there are unsaved changes
    #[arg(long, value_name = "MS", default_value_t = 30_000)]
    pub autosave_interval_ms: u64,

    /// Quiet period after the last edit before saving
    #[arg(long, value_name = "MS", default_value_t = 2_000)]
    pub debounce_ms: u64,

    /// Only save on Ctrl+S and on exit
    #[arg(long)]
    pub no_autosave: bool,

    /// Print the keyboard shortcuts and exit
    #[arg(long)]
    pub list_shortcuts: bool,
}

impl Args {
    pub fn autosave_config(&self) -> AutosaveConfig {
        AutosaveConfig {
            enabled: !self.no_autosave,
            interval: Duration::from_millis(self.autosave_interval_ms),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn user_id(&self) -> UserId {
        resolve_user(self.user.as_deref(), |name| std::env::var(name).ok())
    }
}

/// `$XDG_DATA_HOME/skyrchitect`, falling back to `~/.local/share/skyrchitect`
pub fn default_data_dir() -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local/share")
        });
    data_dir.join("skyrchitect")
}

/// Explicit flag, then the login name from the environment, then "local"
fn resolve_user(flag: Option<&str>, env: impl Fn(&str) -> Option<String>) -> UserId {
    let present = |n: &String| !n.trim().is_empty();
    let name = flag
        .map(str::to_owned)
        .filter(present)
        .or_else(|| env("USER").filter(present))
        .or_else(|| env("USERNAME").filter(present))
        .unwrap_or_else(|| "local".to_string());
    UserId::new(name)
}

/// Log to `<data_dir>/skyrchitect.log`; the terminal belongs to the UI.
/// Filter with `RUST_LOG`, default `info`.
pub fn init_logging(data_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(data_dir).with_context(|| format!("creating {}", data_dir.display()))?;
    let path = data_dir.join("skyrchitect.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;
    Ok(path)
}
