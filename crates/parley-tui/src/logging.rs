use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives come from this variable
pub const LOG_ENV: &str = "PARLEY_LOG";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Log to a file; the TUI owns the terminal
pub fn init_file(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join("parley.log");
    let file: File = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_target(true).with_writer(Mutex::new(file)))
        .with(filter("info"))
        .try_init()?;
    Ok(())
}

/// Log to stderr for the non-interactive commands, quiet unless asked
pub fn init_stderr() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter("warn"))
        .try_init()?;
    Ok(())
}
