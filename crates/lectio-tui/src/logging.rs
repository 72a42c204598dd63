//! Log setup for the terminal reader.
//!
//! The alternate screen owns stderr, so everything goes to
//! `<config dir>/lectio/lectio.log`. `LECTIO_LOG` (then `RUST_LOG`) takes
//! precedence over the `-v` count.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_NAME: &str = "lectio.log";

/// - 0 (no `-v`): warn level
/// - 1 (`-v`): info level
/// - 2 (`-vv`): debug level
/// - 3+: trace level
pub fn level_from_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    let from_env = std::env::var("LECTIO_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok());

    from_env.unwrap_or_else(|| {
        EnvFilter::new(format!(
            "warn,lectio_core={level},lectio_tui={level}",
            level = level.as_str().to_lowercase()
        ))
    })
}

fn open_log_file(dir: &Path) -> std::io::Result<File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))
}

/// Install the global subscriber writing to the log file in `dir`.
/// Returns the path of the file.
pub fn init_logging(dir: &Path, verbosity: u8) -> std::io::Result<PathBuf> {
    let file = open_log_file(dir)?;
    let layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(build_env_filter(level_from_verbosity(verbosity)))
        .with(layer)
        .init();

    Ok(dir.join(LOG_FILE_NAME))
}
