//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr by default so they never interleave with
//! rendered answers on stdout. Passing `--log <file>` appends them to that
//! file instead, without ANSI colors.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "REPCOACH_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

/// Builds a filter from a directive string, falling back to `warn` when it is
/// missing or does not parse.
pub fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

pub fn env_filter() -> EnvFilter {
    filter_from(std::env::var(LOG_ENV_VAR).ok().as_deref())
}

/// Installs the global subscriber. Calling it twice is harmless; the second
/// install is ignored.
pub fn init_tracing(log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}
