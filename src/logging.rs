use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::domain::DeskError;

const DEFAULT_FILTER: &str = "info";

/// Send all tracing output to `log_file`, the terminal belongs to the ui.
///
/// The level comes from `RUST_LOG` and falls back to `info`.
pub fn init(log_file: &Path) -> Result<(), DeskError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| DeskError::LoadingFailed(format!("logging setup: {e}")))
}
