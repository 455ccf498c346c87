//! # Diagnostics
//!
//! Every component logs through `tracing`. The loader drain and each frame run inside an
//! `info_span!` when the `profiling` feature is on:
//!
//! ```ignore
//! #[cfg(feature = "profiling")]
//! let span = info_span!("experience.frame", frame = clock.frame_count());
//! #[cfg(feature = "profiling")]
//! let _span_guard = span.enter();
//! ```
//!
//! Without the feature the crate only emits events and the host picks a subscriber. With it,
//! [`init_tracing`] installs one:
//!
//! ```toml
//! [dependencies]
//! stage_runtime = { version = "0.3", features = ["profiling"] }
//! ```
//!
//! ```ignore
//! use stage_runtime::profiling::{init_tracing, TracingConfig};
//!
//! let config = TracingConfig {
//!     log_dir: Some("logs".into()),
//!     json: true,
//!     ..TracingConfig::default()
//! };
//! // Keep the guard alive for the life of the program or buffered lines are lost
//! let _guard = init_tracing(&config)?;
//! ```
//!
//! `RUST_LOG` overrides the configured filter, e.g. `RUST_LOG=stage_runtime::audio=trace`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[cfg(feature = "profiling")]
use crate::error::{Result, RuntimeError};
#[cfg(feature = "profiling")]
use tracing_appender::non_blocking::WorkerGuard;
#[cfg(feature = "profiling")]
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

/// Subscriber settings for [`init_tracing`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit one JSON object per line instead of the human format
    pub json: bool,
    /// Write to a daily rolling file in this directory instead of stdout
    pub log_dir: Option<PathBuf>,
    pub file_prefix: String,
    /// Colour codes on stdout
    pub ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "stage_runtime=info".to_string(),
            json: false,
            log_dir: None,
            file_prefix: "stage_runtime.log".to_string(),
            ansi: true,
        }
    }
}

/// Install the global subscriber.
///
/// Returns the writer guard when logging to a file; dropping it flushes and stops the
/// background writer.
#[cfg(feature = "profiling")]
pub fn init_tracing(config: &TracingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|err| RuntimeError::Config(format!("invalid log filter: {err}")))?;

    let (writer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(config.ansi && config.log_dir.is_none());
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| RuntimeError::Config(format!("tracing already initialised: {err}")))?;

    tracing::info!(
        json = config.json,
        file = config.log_dir.is_some(),
        "tracing initialised"
    );
    Ok(guard)
}
