use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::infrastructure::settings::LogFormat;

const COMBINED_LOG: &str = "combined.log";
const ERROR_LOG: &str = "error.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Handle to the process log sinks, owned by the supervisor.
///
/// File sinks are written by background workers; their guards live here so
/// [`LogHandle::flush`] can drain them before the process exits.
#[derive(Debug)]
pub struct LogHandle {
    format: LogFormat,
    guards: Vec<WorkerGuard>,
}

impl LogHandle {
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Drains the file workers and pushes buffered console output out.
    pub fn flush(self) {
        // dropping a guard blocks until its worker has written everything
        drop(self.guards);
        if let Err(err) = std::io::stdout().lock().flush() {
            eprintln!("failed to flush stdout: {err}");
        }
    }
}

/// Installs the console sink and, when `log_dir` is set, `combined.log`
/// (every record) and `error.log` (`ERROR` only) inside it.
pub fn init_logging(default_level: &str, format: LogFormat, log_dir: Option<&Path>) -> Result<LogHandle> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console: BoxedLayer = match format {
        LogFormat::Compact => fmt::layer().with_target(true).compact().boxed(),
        LogFormat::Json => fmt::layer()
            .with_target(true)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed(),
    };

    let mut layers = vec![console];
    let mut guards = Vec::new();
    if let Some(dir) = log_dir {
        let (file_layers, file_guards) = file_sinks(dir)?;
        layers.extend(file_layers);
        guards.extend(file_guards);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(LogHandle { format, guards })
}

fn file_sinks(dir: &Path) -> Result<(Vec<BoxedLayer>, Vec<WorkerGuard>)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let (combined, combined_guard) = tracing_appender::non_blocking(rolling::never(dir, COMBINED_LOG));
    let (errors, errors_guard) = tracing_appender::non_blocking(rolling::never(dir, ERROR_LOG));

    let layers: Vec<BoxedLayer> = vec![
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_ansi(false)
            .with_writer(combined)
            .boxed(),
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_ansi(false)
            .with_writer(errors)
            .with_filter(LevelFilter::ERROR)
            .boxed(),
    ];

    Ok((layers, vec![combined_guard, errors_guard]))
}

/// Console-only handle for code paths that never install a subscriber.
#[cfg(test)]
impl LogHandle {
    pub(crate) fn console_only(format: LogFormat) -> Self {
        Self {
            format,
            guards: Vec::new(),
        }
    }
}
