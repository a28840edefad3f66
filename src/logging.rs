use anyhow::Result;
use std::path::Path;
use tracing::info;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Initialize structured logging system.
///
/// `format` selects `"text"` or `"json"` console output. When `log_file` is
/// given, JSON lines are also written to a daily rolling file next to it;
/// the returned guard must be kept alive for those writes to be flushed.
pub fn init_logging(
    log_level: Option<&str>,
    format: &str,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    // Set up environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            let level = log_level.unwrap_or("info");
            EnvFilter::try_new(level)
        })
        .map_err(|e| anyhow::anyhow!("Failed to create log filter: {}", e))?;

    let (text_layer, json_layer) = if format == "json" {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .json();
        (None, Some(layer))
    } else {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true);
        (Some(layer), None)
    };

    let (file_layer, guard) = match log_file {
        Some(log_path) => {
            let directory = log_path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = log_path
                .file_name()
                .map_or_else(|| "backoffice.log".into(), |name| name.to_os_string());
            let (writer, guard) = non_blocking(rolling::daily(directory, file_name));

            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    info!(format, file = ?log_file, "Logging system initialized");
    Ok(guard)
}

/// Performance timing utilities
pub struct OperationTimer {
    operation: String,
    start: std::time::Instant,
    finished: bool,
}

impl OperationTimer {
    /// Start timing `operation`
    #[must_use]
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: std::time::Instant::now(),
            finished: false,
        }
    }

    /// Log the elapsed time and return it in milliseconds
    pub fn finish(mut self) -> u128 {
        self.finished = true;
        let duration = self.start.elapsed().as_millis();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration as u64,
            "Operation completed"
        );
        duration
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.finished && !std::thread::panicking() {
            let duration = self.start.elapsed().as_millis();
            tracing::debug!(
                operation = %self.operation,
                duration_ms = duration as u64,
                "Operation abandoned"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_reports_elapsed() {
        let timer = OperationTimer::new("unit");
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(timer.finish() >= 2);
    }
}
