//! Log context threaded through every pipeline component
//!
//! The first `install` fixes where log lines go for the rest of the
//! process. Later `configure` calls only adjust verbosity.

use crate::structs::{CorrError, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Log destination and verbosity for one orchestrator invocation
pub struct LogContext {
    path: PathBuf,
    debug: bool,
    filter: Option<FilterHandle>,
}

impl LogContext {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            path: path.into(),
            debug,
            filter: None,
        }
    }

    /// Log file every run appends to
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Whether this context owns the process subscriber
    ///
    /// For embedding callers that may have installed their own subscriber.
    #[must_use]
    #[allow(dead_code)]
    pub fn is_installed(&self) -> bool {
        self.filter.is_some()
    }

    /// Attach the stderr and log-file layers to the global subscriber
    ///
    /// A subscriber installed by someone else wins; this becomes a no-op.
    ///
    /// # Errors
    /// Returns error if the log file cannot be opened for appending
    pub fn install(&mut self) -> Result<()> {
        if self.filter.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                CorrError::Logging(format!("cannot open {}: {e}", self.path.display()))
            })?;

        let (filter, handle) = reload::Layer::new(build_filter(self.debug));
        let stderr_layer = fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr);
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(Mutex::new(file));

        match tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init()
        {
            Ok(()) => self.filter = Some(handle),
            Err(e) => debug!("log subscriber already installed, keeping it: {e}"),
        }
        Ok(())
    }

    /// Reconfigure logging; the destination set first stays fixed
    ///
    /// The binary configures once; this is for embedding callers that run
    /// the pipeline repeatedly with different verbosity.
    ///
    /// # Errors
    /// Returns error if the new level filter cannot be applied
    #[allow(dead_code)]
    pub fn configure(&mut self, path: &Path, debug: bool) -> Result<()> {
        if path != self.path {
            debug!(
                requested = %path.display(),
                active = %self.path.display(),
                "log destination already fixed, ignoring new path"
            );
        }
        self.debug = debug;
        if let Some(handle) = &self.filter {
            handle
                .reload(build_filter(debug))
                .map_err(|e| CorrError::Logging(e.to_string()))?;
        }
        Ok(())
    }
}

fn build_filter(debug: bool) -> EnvFilter {
    let default_level = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_configure_keeps_first_destination() {
        let dir = TempDir::new().expect("tempdir");
        let first = dir.path().join("first.log");
        let second = dir.path().join("second.log");

        let mut log = LogContext::new(&first, false);
        log.configure(&second, true).expect("configure");

        assert_eq!(log.path(), first.as_path());
        assert!(log.debug());
    }

    #[test]
    fn test_configure_can_lower_verbosity() {
        let mut log = LogContext::new("run.log", true);
        log.configure(Path::new("run.log"), false).expect("configure");
        assert!(!log.debug());
    }

    #[test]
    fn test_install_appends_to_log_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("logs").join("corr.log");
        std::fs::create_dir_all(dir.path().join("logs")).expect("mkdir");
        std::fs::write(&path, "existing line\n").expect("seed log");

        let mut log = LogContext::new(&path, false);
        log.install().expect("install");
        log.install().expect("second install is a no-op");

        assert!(log.is_installed());
        tracing::info!("install test marker");
        let content = std::fs::read_to_string(&path).expect("read log");
        assert!(content.starts_with("existing line\n"));
        assert!(content.contains("install test marker"));
    }
}
