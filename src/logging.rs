// 📝 Logging - console diagnostics and the append-only lookup log

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Dispatch;

/// Console diagnostics on stderr, filtered by RUST_LOG (default: warn)
pub fn init_console_logging() {
    // Bridge log:: macros from dependencies into tracing
    let _ = tracing_log::LogTracer::init();
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

// ============================================================================
// LOOKUP LOG
// ============================================================================

/// File sink owned by one action run.
///
/// Lines are appended; the file is never truncated. Events emitted through
/// `warn`/`info` reach this file only, not the console subscriber.
pub struct LookupLog {
    dispatch: Dispatch,
    path: PathBuf,
}

impl LookupLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        let subscriber = tracing_subscriber::fmt()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        Ok(LookupLog {
            dispatch: Dispatch::new(subscriber),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn warn(&self, message: &str) {
        tracing::dispatcher::with_default(&self.dispatch, || tracing::warn!("{}", message));
    }

    pub fn info(&self, message: &str) {
        tracing::dispatcher::with_default(&self.dispatch, || tracing::info!("{}", message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lookup_log_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");

        {
            let log = LookupLog::open(&path).unwrap();
            log.warn("first run: CEP 01001000 lookup failed");
        }
        {
            let log = LookupLog::open(&path).unwrap();
            log.info("second run started");
        }

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("first run: CEP 01001000 lookup failed"));
        assert!(text.contains("WARN"));
        assert!(text.contains("second run started"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_lookup_log_open_fails_for_missing_dir() {
        assert!(LookupLog::open(Path::new("/no/such/dir/app.log")).is_err());
    }
}
