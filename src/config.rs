// ⚙️ Configuration - defaults, optional JSON file, environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File read from the working directory when present
pub const CONFIG_FILE: &str = "record-cleaner.json";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Delimiters tried in order when reading CSV
    pub delimiter_candidates: Vec<char>,

    /// Append-only log of the postal-code lookup action
    pub log_file: PathBuf,

    /// Base URL of the postal-code service, without trailing slash
    pub cep_base_url: String,

    /// Per-request timeout of the postal-code service (default: 5)
    pub cep_timeout_secs: u64,

    /// Rows per file when unifying CSVs in chunks (default: 1_000_000)
    pub chunk_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            delimiter_candidates: vec![';', ','],
            log_file: PathBuf::from("app.log"),
            cep_base_url: "https://opencep.com/v1".to_string(),
            cep_timeout_secs: 5,
            chunk_rows: 1_000_000,
        }
    }
}

impl AppConfig {
    /// Defaults, then `record-cleaner.json` if present, then environment
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file_or_default(Path::new(CONFIG_FILE))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// A missing file yields defaults; a malformed one is an error
    pub fn from_file_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Overrides: RECORD_CLEANER_LOG_FILE, RECORD_CLEANER_CEP_URL, RECORD_CLEANER_CEP_TIMEOUT
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RECORD_CLEANER_LOG_FILE").filter(|v| !v.trim().is_empty()) {
            self.log_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("RECORD_CLEANER_CEP_URL").filter(|v| !v.trim().is_empty()) {
            self.cep_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(secs) = lookup("RECORD_CLEANER_CEP_TIMEOUT").and_then(|v| v.trim().parse::<u64>().ok()) {
            if secs > 0 {
                self.cep_timeout_secs = secs;
            }
        }
    }
}
