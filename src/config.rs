use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanOutOptions {
    pub max_parallel: usize,                // concurrency budget; 0 is rejected at run time
    pub progress: bool,                     // show a count progress bar
    pub progress_label: Option<String>,     // optional label for the progress bar
    pub label: Option<String>,              // name attached to log events for this run
    pub thread_name_prefix: Option<String>, // worker threads are named "{prefix}-{index}"
}

impl Default for FanOutOptions {
    fn default() -> Self {
        let hw = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self {
            max_parallel: hw,
            progress: false,
            progress_label: None,
            label: None,
            thread_name_prefix: None,
        }
    }
}

impl FanOutOptions {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("parse fan-out options")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read fan-out options: {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    // Not clamped here: a zero budget must surface as a configuration error.
    pub fn with_max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = n;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = Some(prefix.into());
        self
    }
}
