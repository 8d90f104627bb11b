use std::{fs, path::Path, path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Worker units polling the coordinator.
    pub workers: usize,
    /// Number of buckets, and so of reduce tasks and final outputs.
    pub reduce_tasks: usize,
    /// Sleep between polls when no task is available.
    pub backoff_ms: u64,
    /// Where intermediate and final files are written.
    pub output_dir: PathBuf,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            reduce_tasks: 3,
            backoff_ms: 100,
            output_dir: PathBuf::from("."),
        }
    }
}

impl JobConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: JobConfig = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.reduce_tasks == 0 {
            bail!("reduce_tasks must be at least 1");
        }
        Ok(())
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}
