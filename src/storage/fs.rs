use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{join_lines, Storage, StorageError, StorageResult};

const JOB_OUTPUT_PREFIXES: [&str; 2] = ["mr-", "final-"];

/// Locations are file paths relative to `root`; absolute paths are used as
/// they are, which lets inputs live outside the output directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }

    /// Removes intermediate and final files left in the root by a previous
    /// run. Returns how many files were deleted.
    pub async fn clear_job_outputs(&self) -> StorageResult<usize> {
        let root = self.root.to_string_lossy().into_owned();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(StorageError::io(&root, err)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| StorageError::io(&root, err))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !JOB_OUTPUT_PREFIXES.iter().any(|p| name.starts_with(p)) {
                continue;
            }
            let is_file = entry
                .file_type()
                .await
                .map_err(|err| StorageError::io(&name, err))?
                .is_file();
            if is_file {
                tokio::fs::remove_file(entry.path())
                    .await
                    .map_err(|err| StorageError::io(&name, err))?;
                tracing::debug!("removed stale output {}", name);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn ensure_parent(&self, path: &Path, location: &str) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| StorageError::io(location, err))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn read_all(&self, location: &str) -> StorageResult<String> {
        tokio::fs::read_to_string(self.path_of(location))
            .await
            .map_err(|err| StorageError::io(location, err))
    }

    async fn append_line(&self, location: &str, line: &str) -> StorageResult<()> {
        let path = self.path_of(location);
        self.ensure_parent(&path, location).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|err| StorageError::io(location, err))?;
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        file.write_all(buf.as_bytes())
            .await
            .map_err(|err| StorageError::io(location, err))?;
        file.flush()
            .await
            .map_err(|err| StorageError::io(location, err))
    }

    async fn write_lines(&self, location: &str, lines: &[String]) -> StorageResult<()> {
        let path = self.path_of(location);
        self.ensure_parent(&path, location).await?;
        tokio::fs::write(&path, join_lines(lines))
            .await
            .map_err(|err| StorageError::io(location, err))
    }
}
