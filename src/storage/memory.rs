use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{join_lines, Storage, StorageError, StorageResult};

/// In-memory store, shared between clones.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    map: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds (or replaces) a location, typically an input document.
    pub fn put(&self, location: impl Into<String>, contents: impl Into<String>) {
        self.lock().insert(location.into(), contents.into());
    }

    pub fn get(&self, location: &str) -> Option<String> {
        self.lock().get(location).cloned()
    }

    /// All location names, sorted.
    pub fn locations(&self) -> Vec<String> {
        let mut names: Vec<_> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // Every critical section is a single map operation, so a poisoned
        // lock still guards a consistent map.
        self.map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read_all(&self, location: &str) -> StorageResult<String> {
        self.get(location)
            .ok_or_else(|| StorageError::NotFound(location.to_string()))
    }

    async fn append_line(&self, location: &str, line: &str) -> StorageResult<()> {
        let mut map = self.lock();
        let contents = map.entry(location.to_string()).or_default();
        contents.push_str(line);
        contents.push('\n');
        Ok(())
    }

    async fn write_lines(&self, location: &str, lines: &[String]) -> StorageResult<()> {
        self.lock().insert(location.to_string(), join_lines(lines));
        Ok(())
    }
}
