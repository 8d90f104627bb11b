//! Key-addressed storage for input documents, intermediate partitions and
//! final outputs.
//!
//! Locations are plain names (`mr-<map>-<bucket>`, `final-<bucket>.txt`, or
//! whatever the driver uses for inputs). The only concurrency guarantee a
//! backend has to give is that a single writer to a location is atomic with
//! respect to itself; the worker never has two writers on one location.

mod fs;
mod memory;

pub use self::fs::FileStorage;
pub use self::memory::MemoryStorage;

use async_trait::async_trait;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("location not found: {0}")]
    NotFound(String),

    #[error("I/O error on {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(location: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return StorageError::NotFound(location.to_string());
        }
        StorageError::Io {
            location: location.to_string(),
            source,
        }
    }
}

/// Async to leave room for remote backends; local ones just do the work
/// inline.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Full content of `location`.
    async fn read_all(&self, location: &str) -> StorageResult<String>;

    /// Appends `line` and a newline, creating the location if absent.
    async fn append_line(&self, location: &str, line: &str) -> StorageResult<()>;

    /// Replaces the content of `location` with `lines`, one per line.
    async fn write_lines(&self, location: &str, lines: &[String]) -> StorageResult<()>;
}

pub(crate) fn join_lines(lines: &[String]) -> String {
    let mut contents = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        contents.push_str(line);
        contents.push('\n');
    }
    contents
}
