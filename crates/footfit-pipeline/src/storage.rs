//! Object-storage boundary.
//!
//! Task inputs live under `tasks/{task_id}/` as image/capture pairs;
//! results are written under `results/{task_id}/`. The store is the least
//! reliable link in the pipeline, so its operations are wrapped in bounded
//! retry with exponential backoff; nothing else in the pipeline retries.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use footfit_core::RetryPolicy;

/// Storage-layer failure.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The task folder does not exist.
    #[error("task `{0}` not found")]
    TaskNotFound(String),
    /// A named object inside a task folder does not exist.
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    /// Underlying I/O failure; treated as transient and retried.
    #[error("io error at `{path}`: {source}")]
    Io {
        /// Path the operation touched.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Whether retrying the operation can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Io { .. })
    }
}

/// Boundary to the store holding task inputs and results.
///
/// Implementations are shared read-mostly across coordinators; every method
/// is safe to call concurrently.
#[allow(async_fn_in_trait)]
pub trait TaskStore: Send + Sync {
    /// List object names in the task's input folder.
    async fn list_task(&self, task_id: &str) -> Result<Vec<String>, StorageError>;

    /// Download one input object.
    async fn get(&self, task_id: &str, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Write one result object for the task.
    async fn put_result(&self, task_id: &str, name: &str, bytes: &[u8])
        -> Result<(), StorageError>;

    /// Delete the task's input folder. Idempotent: deleting an absent task
    /// succeeds.
    async fn remove_task(&self, task_id: &str) -> Result<(), StorageError>;
}

/// Filesystem-backed task store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsTaskStore {
    root: PathBuf,
    retry: RetryPolicy,
}

impl FsTaskStore {
    /// Create a store rooted at `root` with the given retry policy.
    pub fn new(root: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            root: root.into(),
            retry,
        }
    }

    /// Input folder for a task.
    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.root.join("tasks").join(task_id)
    }

    /// Result folder for a task.
    pub fn results_dir(&self, task_id: &str) -> PathBuf {
        self.root.join("results").join(task_id)
    }

    async fn with_retry<T, Fut>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Fut,
    ) -> Result<T, StorageError>
    where
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut delay = Duration::from_millis(self.retry.initial_backoff_ms);
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(attempt, error = %err, "{what} failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

async fn read_object(path: PathBuf, name: &str) -> Result<Vec<u8>, StorageError> {
    match fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(StorageError::ObjectNotFound(name.to_string()))
        }
        Err(err) => Err(StorageError::Io { path, source: err }),
    }
}

async fn list_dir(dir: PathBuf, task_id: &str) -> Result<Vec<String>, StorageError> {
    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(StorageError::TaskNotFound(task_id.to_string()))
        }
        Err(err) => return Err(StorageError::Io { path: dir, source: err }),
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
                if is_file {
                    if let Some(name) = entry.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
            }
            Ok(None) => break,
            Err(err) => return Err(StorageError::Io { path: dir, source: err }),
        }
    }
    // Deterministic fetch order regardless of directory iteration order.
    names.sort();
    Ok(names)
}

async fn write_object(dir: PathBuf, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
    if let Err(err) = fs::create_dir_all(&dir).await {
        return Err(StorageError::Io { path: dir, source: err });
    }
    let path = dir.join(name);
    match fs::write(&path, bytes).await {
        Ok(()) => Ok(()),
        Err(err) => Err(StorageError::Io { path, source: err }),
    }
}

async fn remove_dir(dir: PathBuf) -> Result<(), StorageError> {
    match fs::remove_dir_all(&dir).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StorageError::Io { path: dir, source: err }),
    }
}

impl TaskStore for FsTaskStore {
    async fn list_task(&self, task_id: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.task_dir(task_id);
        self.with_retry("list", || list_dir(dir.clone(), task_id)).await
    }

    async fn get(&self, task_id: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.task_dir(task_id).join(name);
        debug!(task = task_id, object = name, "downloading object");
        self.with_retry("download", || read_object(path.clone(), name))
            .await
    }

    async fn put_result(
        &self,
        task_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), StorageError> {
        let dir = self.results_dir(task_id);
        debug!(task = task_id, object = name, len = bytes.len(), "uploading result");
        self.with_retry("upload", || write_object(dir.clone(), name, bytes))
            .await
    }

    async fn remove_task(&self, task_id: &str) -> Result<(), StorageError> {
        let dir = self.task_dir(task_id);
        debug!(task = task_id, "removing task inputs");
        self.with_retry("remove", || remove_dir(dir.clone())).await
    }
}
