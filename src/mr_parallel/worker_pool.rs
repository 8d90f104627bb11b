use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::coordinator::Coordinator;
use super::worker::{Worker, WorkerError};
use crate::common::MapReduceApp;
use crate::storage::Storage;

pub struct WorkerPool {
    pub workers: Vec<Uuid>,
    tasks: JoinSet<Result<(), WorkerError>>,
}

impl WorkerPool {
    /// Spawns `size` workers on the current tokio runtime, all pulling from
    /// `coordinator`.
    pub fn new(
        size: usize,
        coordinator: Arc<Coordinator>,
        storage: Arc<dyn Storage>,
        app: Arc<dyn MapReduceApp>,
        backoff: Duration,
    ) -> WorkerPool {
        assert!(size > 0);

        let mut tasks = JoinSet::new();
        let mut workers = Vec::with_capacity(size);

        for _ in 0..size {
            let worker = Worker::new(
                Arc::clone(&coordinator),
                Arc::clone(&storage),
                Arc::clone(&app),
                backoff,
            );
            workers.push(worker.id());
            tasks.spawn(async move { worker.run().await });
        }

        WorkerPool { workers, tasks }
    }

    /// Waits for every worker to stop. On the first failure the remaining
    /// workers are aborted: the failed task is never reported, so they would
    /// otherwise poll forever.
    pub async fn wait(mut self) -> anyhow::Result<()> {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.tasks.abort_all();
                    return Err(anyhow::Error::new(err).context("worker failed"));
                }
                Err(err) => {
                    self.tasks.abort_all();
                    return Err(anyhow!("worker task did not finish: {}", err));
                }
            }
        }
        Ok(())
    }
}
