mod coordinator;
mod worker;
mod worker_pool;

pub use coordinator::{Coordinator, Poll};
pub use worker::{Worker, WorkerError};
pub use worker_pool::WorkerPool;

use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;

use crate::common::{final_location, KeyValue, MapReduce, MapReduceApp, Output};
use crate::config::JobConfig;
use crate::storage::Storage;

/// Runs a whole job: coordinator, worker pool, then collects the final
/// outputs of every bucket.
pub struct ParallelMapReduce {
    inputs: Vec<String>,
    storage: Arc<dyn Storage>,
    mr_app: Arc<dyn MapReduceApp>,
    config: JobConfig,
}

impl ParallelMapReduce {
    pub fn new(
        inputs: Vec<String>,
        storage: Arc<dyn Storage>,
        mr_app: Arc<dyn MapReduceApp>,
        config: JobConfig,
    ) -> Self {
        Self {
            inputs,
            storage,
            mr_app,
            config,
        }
    }

    async fn combine_outputs(&self) -> anyhow::Result<Output> {
        let mut output = Output::new();
        for bucket in 0..self.config.reduce_tasks {
            let location = final_location(bucket);
            let contents = self
                .storage
                .read_all(&location)
                .await
                .with_context(|| format!("failed to read {}", location))?;
            for line in contents.lines() {
                let Some(KeyValue { key, value }) = KeyValue::parse_line(line) else {
                    bail!("malformed output line in {}: {:?}", location, line);
                };
                if output.insert(key, value).is_some() {
                    bail!("key in more than one bucket: {:?}", line);
                }
            }
        }
        Ok(output)
    }
}

#[async_trait]
impl MapReduce for ParallelMapReduce {
    async fn run(self) -> anyhow::Result<Output> {
        self.config.validate()?;

        let coordinator = Arc::new(Coordinator::new(
            self.inputs.clone(),
            self.config.reduce_tasks,
        ));
        tracing::info!(
            map_tasks = coordinator.total_map_tasks(),
            reduce_tasks = coordinator.total_reduce_tasks(),
            workers = self.config.workers,
            "starting job"
        );

        let pool = WorkerPool::new(
            self.config.workers,
            Arc::clone(&coordinator),
            Arc::clone(&self.storage),
            Arc::clone(&self.mr_app),
            self.config.backoff(),
        );
        pool.wait().await?;

        self.combine_outputs().await
    }
}
