use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::coordinator::{Coordinator, Poll};
use crate::common::{
    final_location, intermediate_location, KeyValue, MapReduceApp, MapTask, ReduceTask, Task,
};
use crate::partition::partition;
use crate::storage::{Storage, StorageError};

/// Failures abort the worker's loop. The task it held is never reported,
/// so the job stalls rather than completing with missing data.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("malformed intermediate line {line_number} in {location}: {line:?}")]
    MalformedLine {
        location: String,
        line_number: usize,
        line: String,
    },
}

pub struct Worker {
    id: Uuid,
    coordinator: Arc<Coordinator>,
    storage: Arc<dyn Storage>,
    app: Arc<dyn MapReduceApp>,
    backoff: Duration,
}

impl Worker {
    pub fn new(
        coordinator: Arc<Coordinator>,
        storage: Arc<dyn Storage>,
        app: Arc<dyn MapReduceApp>,
        backoff: Duration,
    ) -> Worker {
        Worker {
            id: Uuid::new_v4(),
            coordinator,
            storage,
            app,
            backoff,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Polls until the coordinator reports the whole job finished.
    #[tracing::instrument(name = "worker", skip(self), fields(id = %self.id))]
    pub async fn run(&self) -> Result<(), WorkerError> {
        loop {
            match self.coordinator.poll() {
                Poll::Assigned(Task::Map(task)) => self.handle_map_task(task).await?,
                Poll::Assigned(Task::Reduce(task)) => self.handle_reduce_task(task).await?,
                Poll::Wait => tokio::time::sleep(self.backoff).await,
                Poll::Finished => {
                    debug!("no work left, stopping");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_map_task(&self, task: MapTask) -> Result<(), WorkerError> {
        let contents = self.storage.read_all(&task.input).await?;
        debug!("map read: {}", task.input);
        let key_values = self.app.map(&task.input, &contents);

        // One location per (task, bucket), so no two map tasks share a file.
        let mut generated: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for kv in &key_values {
            let bucket = partition(&kv.key, task.partitions);
            let location = intermediate_location(task.id, bucket);
            self.storage.append_line(&location, &kv.to_line()).await?;
            generated.entry(bucket).or_insert_with(|| vec![location]);
        }

        info!(
            task = task.id,
            pairs = key_values.len(),
            buckets = generated.len(),
            "map task done"
        );
        self.coordinator.complete_map_task(generated);
        Ok(())
    }

    async fn handle_reduce_task(&self, task: ReduceTask) -> Result<(), WorkerError> {
        let mut grouped_key_values: HashMap<String, Vec<String>> = HashMap::new();
        for location in &task.inputs {
            let contents = self.storage.read_all(location).await?;
            for (index, line) in contents.lines().enumerate() {
                let kv = KeyValue::parse_line(line).ok_or_else(|| WorkerError::MalformedLine {
                    location: location.clone(),
                    line_number: index + 1,
                    line: line.to_string(),
                })?;
                grouped_key_values.entry(kv.key).or_default().push(kv.value);
            }
        }

        let mut output_values: Vec<(String, String)> = grouped_key_values
            .into_iter()
            .map(|(key, ivalues)| {
                let reduced = self.app.reduce(&key, &ivalues);
                (key, reduced)
            })
            .collect();
        output_values.sort_by(|a, b| a.0.cmp(&b.0));

        let lines: Vec<String> = output_values
            .into_iter()
            .map(|(key, value)| format!("{} {}", key, value))
            .collect();
        let output_file = final_location(task.id);
        self.storage.write_lines(&output_file, &lines).await?;

        info!(task = task.id, keys = lines.len(), "reduce write: {}", output_file);
        self.coordinator.complete_reduce_task();
        Ok(())
    }
}
