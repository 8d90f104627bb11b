use std::collections::HashMap;

use async_trait::async_trait;

use crate::common::{Input, KeyValue, MapReduce, MapReduceApp, Output};

/// Single-threaded, storage-free executor. Produces the same `Output` a
/// parallel run does and serves as the reference in tests.
pub struct SequentialMapReduce {
    input: Input,
    mr_app: Box<dyn MapReduceApp>,
}

impl SequentialMapReduce {
    pub fn new(input: Input, mr_app: Box<dyn MapReduceApp>) -> Self {
        Self { input, mr_app }
    }

    pub fn run_sync(self) -> Output {
        let intermediate_key_values =
            self.input
                .iter()
                .fold(Vec::new(), |mut acc, (name, contents)| {
                    acc.extend(self.mr_app.map(name, contents));
                    acc
                });

        let grouped_key_values: HashMap<String, Vec<String>> = intermediate_key_values
            .into_iter()
            .fold(HashMap::new(), |mut acc, KeyValue { key, value }| {
                acc.entry(key).or_default().push(value);
                acc
            });

        grouped_key_values
            .into_iter()
            .map(|(key, ivalues)| {
                let reduced = self.mr_app.reduce(&key, &ivalues);
                (key, reduced)
            })
            .collect()
    }
}

#[async_trait]
impl MapReduce for SequentialMapReduce {
    async fn run(self) -> anyhow::Result<Output> {
        Ok(self.run_sync())
    }
}
