use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context};
use clap::Parser;

use mapreduce_lite::common::{read_files_from_dir, MapReduce};
use mapreduce_lite::config::JobConfig;
use mapreduce_lite::map_reduce_apps::WordCount;
use mapreduce_lite::mr_parallel::ParallelMapReduce;
use mapreduce_lite::storage::FileStorage;
use mapreduce_lite::telemetry::init_tracing;

/// Word count over a set of documents, map/reduce style.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON job configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    workers: Option<usize>,

    #[arg(short, long)]
    reduce_tasks: Option<usize>,

    #[arg(long)]
    backoff_ms: Option<u64>,

    /// Directory for mr-* and final-* files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Use every file in this directory as an input document
    #[arg(short, long, conflicts_with = "files")]
    input_dir: Option<PathBuf>,

    files: Vec<PathBuf>,
}

impl Args {
    fn job_config(&self) -> anyhow::Result<JobConfig> {
        let mut config = match &self.config {
            Some(path) => JobConfig::load(path)?,
            None => JobConfig::default(),
        };
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(reduce_tasks) = self.reduce_tasks {
            config.reduce_tasks = reduce_tasks;
        }
        if let Some(backoff_ms) = self.backoff_ms {
            config.backoff_ms = backoff_ms;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Input locations as absolute paths, so they resolve independently of
    /// the output directory.
    fn inputs(&self) -> anyhow::Result<Vec<String>> {
        let paths: Vec<PathBuf> = match &self.input_dir {
            Some(dir) => read_files_from_dir(dir)
                .with_context(|| format!("failed to list {}", dir.display()))?
                .into_iter()
                .map(|(_, path)| PathBuf::from(path))
                .collect(),
            None => self.files.clone(),
        };
        if paths.is_empty() {
            bail!("no input documents given");
        }

        paths
            .iter()
            .map(|path| -> anyhow::Result<String> {
                let absolute = std::path::absolute(path)
                    .with_context(|| format!("bad input path {}", path.display()))?;
                Ok(absolute.to_string_lossy().into_owned())
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info")?;

    let args = Args::parse();
    let config = args.job_config()?;
    let inputs = args.inputs()?;

    let storage = FileStorage::new(&config.output_dir);
    let removed = storage.clear_job_outputs().await?;
    if removed > 0 {
        tracing::info!("removed {} files from a previous run", removed);
    }

    let job = ParallelMapReduce::new(
        inputs,
        Arc::new(storage),
        Arc::new(WordCount::new()),
        config,
    );
    let output = job.run().await?;

    tracing::info!(keys = output.len(), "MapReduce job completed.");
    Ok(())
}
