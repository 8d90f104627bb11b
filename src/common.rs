use async_trait::async_trait;
use std::{collections::BTreeMap, fs, path::Path};

/// [(input name, contents)]
pub type Input = Vec<(String, String)>;
/// {key: reduce_output}
pub type Output = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Intermediate line format: `"<key> <value>"`.
    pub fn to_line(&self) -> String {
        format!("{} {}", self.key, self.value)
    }

    /// Splits a line on its first whitespace run. `None` when there is no
    /// separator or the key is empty.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (key, value) = line.split_once(char::is_whitespace)?;
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key, value.trim_start()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapTask {
    pub id: usize,
    // storage location of the input document
    pub input: String,
    pub partitions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceTask {
    // bucket index
    pub id: usize,
    pub inputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Map(MapTask),
    Reduce(ReduceTask),
}

pub trait MapReduceApp: Send + Sync {
    fn map(&self, input: &str, contents: &str) -> Vec<KeyValue>;
    fn reduce(&self, key: &str, values: &[String]) -> String;
}

#[async_trait]
pub trait MapReduce {
    async fn run(self) -> anyhow::Result<Output>;
}

pub fn intermediate_location(map_task: usize, bucket: usize) -> String {
    format!("mr-{}-{}", map_task, bucket)
}

pub fn final_location(bucket: usize) -> String {
    format!("final-{}.txt", bucket)
}

/// Lists the regular files of `input_dir` as `(file name, path)`, sorted by
/// name so map task ids are stable between runs.
pub fn read_files_from_dir(input_dir: impl AsRef<Path>) -> anyhow::Result<Vec<(String, String)>> {
    let mut input: Vec<_> = Vec::new();
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();

        if path.is_file() {
            let filename = match path.file_name().and_then(|name| name.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            input.push((filename, path.to_string_lossy().into_owned()));
        }
    }
    input.sort();
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_line_on_first_whitespace_run() {
        let kv = KeyValue::parse_line("hello \t 1 2").expect("line should parse");
        assert_eq!(kv.key, "hello");
        assert_eq!(kv.value, "1 2");
    }

    #[test]
    fn rejects_line_without_separator() {
        assert_eq!(KeyValue::parse_line("hello"), None);
        assert_eq!(KeyValue::parse_line(""), None);
        assert_eq!(KeyValue::parse_line(" 1"), None);
    }

    #[test]
    fn formats_storage_locations() {
        assert_eq!(intermediate_location(3, 1), "mr-3-1");
        assert_eq!(final_location(2), "final-2.txt");
        assert_eq!(KeyValue::new("a", "1").to_line(), "a 1");
    }

    #[test]
    fn lists_input_files_sorted() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let files = read_files_from_dir(dir.path()).expect("failed to list dir");
        let names: Vec<_> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }
}
