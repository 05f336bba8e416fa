//! Pronunciation dataset pipeline.
//!
//! Pipeline flow:
//! Word list → Select → Plan batch size → Collect → JSONL

use crate::backend::{DummyBackend, InferenceBackend, KatakanaFilter, ResultFilter};
use crate::models::{AnswerMap, Config, DatasetRecord, KanagenError, Provider, Result, RunStats};
use crate::pipeline::{RetryPolicy, RetryingCollector};
use crate::pool::ConcurrencyLimiter;
use crate::search::plan_batch_size;
use crate::source::{select_words, DictionaryFile, WordSource};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Jobs need more words than this to be worth running.
pub const MIN_WORDS: usize = 10;

/// End-to-end dataset generation job.
pub struct DatasetPipeline {
    config: Config,
    backend: Arc<dyn InferenceBackend>,
    filter: Arc<dyn ResultFilter>,
}

impl DatasetPipeline {
    /// Create a pipeline with an explicit backend and filter.
    pub fn new(
        config: Config,
        backend: Arc<dyn InferenceBackend>,
        filter: Arc<dyn ResultFilter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend,
            filter,
        })
    }

    /// Create a pipeline with the configured backend and the katakana filter.
    pub fn from_config(config: Config) -> Result<Self> {
        let backend: Arc<dyn InferenceBackend> = match config.inference.provider {
            Provider::Dummy => Arc::new(DummyBackend::from_config(&config.inference.dummy)),
        };
        info!(provider = backend.name(), "Inference provider");

        Self::new(config, backend, Arc::new(KatakanaFilter::new()))
    }

    fn rng(&self) -> StdRng {
        match self.config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Run the full job, writing the dataset to `output_path`.
    pub async fn run(&self, output_path: &Path) -> Result<RunStats> {
        let mut rng = self.rng();

        info!("1: Loading words");
        let source = DictionaryFile::new(&self.config.source.path);
        let words = select_words(source.words()?, self.config.source.max_num_words, &mut rng);

        self.run_with_words(words, &mut rng, output_path).await
    }

    /// Run the job over an already loaded word list.
    pub async fn run_with_words(
        &self,
        mut words: Vec<String>,
        rng: &mut StdRng,
        output_path: &Path,
    ) -> Result<RunStats> {
        if words.len() <= MIN_WORDS {
            return Err(KanagenError::InvalidInput(format!(
                "Too few words: {} (need more than {MIN_WORDS})",
                words.len()
            )));
        }

        info!("2: Determining batch size");
        let batch_size = plan_batch_size(
            &self.config.inference.batch,
            &words,
            self.backend.as_ref(),
            self.filter.as_ref(),
            rng,
        )
        .await?;

        info!("3: Inferring pronunciations");
        words.shuffle(rng);
        let collector = RetryingCollector::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.filter),
            ConcurrencyLimiter::new(self.config.inference.concurrency),
            batch_size,
            RetryPolicy::from(&self.config.inference.rate_limit),
        )
        .with_progress(self.config.output.show_progress);
        let collection = collector.collect(&words).await?;

        info!("4: Writing results");
        let written = write_results(output_path, &collection.results)?;

        info!(
            written,
            path = %output_path.display(),
            rounds = collection.stats.rounds,
            acceptance = format!("{:.1}%", collection.stats.acceptance_rate() * 100.0),
            throughput = format!("{:.0}/hr", collection.stats.throughput_per_hour),
            "Dataset pipeline complete"
        );

        Ok(collection.stats)
    }
}

/// Write one JSON record per word, sorted by word.
///
/// The file is written next to its destination and renamed into place, so
/// readers never observe a partial dataset.
pub fn write_results(path: &Path, results: &AnswerMap) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| KanagenError::io("creating output dir", e))?;
    }

    let mut entries: Vec<(&String, &String)> = results.iter().collect();
    entries.sort();

    let temp_path = temp_path_for(path);
    let file =
        File::create(&temp_path).map_err(|e| KanagenError::io("creating temp output", e))?;

    // Atomic rename; the temp file never outlives a failed write
    let written = write_records(file, &entries).and_then(|()| {
        fs::rename(&temp_path, path).map_err(|e| KanagenError::io("renaming output", e))
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    Ok(entries.len())
}

fn write_records(file: File, entries: &[(&String, &String)]) -> Result<()> {
    let mut writer = BufWriter::new(file);

    for (word, pronunciation) in entries {
        let record = DatasetRecord::new(word.as_str(), pronunciation.as_str());
        let json = serde_json::to_string(&record)
            .map_err(|e| KanagenError::Internal(format!("Failed to serialize record: {e}")))?;
        writeln!(writer, "{json}").map_err(|e| KanagenError::io("writing output", e))?;
    }

    writer
        .flush()
        .map_err(|e| KanagenError::io("flushing output", e))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "dataset.jsonl".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BatchConfig, DummyConfig, InferenceConfig, OutputConfig, RateLimitConfig, SourceConfig,
    };
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn config(dir: &Path, batch: BatchConfig, capacity: usize) -> Config {
        Config {
            random_seed: Some(11),
            source: SourceConfig {
                path: dir.join("words.txt"),
                max_num_words: None,
            },
            inference: InferenceConfig {
                provider: Provider::Dummy,
                concurrency: 3,
                batch,
                rate_limit: RateLimitConfig {
                    throttle_ms: 0,
                    wait_ms: 0,
                    max_retries: 2,
                },
                dummy: DummyConfig {
                    capacity,
                    latency_ms: 0,
                },
            },
            output: OutputConfig {
                path: dir.join("data.jsonl"),
                show_progress: false,
            },
        }
    }

    fn write_word_list(dir: &Path, count: usize) -> Vec<String> {
        let words: Vec<String> = (0..count)
            .map(|i| {
                let a = (b'a' + (i % 26) as u8) as char;
                let b = (b'a' + (i / 26 % 26) as u8) as char;
                format!("w{b}{a}")
            })
            .collect();
        let content: String = words
            .iter()
            .map(|w| format!("{}  W ER1 D\n", w.to_uppercase()))
            .collect();
        fs::write(dir.join("words.txt"), content).unwrap();
        words
    }

    fn read_records(path: &Path) -> Vec<DatasetRecord> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_end_to_end_with_bisection() {
        let temp_dir = TempDir::new().unwrap();
        let words = write_word_list(temp_dir.path(), 300);
        let config = config(
            temp_dir.path(),
            BatchConfig::Bisect {
                max_batch_size: 200,
                ratio: 0.5,
            },
            40,
        );
        let output = config.output.path.clone();

        let pipeline = DatasetPipeline::from_config(config).unwrap();
        let stats = pipeline.run(&output).await.unwrap();

        assert_eq!(stats.batch_size, 20);
        assert_eq!(stats.total_words, 300);
        assert_eq!(stats.resolved_words, 300);
        assert_eq!(stats.rounds, 1);

        let records = read_records(&output);
        assert_eq!(records.len(), 300);
        let written: HashSet<&str> = records.iter().map(|r| r.word.as_str()).collect();
        assert!(words.iter().all(|w| written.contains(w.as_str())));
        assert!(records.windows(2).all(|w| w[0].word < w[1].word));
        assert!(records.iter().all(|r| r.kata.len() == 1));
        assert!(!temp_dir.path().join("data.jsonl.tmp").exists());
    }

    #[tokio::test]
    async fn test_word_limit_and_fixed_batches() {
        let temp_dir = TempDir::new().unwrap();
        write_word_list(temp_dir.path(), 100);
        let mut config = config(temp_dir.path(), BatchConfig::Fixed { batch_size: 15 }, 10);
        config.source.max_num_words = Some(40);
        let output = temp_dir.path().join("nested").join("out.jsonl");

        let pipeline = DatasetPipeline::from_config(config).unwrap();
        let stats = pipeline.run(&output).await.unwrap();

        // capacity 10 < batch size 15: every batch drops words, rounds repeat
        assert_eq!(stats.batch_size, 15);
        assert_eq!(stats.resolved_words, 40);
        assert!(stats.rounds > 1);
        assert_eq!(read_records(&output).len(), 40);
    }

    #[tokio::test]
    async fn test_too_few_words() {
        let temp_dir = TempDir::new().unwrap();
        write_word_list(temp_dir.path(), 10);
        let config = config(temp_dir.path(), BatchConfig::Fixed { batch_size: 15 }, 10);
        let output = config.output.path.clone();

        let pipeline = DatasetPipeline::from_config(config).unwrap();
        let err = pipeline.run(&output).await.unwrap_err();
        assert!(matches!(err, KanagenError::InvalidInput(_)));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_undersized_backend_fails_planning() {
        let temp_dir = TempDir::new().unwrap();
        write_word_list(temp_dir.path(), 100);
        let config = config(
            temp_dir.path(),
            BatchConfig::Bisect {
                max_batch_size: 100,
                ratio: 0.5,
            },
            18,
        );
        let output = config.output.path.clone();

        let pipeline = DatasetPipeline::from_config(config).unwrap();
        let err = pipeline.run(&output).await.unwrap_err();
        assert!(matches!(err, KanagenError::BatchSizeTooSmall { batch_size: 9, .. }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(temp_dir.path(), BatchConfig::Fixed { batch_size: 15 }, 10);
        config.inference.concurrency = 0;
        assert!(matches!(
            DatasetPipeline::from_config(config),
            Err(KanagenError::Config(_))
        ));
    }

    #[test]
    fn test_write_results_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.jsonl");
        fs::write(&path, "stale\n").unwrap();

        let results: AnswerMap = [
            ("tea".to_string(), "ティー".to_string()),
            ("apple".to_string(), "アップル".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(write_results(&path, &results).unwrap(), 2);
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "{\"word\":\"apple\",\"kata\":[\"アップル\"]}\n{\"word\":\"tea\",\"kata\":[\"ティー\"]}\n"
        );
    }

    #[test]
    fn test_failed_write_removes_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        // a directory in the way makes the final rename fail
        let path = temp_dir.path().join("data.jsonl");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "").unwrap();

        let results: AnswerMap = [("tea".to_string(), "ティー".to_string())]
            .into_iter()
            .collect();

        let err = write_results(&path, &results).unwrap_err();
        assert!(matches!(err, KanagenError::Io { .. }));
        assert!(!temp_dir.path().join("data.jsonl.tmp").exists());
        assert!(path.join("keep").exists());
    }
}
