//! Training program configuration format.

use crate::common::*;

pub use dataset::*;
pub use training::*;

/// The main training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: HeatNetInit,
    pub dataset: DatasetConfig,
    pub loader: LoaderConfig,
    pub logging: LoggingConfig,
    pub training: TrainingConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(path)?;
        let config = json5::from_str(&text)?;
        Ok(config)
    }
}

/// Data logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub enable_debug_stat: bool,
}

/// Batching options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// The batch size.
    pub batch_size: NonZeroUsize,
    /// The number of evaluation samples drawn from the test split.
    pub num_test_samples: NonZeroUsize,
    /// The maximum number of in-flight fetches per stream.
    pub lookahead: Option<NonZeroUsize>,
}

mod dataset {
    use super::*;

    /// Dataset options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DatasetConfig {
        /// The CSV file listing every available (sequence, subject, task)
        /// run.
        pub valid_combinations_file: PathBuf,
        /// Query frame offsets within each sequence timeline.
        pub query_frame_offsets: Vec<i64>,
        /// The directory holding pre-extracted snippet tensors.
        pub cache_dir: PathBuf,
        /// If set, attach auxiliary information to fetched samples.
        pub load_auxiliary: bool,
        /// Identifier candidates of the training split.
        pub train: SplitConfig,
        /// Identifier candidates of the test split.
        pub test: SplitConfig,
    }

    /// Identifier candidates of one dataset split.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SplitConfig {
        pub sequence_ids: Vec<u32>,
        pub subject_ids: Vec<u32>,
        pub task_ids: Vec<String>,
    }

    impl DatasetConfig {
        /// Builds the metadata configuration of one split, reading the
        /// valid-combination list from the configured CSV file.
        pub fn metadata_config(&self, split: &SplitConfig) -> Result<MetadataConfig> {
            let valid_combinations = load_combinations_file(&self.valid_combinations_file)?;

            Ok(MetadataConfig {
                sequence_ids: split.sequence_ids.clone(),
                subject_ids: split.subject_ids.clone(),
                task_ids: split.task_ids.clone(),
                valid_combinations,
                query_frame_offsets: self.query_frame_offsets.clone(),
            })
        }
    }

    /// Parses the CSV file listing available (sequence, subject, task) runs.
    pub fn load_combinations_file(path: impl AsRef<Path>) -> Result<Vec<CombinationKey>> {
        let path = path.as_ref();

        let combinations: Vec<CombinationKey> = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .comment(Some(b'#'))
            .from_path(path)
            .with_context(|| format!("failed to open combination file '{}'", path.display()))?
            .deserialize()
            .try_collect()
            .with_context(|| format!("failed to parse combination file '{}'", path.display()))?;

        Ok(combinations)
    }
}

mod training {
    use super::*;

    /// The training options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TrainingConfig {
        /// If enabled, it overrides the initial training step.
        pub override_initial_step: Option<usize>,
        /// Learning rate scheduling strategy.
        pub lr_schedule: LearningRateSchedule,
        /// The momentum parameter for optimizer.
        pub momentum: R64,
        /// The weight decay parameter for optimizer.
        pub weight_decay: R64,
        /// The weighting factor of the temporal consistency term.
        pub consistency_weight: Option<R64>,
        /// Run a paired consistency step per this many training steps.
        pub consistency_steps: Option<NonZeroUsize>,
        /// Run an evaluation pass per this many training steps.
        pub eval_steps: Option<NonZeroUsize>,
        /// If set, it saves a checkpoint file per this steps.
        pub save_checkpoint_steps: Option<NonZeroUsize>,
        /// Checkpoint file loading method.
        pub load_checkpoint: LoadCheckpoint,
        /// If set, stop after this many training steps.
        pub max_steps: Option<usize>,
        /// The training device.
        #[serde(with = "tch_serde::serde_device")]
        pub device: Device,
    }

    /// The learning rate scheduling strategy.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum LearningRateSchedule {
        /// Use constant learning rate.
        Constant { lr: R64 },
        /// Use specific learning rate at specified steps.
        StepWise { steps: Vec<(usize, R64)> },
    }

    /// Checkpoint file loading method.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum LoadCheckpoint {
        /// Disable checkpoint file loading.
        Disabled,
        /// Load the most recent checkpoint file.
        FromRecent,
        /// Load the checkpoint file at specified path.
        FromFile { file: PathBuf },
    }
}
