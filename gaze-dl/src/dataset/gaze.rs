use super::*;
use crate::common::*;

/// The single-frame gaze dataset.
///
/// Every indexable item selects one query frame of one valid
/// (sequence, subject, task) run. The metadata index is built eagerly at
/// construction and is immutable afterwards.
#[derive(Debug)]
pub struct GazeDataset {
    entries: Vec<FrameEntry>,
    source: Arc<dyn SequenceSource>,
}

impl GazeDataset {
    /// Builds the metadata index from the configuration.
    ///
    /// Entries named in `skip` are excluded so that snippets already indexed
    /// by another dataset are not double counted during training.
    pub fn new(
        config: &MetadataConfig,
        source: Arc<dyn SequenceSource>,
        skip: Option<&HashSet<FrameEntry>>,
    ) -> Result<Self> {
        config.validate()?;

        let combinations = config.filtered_combinations();
        let entries = expand_single(&combinations, &config.query_frame_offsets);

        let entries = match skip {
            Some(skip) => {
                let orig_len = entries.len();
                let entries: Vec<_> = entries
                    .into_iter()
                    .filter(|entry| !skip.contains(entry))
                    .collect();

                let num_skipped = orig_len - entries.len();
                if num_skipped > 0 {
                    warn!(
                        "excluded {} snippets already indexed by another dataset",
                        num_skipped
                    );
                }
                entries
            }
            None => entries,
        };

        Ok(Self { entries, source })
    }

    /// The ordered metadata index backing this dataset.
    pub fn metadata(&self) -> &[FrameEntry] {
        &self.entries
    }

    /// Get the metadata entry at the given position.
    pub fn get(&self, index: usize) -> Option<&FrameEntry> {
        self.entries.get(index)
    }
}

impl GenericDataset for GazeDataset {
    fn num_records(&self) -> usize {
        self.entries.len()
    }
}

impl RandomAccessDataset for GazeDataset {
    fn nth(&self, index: usize) -> Pin<Box<dyn Future<Output = Result<FrameRecord>> + Send>> {
        let entry = self.entries.get(index).cloned();
        let source = self.source.clone();

        Box::pin(async move {
            let FrameEntry { key, offset } =
                entry.ok_or_else(|| format_err!("invalid index {}", index))?;

            let (sample, auxiliary) = source
                .fetch(&key, offset)
                .await
                .with_context(|| format!("failed to fetch frame {} of run {}", offset, key))?;

            Ok(FrameRecord { sample, auxiliary })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::testing::RecordingSource;

    fn config() -> MetadataConfig {
        MetadataConfig {
            sequence_ids: vec![6, 35],
            subject_ids: vec![1],
            task_ids: vec!["roadonly".to_string()],
            valid_combinations: vec![
                CombinationKey::new(6, 1, "roadonly"),
                CombinationKey::new(35, 1, "roadonly"),
            ],
            query_frame_offsets: vec![5, 10],
        }
    }

    #[tokio::test]
    async fn gaze_dataset_resolves_positions() {
        let source = Arc::new(RecordingSource::new());
        let dataset = GazeDataset::new(&config(), source.clone(), None).unwrap();

        assert_eq!(dataset.num_records(), 4);
        assert_eq!(
            dataset.get(0),
            Some(&FrameEntry {
                key: CombinationKey::new(6, 1, "roadonly"),
                offset: 5,
            })
        );

        let record = dataset.nth(3).await.unwrap();
        assert!(record.auxiliary.is_empty());
        assert_eq!(
            source.calls(),
            vec![(CombinationKey::new(35, 1, "roadonly"), 10)]
        );
    }

    #[tokio::test]
    async fn gaze_dataset_rejects_out_of_range_positions() {
        let source = Arc::new(RecordingSource::new());
        let dataset = GazeDataset::new(&config(), source.clone(), None).unwrap();

        assert!(dataset.nth(4).await.is_err());
        assert!(dataset.get(4).is_none());
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn gaze_dataset_does_not_cache_lookups() {
        let source = Arc::new(RecordingSource::new());
        let dataset = GazeDataset::new(&config(), source.clone(), None).unwrap();

        dataset.nth(0).await.unwrap();
        dataset.nth(0).await.unwrap();
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn gaze_dataset_honors_skip_list() {
        let source = Arc::new(RecordingSource::new());
        let skip: HashSet<_> = [FrameEntry {
            key: CombinationKey::new(6, 1, "roadonly"),
            offset: 10,
        }]
        .into_iter()
        .collect();

        let dataset = GazeDataset::new(&config(), source, Some(&skip)).unwrap();

        assert_eq!(dataset.num_records(), 3);
        assert!(dataset.metadata().iter().all(|entry| !skip.contains(entry)));
        // the remainder keeps its original order
        assert_eq!(dataset.get(0).unwrap().offset, 5);
        assert_eq!(dataset.get(1).unwrap().key.sequence, 35);
    }
}
