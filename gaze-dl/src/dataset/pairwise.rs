use super::*;
use crate::common::*;

/// The pairwise gaze dataset.
///
/// Every indexable item selects a temporally adjacent pair of query frames of
/// one valid run, used by the temporal consistency objective. The pair spans
/// adjacent entries of the configured offset list, so the final listed offset
/// only ever appears as the second member of a pair.
#[derive(Debug)]
pub struct PairwiseGazeDataset {
    entries: Vec<PairedEntry>,
    source: Arc<dyn SequenceSource>,
}

impl PairwiseGazeDataset {
    /// Builds the metadata index from the configuration.
    pub fn new(config: &MetadataConfig, source: Arc<dyn SequenceSource>) -> Result<Self> {
        config.validate()?;

        let combinations = config.filtered_combinations();
        let entries = expand_pairwise(&combinations, &config.query_frame_offsets);

        Ok(Self { entries, source })
    }

    /// The ordered metadata index backing this dataset.
    pub fn metadata(&self) -> &[PairedEntry] {
        &self.entries
    }

    /// Get the metadata entry at the given position.
    pub fn get(&self, index: usize) -> Option<&PairedEntry> {
        self.entries.get(index)
    }
}

impl GenericDataset for PairwiseGazeDataset {
    fn num_records(&self) -> usize {
        self.entries.len()
    }
}

impl PairedAccessDataset for PairwiseGazeDataset {
    fn nth_pair(
        &self,
        index: usize,
    ) -> Pin<Box<dyn Future<Output = Result<PairedRecord>> + Send>> {
        let entry = self.entries.get(index).cloned();
        let source = self.source.clone();

        Box::pin(async move {
            let PairedEntry {
                key,
                offset,
                next_offset,
            } = entry.ok_or_else(|| format_err!("invalid index {}", index))?;

            let ((sample_t, auxiliary_t), (sample_next, auxiliary_next)) = future::try_join(
                source.fetch(&key, offset),
                source.fetch(&key, next_offset),
            )
            .await
            .with_context(|| {
                format!(
                    "failed to fetch frame pair ({}, {}) of run {}",
                    offset, next_offset, key
                )
            })?;

            Ok(PairedRecord {
                t: FrameRecord {
                    sample: sample_t,
                    auxiliary: auxiliary_t,
                },
                next: FrameRecord {
                    sample: sample_next,
                    auxiliary: auxiliary_next,
                },
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::testing::RecordingSource;

    fn config() -> MetadataConfig {
        MetadataConfig {
            sequence_ids: vec![6],
            subject_ids: vec![1],
            task_ids: vec!["roadonly".to_string()],
            valid_combinations: vec![CombinationKey::new(6, 1, "roadonly")],
            query_frame_offsets: vec![5, 10, 15],
        }
    }

    #[tokio::test]
    async fn pairwise_dataset_fetches_both_frames() {
        let source = Arc::new(RecordingSource::new());
        let dataset = PairwiseGazeDataset::new(&config(), source.clone()).unwrap();

        assert_eq!(dataset.num_records(), 2);

        let _record = dataset.nth_pair(1).await.unwrap();
        let mut calls = source.calls();
        calls.sort_by_key(|(_, offset)| *offset);
        assert_eq!(
            calls,
            vec![
                (CombinationKey::new(6, 1, "roadonly"), 10),
                (CombinationKey::new(6, 1, "roadonly"), 15),
            ]
        );
    }

    #[tokio::test]
    async fn pairwise_dataset_rejects_out_of_range_positions() {
        let source = Arc::new(RecordingSource::new());
        let dataset = PairwiseGazeDataset::new(&config(), source.clone()).unwrap();

        assert!(dataset.nth_pair(2).await.is_err());
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn pairwise_dataset_is_empty_for_single_offset() {
        let source = Arc::new(RecordingSource::new());
        let config = MetadataConfig {
            query_frame_offsets: vec![5],
            ..config()
        };

        let dataset = PairwiseGazeDataset::new(&config, source).unwrap();
        assert_eq!(dataset.num_records(), 0);
        assert!(dataset.nth_pair(0).await.is_err());
    }
}
