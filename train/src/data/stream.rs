use crate::{common::*, config::LoaderConfig};

/// One batch of single-frame samples.
#[derive(Debug, TensorLike)]
pub struct GazeBatch {
    pub frames: Tensor,
    pub gaze: Tensor,
}

impl GazeBatch {
    /// Stacks records along a new batch dimension.
    pub fn stack<'a>(records: impl IntoIterator<Item = &'a FrameRecord>) -> Self {
        let (frames, gaze): (Vec<_>, Vec<_>) = records
            .into_iter()
            .map(|record| (&record.sample.frames, &record.sample.gaze))
            .unzip();

        Self {
            frames: Tensor::stack(&frames, 0),
            gaze: Tensor::stack(&gaze, 0),
        }
    }

    pub fn batch_size(&self) -> i64 {
        self.frames.size()[0]
    }
}

/// One batch of paired samples.
#[derive(Debug, TensorLike)]
pub struct PairedGazeBatch {
    pub t: GazeBatch,
    pub next: GazeBatch,
}

impl PairedGazeBatch {
    /// Stacks record pairs along a new batch dimension.
    pub fn stack(records: &[PairedRecord]) -> Self {
        Self {
            t: GazeBatch::stack(records.iter().map(|record| &record.t)),
            next: GazeBatch::stack(records.iter().map(|record| &record.next)),
        }
    }
}

/// The record that is accepted by the training worker.
#[derive(Debug, TensorLike)]
pub struct TrainingRecord {
    pub epoch: usize,
    pub step: usize,
    pub batch: GazeBatch,
}

/// The paired record that is accepted by the training worker.
#[derive(Debug, TensorLike)]
pub struct PairedTrainingRecord {
    pub epoch: usize,
    pub step: usize,
    pub batch: PairedGazeBatch,
}

/// Builds the endless shuffled training stream over a single-frame dataset.
///
/// Each epoch visits every record exactly once in a fresh random order.
/// Trailing records that do not fill a batch are dropped.
pub fn train_stream<D>(
    dataset: Arc<D>,
    config: &LoaderConfig,
) -> Result<Pin<Box<dyn Stream<Item = Result<TrainingRecord>> + Send>>>
where
    D: RandomAccessDataset + Sync + 'static,
{
    let (batch_size, lookahead) = stream_params(config);
    let num_records = dataset.num_records();
    ensure!(
        num_records >= batch_size,
        "dataset has {} records but batch size is {}",
        num_records,
        batch_size
    );

    // records that fill complete batches within one epoch
    let records_per_epoch = num_records - num_records % batch_size;

    let stream = stream::iter(0..).flat_map(move |epoch: usize| {
        let mut indexes = (0..num_records).collect_vec();
        indexes.shuffle(&mut StdRng::from_entropy());
        indexes.truncate(records_per_epoch);
        stream::iter(indexes.into_iter().map(move |index| (epoch, index)))
    });

    let stream = stream
        .map(move |(epoch, index)| {
            let dataset = dataset.clone();
            async move {
                let record = dataset.nth(index).await?;
                Fallible::Ok((epoch, record))
            }
        })
        .buffered(lookahead)
        .chunks(batch_size)
        .map(|chunk| {
            let chunk: Vec<(usize, FrameRecord)> = chunk.into_iter().try_collect()?;
            let epoch = chunk[0].0;
            let records: Vec<_> = chunk.into_iter().map(|(_epoch, record)| record).collect();
            Fallible::Ok((epoch, GazeBatch::stack(&records)))
        })
        .enumerate()
        .map(|(step, result)| {
            let (epoch, batch) = result?;
            Ok(TrainingRecord { epoch, step, batch })
        });

    Ok(stream.boxed())
}

/// Builds the endless shuffled training stream over a pairwise dataset.
pub fn paired_train_stream<D>(
    dataset: Arc<D>,
    config: &LoaderConfig,
) -> Result<Pin<Box<dyn Stream<Item = Result<PairedTrainingRecord>> + Send>>>
where
    D: PairedAccessDataset + Sync + 'static,
{
    let (batch_size, lookahead) = stream_params(config);
    let num_records = dataset.num_records();
    ensure!(
        num_records >= batch_size,
        "dataset has {} record pairs but batch size is {}",
        num_records,
        batch_size
    );

    let records_per_epoch = num_records - num_records % batch_size;

    let stream = stream::iter(0..).flat_map(move |epoch: usize| {
        let mut indexes = (0..num_records).collect_vec();
        indexes.shuffle(&mut StdRng::from_entropy());
        indexes.truncate(records_per_epoch);
        stream::iter(indexes.into_iter().map(move |index| (epoch, index)))
    });

    let stream = stream
        .map(move |(epoch, index)| {
            let dataset = dataset.clone();
            async move {
                let record = dataset.nth_pair(index).await?;
                Fallible::Ok((epoch, record))
            }
        })
        .buffered(lookahead)
        .chunks(batch_size)
        .map(|chunk| {
            let chunk: Vec<(usize, PairedRecord)> = chunk.into_iter().try_collect()?;
            let epoch = chunk[0].0;
            let records: Vec<_> = chunk.into_iter().map(|(_epoch, record)| record).collect();
            Fallible::Ok((epoch, PairedGazeBatch::stack(&records)))
        })
        .enumerate()
        .map(|(step, result)| {
            let (epoch, batch) = result?;
            Ok(PairedTrainingRecord { epoch, step, batch })
        });

    Ok(stream.boxed())
}

/// The fixed evaluation subset of a dataset.
///
/// Positions are sampled once without replacement, capped at the configured
/// sample count; every pass iterates the same positions in the same order.
#[derive(Debug)]
pub struct TestSampler {
    indexes: Vec<usize>,
    batch_size: usize,
    lookahead: usize,
}

impl TestSampler {
    pub fn new<D>(dataset: &D, config: &LoaderConfig) -> Result<Self>
    where
        D: GenericDataset + ?Sized,
    {
        let (batch_size, lookahead) = stream_params(config);
        let num_records = dataset.num_records();
        ensure!(
            num_records >= batch_size,
            "dataset has {} records but batch size is {}",
            num_records,
            batch_size
        );
        ensure!(
            config.num_test_samples.get() >= batch_size,
            "num_test_samples must be at least the batch size"
        );

        let num_samples = num_records.min(config.num_test_samples.get());
        let mut indexes =
            rand::seq::index::sample(&mut StdRng::from_entropy(), num_records, num_samples)
                .into_vec();
        indexes.truncate(num_samples - num_samples % batch_size);

        Ok(Self {
            indexes,
            batch_size,
            lookahead,
        })
    }

    pub fn num_samples(&self) -> usize {
        self.indexes.len()
    }

    /// Streams the subset once, in its fixed order.
    pub fn stream<D>(
        &self,
        dataset: Arc<D>,
    ) -> Pin<Box<dyn Stream<Item = Result<GazeBatch>> + Send>>
    where
        D: RandomAccessDataset + Sync + 'static,
    {
        let batch_size = self.batch_size;

        stream::iter(self.indexes.clone())
            .map(move |index| {
                let dataset = dataset.clone();
                async move { dataset.nth(index).await }
            })
            .buffered(self.lookahead)
            .chunks(batch_size)
            .map(|chunk| {
                let records: Vec<FrameRecord> = chunk.into_iter().try_collect()?;
                Ok(GazeBatch::stack(&records))
            })
            .boxed()
    }
}

fn stream_params(config: &LoaderConfig) -> (usize, usize) {
    let batch_size = config.batch_size.get();
    let lookahead = config
        .lookahead
        .map(|lookahead| lookahead.get())
        .unwrap_or(batch_size * 2);
    (batch_size, lookahead)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct MockDataset {
        len: usize,
    }

    impl GenericDataset for MockDataset {
        fn num_records(&self) -> usize {
            self.len
        }
    }

    impl RandomAccessDataset for MockDataset {
        fn nth(&self, index: usize) -> Pin<Box<dyn Future<Output = Result<FrameRecord>> + Send>> {
            let len = self.len;
            Box::pin(async move {
                ensure!(index < len, "invalid index {}", index);
                Ok(FrameRecord {
                    sample: FrameSample {
                        frames: Tensor::of_slice(&[index as f32]),
                        gaze: Tensor::of_slice(&[index as f32]),
                    },
                    auxiliary: vec![],
                })
            })
        }
    }

    impl PairedAccessDataset for MockDataset {
        fn nth_pair(
            &self,
            index: usize,
        ) -> Pin<Box<dyn Future<Output = Result<PairedRecord>> + Send>> {
            let nth = self.nth(index);
            let nth_next = self.nth(index);
            Box::pin(async move {
                Ok(PairedRecord {
                    t: nth.await?,
                    next: nth_next.await?,
                })
            })
        }
    }

    fn loader_config(batch_size: usize, num_test_samples: usize) -> LoaderConfig {
        LoaderConfig {
            batch_size: NonZeroUsize::new(batch_size).unwrap(),
            num_test_samples: NonZeroUsize::new(num_test_samples).unwrap(),
            lookahead: None,
        }
    }

    fn batch_values(batch: &GazeBatch) -> Vec<usize> {
        Vec::<f32>::from(&batch.frames.reshape(&[-1]))
            .into_iter()
            .map(|value| value as usize)
            .collect()
    }

    #[tokio::test]
    async fn train_stream_visits_every_record_once_per_epoch() {
        let dataset = Arc::new(MockDataset { len: 10 });
        let config = loader_config(5, 5);

        let records: Vec<_> = train_stream(dataset, &config)
            .unwrap()
            .take(4)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            records.iter().map(|record| record.epoch).collect_vec(),
            vec![0, 0, 1, 1]
        );
        assert_eq!(
            records.iter().map(|record| record.step).collect_vec(),
            vec![0, 1, 2, 3]
        );

        for epoch in records.chunks(2) {
            let mut seen: Vec<_> = epoch
                .iter()
                .flat_map(|record| batch_values(&record.batch))
                .collect();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), 10);
        }
    }

    #[tokio::test]
    async fn train_stream_drops_partial_batches() {
        let dataset = Arc::new(MockDataset { len: 10 });
        let config = loader_config(4, 4);

        let records: Vec<_> = train_stream(dataset, &config)
            .unwrap()
            .take(3)
            .try_collect()
            .await
            .unwrap();

        // 10 % 4 = 2 trailing records are dropped per epoch
        assert!(records
            .iter()
            .all(|record| record.batch.batch_size() == 4));
        assert_eq!(
            records.iter().map(|record| record.epoch).collect_vec(),
            vec![0, 0, 1]
        );
    }

    #[tokio::test]
    async fn train_stream_rejects_undersized_datasets() {
        let dataset = Arc::new(MockDataset { len: 3 });
        assert!(train_stream(dataset, &loader_config(4, 4)).is_err());
    }

    #[tokio::test]
    async fn paired_train_stream_yields_paired_batches() {
        let dataset = Arc::new(MockDataset { len: 8 });
        let config = loader_config(4, 4);

        let records: Vec<_> = paired_train_stream(dataset, &config)
            .unwrap()
            .take(2)
            .try_collect()
            .await
            .unwrap();

        assert!(records
            .iter()
            .all(|record| record.batch.t.batch_size() == 4
                && record.batch.next.batch_size() == 4));
    }

    #[tokio::test]
    async fn test_sampler_is_fixed_across_passes() {
        let dataset = Arc::new(MockDataset { len: 10 });
        let config = loader_config(2, 6);

        let sampler = TestSampler::new(&*dataset, &config).unwrap();
        assert_eq!(sampler.num_samples(), 6);

        let first: Vec<_> = sampler
            .stream(dataset.clone())
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .iter()
            .flat_map(batch_values)
            .collect();
        let second: Vec<_> = sampler
            .stream(dataset.clone())
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .iter()
            .flat_map(batch_values)
            .collect();

        assert_eq!(first, second);
        assert_eq!(first.iter().unique().count(), 6);
    }

    #[tokio::test]
    async fn test_sampler_caps_at_dataset_length() {
        let dataset = Arc::new(MockDataset { len: 4 });
        let config = loader_config(2, 1000);

        let sampler = TestSampler::new(&*dataset, &config).unwrap();
        assert_eq!(sampler.num_samples(), 4);
    }
}
