use crate::common::*;

/// A sequence source backed by pre-extracted snippet tensors.
///
/// The extraction tool writes one file per (sequence, subject, task, frame)
/// item holding the named tensors `frames` and `gaze`, plus `raw_gaze` when
/// auxiliary information was exported. Missing or malformed files surface as
/// errors and propagate to the caller unchanged.
#[derive(Debug)]
pub struct TensorCacheSource {
    cache_dir: PathBuf,
    load_auxiliary: bool,
}

impl TensorCacheSource {
    pub fn new(cache_dir: impl AsRef<Path>, load_auxiliary: bool) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_owned();
        ensure!(
            cache_dir.is_dir(),
            "'{}' is not a directory",
            cache_dir.display()
        );

        Ok(Self {
            cache_dir,
            load_auxiliary,
        })
    }

    fn snippet_path(&self, key: &CombinationKey, offset: i64) -> PathBuf {
        let CombinationKey {
            sequence,
            subject,
            task,
        } = key;
        self.cache_dir.join(format!(
            "{:03}_{:03}_{}_{:06}.zip",
            sequence, subject, task, offset
        ))
    }
}

impl SequenceSource for TensorCacheSource {
    fn fetch(
        &self,
        key: &CombinationKey,
        offset: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(FrameSample, Vec<AuxiliaryInfo>)>> + Send>> {
        let path = self.snippet_path(key, offset);
        let load_auxiliary = self.load_auxiliary;

        Box::pin(async move {
            tokio::task::spawn_blocking(move || load_snippet(&path, offset, load_auxiliary))
                .await?
        })
    }
}

fn load_snippet(
    path: &Path,
    offset: i64,
    load_auxiliary: bool,
) -> Result<(FrameSample, Vec<AuxiliaryInfo>)> {
    let named = Tensor::load_multi(path)
        .with_context(|| format!("failed to load snippet file '{}'", path.display()))?;

    let mut frames = None;
    let mut gaze = None;
    let mut raw_gaze = None;

    for (name, tensor) in named {
        match name.as_str() {
            "frames" => frames = Some(tensor),
            "gaze" => gaze = Some(tensor),
            "raw_gaze" => raw_gaze = Some(tensor),
            _ => {}
        }
    }

    let frames = frames
        .ok_or_else(|| format_err!("missing 'frames' tensor in '{}'", path.display()))?;
    let gaze =
        gaze.ok_or_else(|| format_err!("missing 'gaze' tensor in '{}'", path.display()))?;

    let auxiliary = match (load_auxiliary, raw_gaze) {
        (true, Some(raw_gaze)) => {
            let points: Vec<f64> = Vec::from(&raw_gaze.reshape(&[-1]).to_kind(Kind::Double));
            let raw_gaze = points
                .chunks_exact(2)
                .map(|point| [point[0], point[1]])
                .collect();

            vec![AuxiliaryInfo {
                sequence_frame: offset,
                raw_gaze,
            }]
        }
        _ => vec![],
    };

    Ok((FrameSample { frames, gaze }, auxiliary))
}
