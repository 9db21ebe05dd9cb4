use super::*;
use crate::common::*;

/// The sample tensors for one query frame.
#[derive(Debug, TensorLike)]
pub struct FrameSample {
    /// Input frame stack in CHW layout, snippet frames concatenated along the
    /// channel dimension.
    pub frames: Tensor,
    /// Target gaze distribution over the output map.
    pub gaze: Tensor,
}

/// Side information attached to a fetched sample when enabled by
/// configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliaryInfo {
    /// Absolute frame index within the source sequence.
    pub sequence_frame: i64,
    /// Raw gaze points in normalized image coordinates.
    pub raw_gaze: Vec<[f64; 2]>,
}

/// The retrieved record of the single-frame dataset.
#[derive(Debug, TensorLike)]
pub struct FrameRecord {
    pub sample: FrameSample,
    #[tensor_like(clone)]
    pub auxiliary: Vec<AuxiliaryInfo>,
}

/// The retrieved record of the pairwise dataset.
///
/// `next` holds the sample at the succeeding listed query frame offset.
#[derive(Debug, TensorLike)]
pub struct PairedRecord {
    pub t: FrameRecord,
    pub next: FrameRecord,
}
