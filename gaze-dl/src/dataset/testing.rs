//! Test support.

use super::*;
use crate::common::*;
use std::sync::Mutex;

/// A sequence source that records every fetch and returns tiny tensors.
#[derive(Debug)]
pub struct RecordingSource {
    calls: Mutex<Vec<(CombinationKey, i64)>>,
}

impl RecordingSource {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<(CombinationKey, i64)> {
        self.calls.lock().unwrap().clone()
    }
}

impl SequenceSource for RecordingSource {
    fn fetch(
        &self,
        key: &CombinationKey,
        offset: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(FrameSample, Vec<AuxiliaryInfo>)>> + Send>> {
        self.calls.lock().unwrap().push((key.clone(), offset));

        Box::pin(async move {
            let sample = FrameSample {
                frames: Tensor::zeros(&[3, 8, 8], (Kind::Float, Device::Cpu)),
                gaze: Tensor::ones(&[1, 4, 4], (Kind::Float, Device::Cpu)) / 16.0,
            };
            Ok((sample, vec![]))
        })
    }
}
