//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use chrono::{DateTime, Local};
pub use futures::{
    future,
    future::FutureExt,
    stream::{self, Stream, StreamExt, TryStreamExt},
};
pub use gaze_dl::{
    dataset::{
        AuxiliaryInfo, CombinationKey, FrameEntry, FrameRecord, FrameSample, GazeDataset,
        GenericDataset, MetadataConfig, PairedAccessDataset, PairedEntry, PairedRecord,
        PairwiseGazeDataset, RandomAccessDataset, SequenceSource,
    },
    loss::{HeatmapLoss, HeatmapLossInit, HeatmapLossOutput},
    model::{HeatNet, HeatNetInit},
};
pub use itertools::Itertools;
pub use noisy_float::prelude::*;
pub use rand::{prelude::*, rngs::StdRng};
pub use serde::{Deserialize, Deserializer, Serialize, Serializer};
pub use std::{
    borrow::Borrow,
    collections::HashSet,
    fmt::Debug,
    future::Future,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};
pub use structopt::StructOpt;
pub use tch::{nn, nn::OptimizerConfig as _, Device, Kind, Reduction, Tensor};
pub use tch_tensor_like::TensorLike;
pub use tfrecord::{EventWriter, EventWriterInit};
pub use tokio::sync::{broadcast, mpsc};
pub use tracing::{info, warn};

pub type Fallible<T> = Result<T, Error>;
