pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use approx::abs_diff_eq;
pub use futures::{
    future,
    stream::{self, Stream, StreamExt as _, TryStreamExt as _},
};
pub use itertools::{iproduct, Itertools as _};
pub use log::warn;
pub use noisy_float::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Borrow,
    collections::{HashMap, HashSet},
    fmt,
    fmt::Debug,
    future::Future,
    hash::{Hash, Hasher},
    pin::Pin,
    sync::Arc,
};
pub use tch::{nn, nn::ModuleT as _, Device, Kind, Reduction, Tensor};
pub use tch_tensor_like::TensorLike;
