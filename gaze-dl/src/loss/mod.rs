//! Training losses for heat-map prediction.

mod heatmap;

pub use heatmap::*;
