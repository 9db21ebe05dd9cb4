//! The heat-map network assembly.

mod heatnet;

pub use heatnet::*;
