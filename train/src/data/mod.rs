//! Data source and batching layer.

mod source;
mod stream;

pub use source::*;
pub use stream::*;
