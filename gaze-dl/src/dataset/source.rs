use super::*;
use crate::common::*;

/// The sequence retrieval service backing the datasets.
///
/// Implementations resolve a combination key and query frame offset to the
/// sample tensors plus optional auxiliary information. The datasets impose no
/// locking of their own; implementations must be safe for concurrent
/// invocation.
pub trait SequenceSource
where
    Self: Debug + Send + Sync,
{
    /// Fetch the sample at the given query frame of the given run.
    fn fetch(
        &self,
        key: &CombinationKey,
        offset: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(FrameSample, Vec<AuxiliaryInfo>)>> + Send>>;
}
