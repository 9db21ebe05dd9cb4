//! The model adaptor.

use crate::common::*;

/// The heat-map model assembled from the configuration.
#[derive(Debug)]
pub struct Model {
    heatnet: HeatNet,
}

impl Model {
    /// Builds the model under the given variable namespace.
    pub fn new<'a>(path: impl Borrow<nn::Path<'a>>, config: &HeatNetInit) -> Result<Self> {
        let heatnet = config.clone().build(path)?;
        Ok(Self { heatnet })
    }

    /// Runs the network and returns the predicted log heat map.
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor> {
        self.heatnet.forward_t(input, train)
    }

    /// The output map size.
    pub fn output_size(&self) -> (i64, i64) {
        self.heatnet.output_size()
    }
}
