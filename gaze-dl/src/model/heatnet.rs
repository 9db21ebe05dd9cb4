use crate::common::*;

/// The network assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatNetInit {
    /// Number of input channels, snippet frames included.
    pub input_channels: usize,
    /// Input image height.
    pub input_h: usize,
    /// Input image width.
    pub input_w: usize,
    /// Number of latent channels fed to the predictor head.
    pub num_latent_layers: usize,
    /// Spatial reduction factor from the input image to the output map.
    pub reduction_factor: R64,
}

impl HeatNetInit {
    /// The output map size, rounded per spatial dimension.
    pub fn output_size(&self) -> Result<(i64, i64)> {
        ensure!(
            self.reduction_factor > 0.0,
            "reduction_factor must be positive"
        );
        let out_h = (self.input_h as f64 / self.reduction_factor.raw()).round() as i64;
        let out_w = (self.input_w as f64 / self.reduction_factor.raw()).round() as i64;
        ensure!(
            out_h > 0 && out_w > 0,
            "input size {}x{} is too small for reduction factor {}",
            self.input_h,
            self.input_w,
            self.reduction_factor
        );
        Ok((out_h, out_w))
    }

    /// Builds the network under the given variable namespace.
    pub fn build<'p, P>(self, path: P) -> Result<HeatNet>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let (out_h, out_w) = self.output_size()?;
        let Self {
            input_channels,
            num_latent_layers,
            ..
        } = self;

        ensure!(input_channels > 0, "input_channels must be positive");
        ensure!(num_latent_layers > 0, "num_latent_layers must be positive");

        let backbone = FusionBackbone::new(
            path / "backbone",
            input_channels as i64,
            num_latent_layers as i64,
        );
        let predictor = MapPredictor::new(path / "predictor", num_latent_layers as i64);

        Ok(HeatNet {
            backbone,
            predictor,
            out_h,
            out_w,
        })
    }
}

/// Encoder-decoder backbone plus heat-map predictor head.
#[derive(Debug)]
pub struct HeatNet {
    backbone: FusionBackbone,
    predictor: MapPredictor,
    out_h: i64,
    out_w: i64,
}

impl HeatNet {
    /// Runs the network on a `[batch, channels, height, width]` input and
    /// returns the log heat map with shape `[batch, 1, out_h, out_w]`.
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor> {
        let latent = self.backbone.forward_t(input, train);
        let latent = latent.upsample_bilinear2d(&[self.out_h, self.out_w], false, None, None);
        let logits = self.predictor.forward_t(&latent, train);

        // normalize over the spatial domain
        let (b, c, h, w) = logits.size4()?;
        let log_map = logits
            .view([b, c, h * w])
            .log_softmax(2, Kind::Float)
            .view([b, c, h, w]);
        Ok(log_map)
    }

    /// The output map size.
    pub fn output_size(&self) -> (i64, i64) {
        (self.out_h, self.out_w)
    }
}

/// The encoder-decoder backbone producing the latent feature stack.
#[derive(Debug)]
struct FusionBackbone {
    enc1: nn::Conv2D,
    enc2: nn::Conv2D,
    enc3: nn::Conv2D,
    dec1: nn::ConvTranspose2D,
    dec2: nn::ConvTranspose2D,
}

impl FusionBackbone {
    fn new<'p, P>(path: P, in_c: i64, out_c: i64) -> Self
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();

        let conv_cfg = |stride| nn::ConvConfig {
            stride,
            padding: 1,
            ..Default::default()
        };
        let deconv_cfg = nn::ConvTransposeConfig {
            stride: 2,
            padding: 1,
            ..Default::default()
        };

        Self {
            enc1: nn::conv2d(path / "enc1", in_c, 32, 3, conv_cfg(2)),
            enc2: nn::conv2d(path / "enc2", 32, 64, 3, conv_cfg(2)),
            enc3: nn::conv2d(path / "enc3", 64, 128, 3, conv_cfg(2)),
            dec1: nn::conv_transpose2d(path / "dec1", 128, 64, 4, deconv_cfg),
            dec2: nn::conv_transpose2d(path / "dec2", 64, out_c, 4, deconv_cfg),
        }
    }
}

impl nn::ModuleT for FusionBackbone {
    fn forward_t(&self, xs: &Tensor, _train: bool) -> Tensor {
        xs.apply(&self.enc1)
            .relu()
            .apply(&self.enc2)
            .relu()
            .apply(&self.enc3)
            .relu()
            .apply(&self.dec1)
            .relu()
            .apply(&self.dec2)
            .relu()
    }
}

/// The predictor head mapping latent features to heat-map logits.
#[derive(Debug)]
struct MapPredictor {
    conv1: nn::Conv2D,
    conv2: nn::Conv2D,
}

impl MapPredictor {
    fn new<'p, P>(path: P, in_c: i64) -> Self
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();

        Self {
            conv1: nn::conv2d(
                path / "conv1",
                in_c,
                in_c,
                3,
                nn::ConvConfig {
                    padding: 1,
                    ..Default::default()
                },
            ),
            conv2: nn::conv2d(path / "conv2", in_c, 1, 1, Default::default()),
        }
    }
}

impl nn::ModuleT for MapPredictor {
    fn forward_t(&self, xs: &Tensor, _train: bool) -> Tensor {
        xs.apply(&self.conv1).relu().apply(&self.conv2)
    }
}
