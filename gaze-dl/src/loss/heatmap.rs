use crate::common::*;

/// The heat-map loss configuration.
#[derive(Debug, Clone)]
pub struct HeatmapLossInit {
    pub reduction: Reduction,
    /// The weighting factor of the temporal consistency term.
    pub consistency_weight: Option<R64>,
}

impl HeatmapLossInit {
    pub fn default(reduction: Reduction) -> Self {
        Self {
            reduction,
            consistency_weight: None,
        }
    }

    pub fn build(self) -> HeatmapLoss {
        let Self {
            reduction,
            consistency_weight,
        } = self;

        HeatmapLoss {
            reduction,
            consistency_weight: consistency_weight.map(|weight| weight.raw()).unwrap_or(1.0),
        }
    }
}

/// The heat-map training loss.
#[derive(Debug)]
pub struct HeatmapLoss {
    reduction: Reduction,
    consistency_weight: f64,
}

/// The loss terms of one training step.
#[derive(Debug, TensorLike)]
pub struct HeatmapLossOutput {
    pub total_loss: Tensor,
    pub gaze_loss: Tensor,
    pub consistency_loss: Option<Tensor>,
}

impl HeatmapLoss {
    /// Computes the divergence between the predicted log heat map and the
    /// target gaze distribution.
    pub fn forward(&self, log_map: &Tensor, target: &Tensor) -> HeatmapLossOutput {
        let gaze_loss = log_map.kl_div(target, self.reduction, false);

        HeatmapLossOutput {
            total_loss: gaze_loss.shallow_clone(),
            gaze_loss,
            consistency_loss: None,
        }
    }

    /// Computes the paired-step loss with the temporal consistency term.
    ///
    /// The consistency term penalizes disagreement between the predicted
    /// heat maps at adjacent query frames.
    pub fn forward_pair(
        &self,
        log_map_t: &Tensor,
        target_t: &Tensor,
        log_map_next: &Tensor,
        target_next: &Tensor,
    ) -> HeatmapLossOutput {
        let gaze_loss = log_map_t.kl_div(target_t, self.reduction, false)
            + log_map_next.kl_div(target_next, self.reduction, false);
        let consistency_loss = (log_map_t.exp() - log_map_next.exp())
            .square()
            .mean(Kind::Float);
        let total_loss = &gaze_loss + &consistency_loss * self.consistency_weight;

        HeatmapLossOutput {
            total_loss,
            gaze_loss,
            consistency_loss: Some(consistency_loss),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_log_map(h: i64, w: i64) -> Tensor {
        (Tensor::ones(&[1, 1, h, w], (Kind::Float, Device::Cpu)) / (h * w) as f64).log()
    }

    #[test]
    fn matching_distributions_have_zero_gaze_loss() {
        let loss = HeatmapLossInit::default(Reduction::Mean).build();
        let log_map = uniform_log_map(4, 4);
        let target = Tensor::ones(&[1, 1, 4, 4], (Kind::Float, Device::Cpu)) / 16.0;

        let output = loss.forward(&log_map, &target);
        assert!(abs_diff_eq!(
            f64::from(&output.gaze_loss),
            0.0,
            epsilon = 1e-6
        ));
        assert!(output.consistency_loss.is_none());
    }

    #[test]
    fn identical_maps_have_zero_consistency_loss() {
        let loss = HeatmapLossInit {
            reduction: Reduction::Mean,
            consistency_weight: Some(r64(2.0)),
        }
        .build();
        let log_map = uniform_log_map(4, 4);
        let target = Tensor::ones(&[1, 1, 4, 4], (Kind::Float, Device::Cpu)) / 16.0;

        let output = loss.forward_pair(&log_map, &target, &log_map, &target);
        let consistency = output.consistency_loss.unwrap();
        assert!(abs_diff_eq!(f64::from(&consistency), 0.0, epsilon = 1e-6));
        assert!(abs_diff_eq!(
            f64::from(&output.total_loss),
            f64::from(&output.gaze_loss),
            epsilon = 1e-6
        ));
    }

    #[test]
    fn diverging_maps_are_penalized() {
        let loss = HeatmapLossInit::default(Reduction::Mean).build();
        let uniform = uniform_log_map(4, 4);
        let peaked = {
            let mut mass = vec![1e-3_f32; 16];
            mass[0] = 1.0 - 15e-3;
            Tensor::of_slice(&mass).view([1, 1, 4, 4]).log()
        };
        let target = Tensor::ones(&[1, 1, 4, 4], (Kind::Float, Device::Cpu)) / 16.0;

        let output = loss.forward_pair(&uniform, &target, &peaked, &target);
        assert!(f64::from(&output.consistency_loss.unwrap()) > 0.0);
        assert!(f64::from(&output.total_loss) > f64::from(&output.gaze_loss));
    }
}
