use crate::{common::*, config::LearningRateSchedule};

/// Produces the learning rate for each training step.
#[derive(Debug)]
pub struct LrScheduler {
    schedule: LearningRateSchedule,
    step: usize,
}

impl LrScheduler {
    pub fn new(schedule: &LearningRateSchedule, init_step: usize) -> Result<Self> {
        if let LearningRateSchedule::StepWise { steps } = schedule {
            ensure!(!steps.is_empty(), "step-wise schedule must not be empty");
            ensure!(
                steps[0].0 == 0,
                "step-wise schedule must start at step zero"
            );
            ensure!(
                steps.windows(2).all(|pair| pair[0].0 < pair[1].0),
                "step-wise schedule steps must be strictly increasing"
            );
        }

        Ok(Self {
            schedule: schedule.clone(),
            step: init_step,
        })
    }

    /// The learning rate for the current step; advances the step counter.
    pub fn next(&mut self) -> f64 {
        let lr = match &self.schedule {
            LearningRateSchedule::Constant { lr } => lr.raw(),
            LearningRateSchedule::StepWise { steps } => {
                // the constructor guarantees a boundary at step zero
                steps
                    .iter()
                    .take_while(|(begin, _lr)| *begin <= self.step)
                    .last()
                    .unwrap()
                    .1
                    .raw()
            }
        };
        self.step += 1;
        lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_schedule_never_changes() {
        let schedule = LearningRateSchedule::Constant { lr: r64(1e-3) };
        let mut scheduler = LrScheduler::new(&schedule, 0).unwrap();

        for _ in 0..10 {
            assert_eq!(scheduler.next(), 1e-3);
        }
    }

    #[test]
    fn step_wise_schedule_switches_at_boundaries() {
        let schedule = LearningRateSchedule::StepWise {
            steps: vec![(0, r64(1e-3)), (3, r64(1e-4)), (5, r64(1e-5))],
        };
        let mut scheduler = LrScheduler::new(&schedule, 0).unwrap();

        let rates = (0..6).map(|_| scheduler.next()).collect_vec();
        assert_eq!(rates, vec![1e-3, 1e-3, 1e-3, 1e-4, 1e-4, 1e-5]);
    }

    #[test]
    fn step_wise_schedule_resumes_mid_run() {
        let schedule = LearningRateSchedule::StepWise {
            steps: vec![(0, r64(1e-3)), (3, r64(1e-4))],
        };
        let mut scheduler = LrScheduler::new(&schedule, 4).unwrap();
        assert_eq!(scheduler.next(), 1e-4);
    }

    #[test]
    fn invalid_schedules_are_rejected() {
        let schedule = LearningRateSchedule::StepWise { steps: vec![] };
        assert!(LrScheduler::new(&schedule, 0).is_err());

        let schedule = LearningRateSchedule::StepWise {
            steps: vec![(1, r64(1e-3))],
        };
        assert!(LrScheduler::new(&schedule, 0).is_err());

        let schedule = LearningRateSchedule::StepWise {
            steps: vec![(0, r64(1e-3)), (0, r64(1e-4))],
        };
        assert!(LrScheduler::new(&schedule, 0).is_err());
    }
}
