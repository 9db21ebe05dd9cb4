//! The training worker.

use crate::{
    common::*,
    config::{Config, LoadCheckpoint, LoggingConfig, TrainingConfig},
    data::{PairedTrainingRecord, TestSampler, TrainingRecord},
    logging::{EvaluationOutputLog, LoggingMessage, TrainingOutputLog},
    model::Model,
    utils::{self, LrScheduler, RateCounter},
};

/// The fixed evaluation pass run on a step cadence.
#[derive(Debug)]
pub struct Evaluation {
    pub sampler: TestSampler,
    pub dataset: Arc<GazeDataset>,
}

/// Start the single-device training worker.
pub fn training_worker(
    config: Arc<Config>,
    checkpoint_dir: Arc<PathBuf>,
    mut data_rx: mpsc::Receiver<TrainingRecord>,
    mut paired_rx: mpsc::Receiver<PairedTrainingRecord>,
    logging_tx: broadcast::Sender<LoggingMessage>,
    evaluation: Option<Evaluation>,
    device: Device,
) -> Result<()> {
    info!("use single device {:?}", device);

    let Config {
        model: ref model_config,
        logging:
            LoggingConfig {
                dir: ref logging_base_dir,
                enable_debug_stat,
                ..
            },
        training:
            TrainingConfig {
                override_initial_step,
                ref lr_schedule,
                momentum,
                weight_decay,
                consistency_weight,
                consistency_steps,
                eval_steps,
                save_checkpoint_steps,
                ref load_checkpoint,
                max_steps,
                ..
            },
        ..
    } = *config;

    // init model
    info!("initializing model");

    const DUMMY_LR: f64 = 1.0;

    let mut vs = nn::VarStore::new(device);
    let root = vs.root();
    let model = Model::new(&root, model_config)?;
    let heatmap_loss = HeatmapLossInit {
        reduction: Reduction::Mean,
        consistency_weight,
    }
    .build();
    let mut training_step_tensor = root.zeros_no_train("training_step", &[]);
    let mut optimizer = {
        let mut opt = nn::Adam {
            beta1: momentum.raw(),
            beta2: 0.999,
            wd: weight_decay.raw(),
        }
        .build(&vs, DUMMY_LR)?;
        opt.set_momentum(momentum.raw());
        opt
    };

    let consistency_steps = consistency_steps.map(|steps| steps.get());
    let eval_steps = eval_steps.map(|steps| steps.get());
    let save_checkpoint_steps = save_checkpoint_steps.map(|steps| steps.get());

    // load checkpoint
    let init_training_step = {
        utils::try_load_checkpoint(&mut vs, logging_base_dir, load_checkpoint)?;

        match override_initial_step {
            Some(init_step) => {
                training_step_tensor.copy_(&Tensor::from(init_step as f32));
                init_step
            }
            None => match load_checkpoint {
                LoadCheckpoint::Disabled => 0,
                _ => f32::from(&training_step_tensor) as usize + 1,
            },
        }
    };

    // training
    info!("start training");
    let mut training_step = init_training_step;
    let mut rate_counter = RateCounter::with_second_interval();
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let mut lr_scheduler = LrScheduler::new(lr_schedule, init_training_step)?;

    loop {
        if let Some(max_steps) = max_steps {
            if training_step >= max_steps {
                info!("reached max_steps {}, stop training", max_steps);
                break;
            }
        }

        let record = match runtime.block_on(data_rx.recv()) {
            Some(record) => record,
            None => break,
        };
        let TrainingRecord { epoch, batch, .. } = record.to_device(device);

        let lr = lr_scheduler.next();
        optimizer.set_lr(lr);

        // forward pass
        let log_map = model.forward_t(&batch.frames, true)?;

        // compute loss and step the optimizer
        let losses = heatmap_loss.forward(&log_map, &batch.gaze);
        optimizer.backward_step(&losses.total_loss);

        // paired consistency step on the configured cadence
        let paired_losses = match consistency_steps {
            Some(steps) if training_step % steps == 0 => {
                match runtime.block_on(paired_rx.recv()) {
                    Some(record) => {
                        let PairedTrainingRecord { batch, .. } = record.to_device(device);

                        let log_map_t = model.forward_t(&batch.t.frames, true)?;
                        let log_map_next = model.forward_t(&batch.next.frames, true)?;
                        let losses = heatmap_loss.forward_pair(
                            &log_map_t,
                            &batch.t.gaze,
                            &log_map_next,
                            &batch.next.gaze,
                        );
                        optimizer.backward_step(&losses.total_loss);
                        Some(losses)
                    }
                    None => None,
                }
            }
            _ => None,
        };

        // evaluation pass on the configured cadence
        if let (Some(steps), Some(evaluation)) = (eval_steps, &evaluation) {
            if training_step % steps == 0 {
                let (gaze_loss, num_batches) =
                    run_evaluation(&runtime, &model, &heatmap_loss, evaluation, device)?;

                if num_batches > 0 {
                    let msg = LoggingMessage::new_evaluation_output(
                        "test",
                        EvaluationOutputLog {
                            step: training_step,
                            gaze_loss,
                            num_batches,
                        },
                    );
                    let _ = logging_tx.send(msg);
                }
            }
        }

        // compute debug statistics
        let map_entropy = enable_debug_stat.then(|| {
            let entropy = -(log_map.exp() * &log_map)
                .sum_dim_intlist(&[2, 3], false, Kind::Float)
                .mean(Kind::Float);
            f32::from(&entropy)
        });

        // send to logger
        {
            let msg = LoggingMessage::new_training_output(
                "train",
                TrainingOutputLog {
                    step: training_step,
                    lr: r64(lr),
                    total_loss: f32::from(&losses.total_loss),
                    gaze_loss: f32::from(&losses.gaze_loss),
                    consistency_loss: paired_losses
                        .as_ref()
                        .and_then(|losses| losses.consistency_loss.as_ref())
                        .map(f32::from),
                    map_entropy,
                },
            );
            let _ = logging_tx.send(msg);
        }

        // save checkpoint
        if let Some(steps) = save_checkpoint_steps {
            if training_step % steps == 0 {
                utils::save_checkpoint(
                    &vs,
                    &checkpoint_dir,
                    training_step,
                    f64::from(&losses.total_loss),
                )?;
            }
        }

        // update training step
        training_step_tensor.copy_(&Tensor::from(training_step as f32));
        training_step += 1;

        rate_counter.add(1.0);
        if let Some(rate) = rate_counter.rate() {
            info!("epoch {}\tstep {}\t{:.2} steps/s", epoch, training_step, rate);
        }
    }

    Ok(())
}

fn run_evaluation(
    runtime: &tokio::runtime::Runtime,
    model: &Model,
    heatmap_loss: &HeatmapLoss,
    evaluation: &Evaluation,
    device: Device,
) -> Result<(f32, usize)> {
    let mut total_loss = 0f64;
    let mut num_batches = 0usize;
    let mut stream = evaluation.sampler.stream(evaluation.dataset.clone());

    runtime.block_on(async {
        while let Some(batch) = stream.try_next().await? {
            let batch = batch.to_device(device);
            let log_map = tch::no_grad(|| model.forward_t(&batch.frames, false))?;
            let losses = heatmap_loss.forward(&log_map, &batch.gaze);

            total_loss += f64::from(&losses.gaze_loss);
            num_batches += 1;
        }
        Fallible::Ok(())
    })?;

    let gaze_loss = if num_batches > 0 {
        (total_loss / num_batches as f64) as f32
    } else {
        0.0
    };
    Ok((gaze_loss, num_batches))
}
