//! Data logging toolkit.

use crate::common::*;
use async_std::{fs::File, io::BufWriter};

pub use logging_message::*;
pub use logging_worker::*;

mod logging_worker {
    use super::*;

    /// The data logging worker.
    #[derive(Debug)]
    pub struct LoggingWorker {
        event_writer: EventWriter<BufWriter<File>>,
        rx: broadcast::Receiver<LoggingMessage>,
    }

    impl LoggingWorker {
        /// Create a data logging worker.
        async fn new(
            logging_dir: Arc<PathBuf>,
            rx: broadcast::Receiver<LoggingMessage>,
        ) -> Result<Self> {
            // prepare dirs
            let event_dir = logging_dir.join("events");
            let event_path_prefix = event_dir
                .join("gaze-dl")
                .into_os_string()
                .into_string()
                .unwrap();

            tokio::fs::create_dir_all(&event_dir).await?;

            let event_writer = EventWriterInit::default()
                .from_prefix_async(event_path_prefix, None)
                .await?;

            Ok(Self { event_writer, rx })
        }

        /// Start the data logging worker.
        async fn start(mut self) -> Result<()> {
            loop {
                let LoggingMessage { tag, kind } = match self.rx.recv().await {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                match kind {
                    LoggingMessageKind::TrainingOutput(msg) => {
                        self.log_training_output(&tag, msg).await?;
                    }
                    LoggingMessageKind::EvaluationOutput(msg) => {
                        self.log_evaluation_output(&tag, msg).await?;
                    }
                }
            }

            Ok(())
        }

        async fn log_training_output(&mut self, tag: &str, msg: TrainingOutputLog) -> Result<()> {
            let TrainingOutputLog {
                step,
                lr,
                total_loss,
                gaze_loss,
                consistency_loss,
                map_entropy,
            } = msg;
            let step = step as i64;

            // log parameters
            self.event_writer
                .write_scalar_async(
                    format!("{}/params/learning_rate", tag),
                    step,
                    lr.raw() as f32,
                )
                .await?;

            // log losses
            self.event_writer
                .write_scalar_async(format!("{}/loss/total_loss", tag), step, total_loss)
                .await?;
            self.event_writer
                .write_scalar_async(format!("{}/loss/gaze_loss", tag), step, gaze_loss)
                .await?;
            if let Some(value) = consistency_loss {
                self.event_writer
                    .write_scalar_async(format!("{}/loss/consistency_loss", tag), step, value)
                    .await?;
            }

            // log debug statistics
            if let Some(value) = map_entropy {
                self.event_writer
                    .write_scalar_async(format!("{}/stat/map_entropy", tag), step, value)
                    .await?;
            }

            Ok(())
        }

        async fn log_evaluation_output(
            &mut self,
            tag: &str,
            msg: EvaluationOutputLog,
        ) -> Result<()> {
            let EvaluationOutputLog {
                step,
                gaze_loss,
                num_batches,
            } = msg;
            let step = step as i64;

            self.event_writer
                .write_scalar_async(format!("{}/loss/gaze_loss", tag), step, gaze_loss)
                .await?;
            self.event_writer
                .write_scalar_async(
                    format!("{}/stat/num_batches", tag),
                    step,
                    num_batches as f32,
                )
                .await?;

            Ok(())
        }
    }

    /// Runs the logging worker until every sender is dropped.
    pub async fn logging_worker(
        logging_dir: Arc<PathBuf>,
        rx: broadcast::Receiver<LoggingMessage>,
    ) -> Result<()> {
        LoggingWorker::new(logging_dir, rx).await?.start().await
    }
}

mod logging_message {
    use super::*;

    /// The message sent to the logging worker.
    #[derive(Debug, Clone)]
    pub struct LoggingMessage {
        pub tag: String,
        pub kind: LoggingMessageKind,
    }

    #[derive(Debug, Clone)]
    pub enum LoggingMessageKind {
        TrainingOutput(TrainingOutputLog),
        EvaluationOutput(EvaluationOutputLog),
    }

    /// The scalar statistics of one training step.
    #[derive(Debug, Clone)]
    pub struct TrainingOutputLog {
        pub step: usize,
        pub lr: R64,
        pub total_loss: f32,
        pub gaze_loss: f32,
        pub consistency_loss: Option<f32>,
        pub map_entropy: Option<f32>,
    }

    /// The scalar statistics of one evaluation pass.
    #[derive(Debug, Clone)]
    pub struct EvaluationOutputLog {
        pub step: usize,
        pub gaze_loss: f32,
        pub num_batches: usize,
    }

    impl LoggingMessage {
        pub fn new_training_output(tag: impl Into<String>, output: TrainingOutputLog) -> Self {
            Self {
                tag: tag.into(),
                kind: LoggingMessageKind::TrainingOutput(output),
            }
        }

        pub fn new_evaluation_output(tag: impl Into<String>, output: EvaluationOutputLog) -> Self {
            Self {
                tag: tag.into(),
                kind: LoggingMessageKind::EvaluationOutput(output),
            }
        }
    }
}
