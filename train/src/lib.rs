//! The training program for the gaze heat-map pipeline.

pub mod common;
pub mod config;
pub mod data;
pub mod logging;
pub mod model;
pub mod train;
pub mod utils;

use crate::{common::*, data::TensorCacheSource};

/// The entry of the training program.
pub async fn start(config: Arc<config::Config>) -> Result<()> {
    let start_time = Local::now();
    let logging_dir = Arc::new(
        config
            .logging
            .dir
            .join(format!("{}", start_time.format(utils::FILE_STRFTIME))),
    );
    let checkpoint_dir = Arc::new(logging_dir.join("checkpoints"));
    let device = config.training.device;

    // create dirs and save config
    {
        tokio::fs::create_dir_all(&*logging_dir).await?;
        tokio::fs::create_dir_all(&*checkpoint_dir).await?;
        let path = logging_dir.join("config.json5");
        let text = serde_json::to_string_pretty(&*config)?;
        tokio::fs::write(&path, text).await?;
    }

    // create channels
    let (logging_tx, logging_rx) = broadcast::channel(2);
    let (data_tx, data_rx) = mpsc::channel(2);
    let (paired_tx, paired_rx) = mpsc::channel(2);

    // build datasets
    info!("loading dataset");
    let source = Arc::new(TensorCacheSource::new(
        &config.dataset.cache_dir,
        config.dataset.load_auxiliary,
    )?);

    let train_meta = config.dataset.metadata_config(&config.dataset.train)?;
    let test_meta = config.dataset.metadata_config(&config.dataset.test)?;

    let gaze_train = Arc::new(GazeDataset::new(&train_meta, source.clone(), None)?);
    let pairwise_train = Arc::new(PairwiseGazeDataset::new(&train_meta, source.clone())?);
    let gaze_test = Arc::new(GazeDataset::new(&test_meta, source.clone(), None)?);

    info!(
        "indexed {} training snippets, {} snippet pairs, {} test snippets",
        gaze_train.num_records(),
        pairwise_train.num_records(),
        gaze_test.num_records()
    );

    // evaluation subset
    let evaluation = match config.training.eval_steps {
        Some(_) => Some(train::Evaluation {
            sampler: data::TestSampler::new(&*gaze_test, &config.loader)?,
            dataset: gaze_test.clone(),
        }),
        None => None,
    };

    // feeding worker
    let training_data_future = {
        let mut stream = data::train_stream(gaze_train.clone(), &config.loader)?;

        tokio::task::spawn(async move {
            while let Some(result) = stream.next().await {
                let record = result?;
                if data_tx.send(record).await.is_err() {
                    // the training worker has stopped
                    break;
                }
            }
            Fallible::Ok(())
        })
        .map(|result| Fallible::Ok(result??))
        .boxed()
    };

    // paired feeding worker, only when the consistency term is scheduled
    let paired_data_future = match config.training.consistency_steps {
        Some(_) => {
            let mut stream = data::paired_train_stream(pairwise_train.clone(), &config.loader)?;

            tokio::task::spawn(async move {
                while let Some(result) = stream.next().await {
                    let record = result?;
                    if paired_tx.send(record).await.is_err() {
                        break;
                    }
                }
                Fallible::Ok(())
            })
            .map(|result| Fallible::Ok(result??))
            .boxed()
        }
        None => {
            drop(paired_tx);
            future::ready(Fallible::Ok(())).boxed()
        }
    };

    // training worker
    let training_worker_future = {
        let config = config.clone();
        let logging_tx = logging_tx.clone();
        let checkpoint_dir = checkpoint_dir.clone();

        tokio::task::spawn_blocking(move || {
            train::training_worker(
                config,
                checkpoint_dir,
                data_rx,
                paired_rx,
                logging_tx,
                evaluation,
                device,
            )
        })
        .map(|result| Fallible::Ok(result??))
    };

    // logging worker
    let logging_future = logging::logging_worker(logging_dir.clone(), logging_rx);

    // the workers hold the remaining senders
    drop(logging_tx);

    futures::try_join!(
        training_data_future,
        paired_data_future,
        training_worker_future,
        logging_future
    )?;

    Ok(())
}
