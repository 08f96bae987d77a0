//! Runs one benchmark end to end.
//!
//! Subscribers for every topic are spawned first and must be subscribed
//! before the first publisher starts. The orchestrator then waits for exactly
//! one `RunResult` per publisher and one throughput value per subscriber.
//! There is no overall deadline: a worker that never finishes blocks the run.
//! A worker that cannot connect logs the error and drops its result sender,
//! which surfaces as [`BenchError::WorkerLost`] once every other worker of
//! that role is done.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{error, info, warn};

use crate::bench::aggregate::{BenchReport, RunResult, calculate_totals};
use crate::bench::monitor::MonitorFactory;
use crate::bench::publisher::Publisher;
use crate::bench::subscriber::Subscriber;
use crate::config::Settings;
use crate::transport::{ConnectOptions, Connector};
use crate::utils::BenchError;

pub async fn run_benchmark<C: Connector>(
    settings: &Settings,
    connector: Arc<C>,
    monitors: MonitorFactory,
) -> Result<BenchReport, BenchError> {
    settings.validate()?;
    let load = &settings.load;

    if !load.start_delay().is_zero() {
        sleep(load.start_delay()).await;
    }
    let start = Instant::now();

    let (throughput_tx, mut throughputs) = mpsc::unbounded_channel::<f64>();
    let mut subscriber_handles: Vec<JoinHandle<Vec<u64>>> = Vec::new();
    let mut ready: Vec<oneshot::Receiver<()>> = Vec::new();
    let subscriber_stagger = load.stagger(load.subscribers);

    for t in 0..load.topic_count {
        for i in 0..load.subscribers {
            info!(topic = t, index = i, "starting subscriber");
            let subscriber = Subscriber::from_settings(settings, t, i)?;
            let options = connect_options(settings, "subscriber", t, i);
            let connector = connector.clone();
            let throughput_tx = throughput_tx.clone();
            let (ready_tx, ready_rx) = oneshot::channel();

            subscriber_handles.push(tokio::spawn(async move {
                let id = subscriber.id.clone();
                let client = match connector.connect(options).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!(%id, error = %e, "subscriber could not connect");
                        return Vec::new();
                    }
                };
                let subscribed = match subscriber.subscribe(client).await {
                    Ok(subscribed) => subscribed,
                    Err(e) => {
                        error!(%id, error = %e, "subscriber could not subscribe");
                        return Vec::new();
                    }
                };
                let _ = ready_tx.send(());
                subscribed.run(throughput_tx).await
            }));
            ready.push(ready_rx);

            if !subscriber_stagger.is_zero() {
                sleep(subscriber_stagger).await;
            }
        }
    }
    drop(throughput_tx);

    for rx in ready {
        // a failed subscriber has already logged why
        let _ = rx.await;
    }

    let (result_tx, mut results) = mpsc::unbounded_channel::<RunResult>();
    let publisher_stagger = load.stagger(load.publishers);

    for t in 0..load.topic_count {
        for i in 0..load.publishers {
            info!(topic = t, index = i, "starting publisher");
            let publisher = Publisher::from_settings(settings, t, i)?;
            let options = connect_options(settings, "publisher", t, i);
            let connector = connector.clone();
            let result_tx = result_tx.clone();
            let monitor = monitors();

            tokio::spawn(async move {
                let client = match connector.connect(options).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!(id = %publisher.id, error = %e, "publisher could not connect");
                        return;
                    }
                };
                let _ = result_tx.send(publisher.run(client, monitor).await);
            });

            if !publisher_stagger.is_zero() {
                sleep(publisher_stagger).await;
            }
        }
    }
    drop(result_tx);

    let runs = collect(&mut results, load.topic_count * load.publishers, "publisher").await?;
    let total_time = start.elapsed();
    let subscriber_throughputs =
        collect(&mut throughputs, load.topic_count * load.subscribers, "subscriber").await?;

    let mut latencies: Vec<u64> = Vec::new();
    for joined in join_all(subscriber_handles).await {
        match joined {
            Ok(samples) => latencies.extend(samples),
            Err(e) => warn!(error = %e, "subscriber task failed"),
        }
    }

    let totals = calculate_totals(&runs, total_time, &latencies, &subscriber_throughputs);
    Ok(BenchReport { runs, totals })
}

fn connect_options(settings: &Settings, role: &str, topic: usize, index: usize) -> ConnectOptions {
    let client_id = format!("{role}-{topic}-{index}-{}", Utc::now().timestamp_millis());
    ConnectOptions::new(&settings.broker.url, client_id)
        .with_credentials(&settings.broker.username, &settings.broker.password)
}

/// Receive exactly `expected` values, or fail once every sender is gone.
async fn collect<T>(
    rx: &mut UnboundedReceiver<T>,
    expected: usize,
    role: &'static str,
) -> Result<Vec<T>, BenchError> {
    let mut values = Vec::with_capacity(expected);
    while values.len() < expected {
        match rx.recv().await {
            Some(value) => values.push(value),
            None => return Err(BenchError::WorkerLost(role)),
        }
    }
    Ok(values)
}
