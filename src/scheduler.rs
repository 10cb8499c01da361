// Poll scheduler: one process-wide timer drives poll cycles, independent of how many
// dashboard clients are attached. A cycle fans out one probe task per upstream and
// joins them all before the next tick is considered.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Duration, interval};
use tracing::Instrument;

use crate::models::{StatusRecord, Upstream};
use crate::prober::Prober;

/// Scheduler inputs.
pub struct SchedulerDeps {
    pub prober: Prober,
    pub upstreams: Arc<[Upstream]>,
    pub records: mpsc::Sender<StatusRecord>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Run one poll cycle: probe every upstream concurrently, each task sending exactly one
/// record to `records`. Returns once all probes have finished; yields the number of
/// probes that completed.
pub async fn poll_cycle(
    prober: &Prober,
    upstreams: &[Upstream],
    records: &mpsc::Sender<StatusRecord>,
) -> usize {
    let mut probes = JoinSet::new();
    for upstream in upstreams {
        let prober = prober.clone();
        let upstream = upstream.clone();
        let records = records.clone();
        probes.spawn(async move {
            let record = prober.probe(&upstream).await;
            if records.send(record).await.is_err() {
                tracing::debug!(server = %upstream.id, "hub gone; dropping poll result");
            }
        });
    }

    let mut completed = 0;
    while let Some(result) = probes.join_next().await {
        match result {
            Ok(()) => completed += 1,
            Err(e) => tracing::warn!(error = %e, operation = "poll_cycle", "probe task failed"),
        }
    }
    completed
}

/// Spawns the scheduler. The first cycle runs immediately; afterwards one cycle per
/// `poll_interval`. A cycle in flight always runs to completion; shutdown is only
/// observed between cycles.
pub fn spawn(deps: SchedulerDeps, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
    let SchedulerDeps {
        prober,
        upstreams,
        records,
        mut shutdown_rx,
    } = deps;

    let span = tracing::span!(
        tracing::Level::DEBUG,
        "scheduler",
        interval_ms = poll_interval.as_millis() as u64,
        upstreams = upstreams.len()
    );

    tokio::spawn(
        async move {
            let mut tick = interval(poll_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut cycles: u64 = 0;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let probed = poll_cycle(&prober, &upstreams, &records).await;
                        cycles += 1;
                        tracing::debug!(cycle = cycles, probed, "poll cycle complete");
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Scheduler shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(span),
    )
}
