use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::core::metrics::{now_millis, Sample};
use crate::history::types::PersistenceStatus;
use crate::traits::SampleStore;

#[derive(Debug, Clone, Copy)]
pub(crate) struct FlushPolicy {
    pub interval: Duration,
    pub batch: usize,
    /// Oldest samples are dropped beyond this; the ring buffer cannot hold more either
    pub max_backlog: usize,
}

/// Drains the sampler channel into a backlog and writes it in batches
///
/// A failed write leaves the backlog intact, so the same samples go out with the next
/// flush. On shutdown the channel is drained and one last flush is attempted.
pub(crate) async fn run(
    store: Arc<dyn SampleStore>,
    mut rx: mpsc::Receiver<Sample>,
    policy: FlushPolicy,
    status: Arc<Mutex<PersistenceStatus>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backlog: VecDeque<Sample> = VecDeque::new();
    let mut ticker = tokio::time::interval(policy.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    info!(interval = ?policy.interval, batch = policy.batch, "persistence task started");
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(sample) => {
                    enqueue(&mut backlog, sample, &policy, &status);
                    if backlog.len() >= policy.batch {
                        flush(store.as_ref(), &mut backlog, &policy, &status).await;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                flush(store.as_ref(), &mut backlog, &policy, &status).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    rx.close();
    while let Ok(sample) = rx.try_recv() {
        enqueue(&mut backlog, sample, &policy, &status);
    }
    flush(store.as_ref(), &mut backlog, &policy, &status).await;
    if backlog.is_empty() {
        info!("persistence task stopped, backlog flushed");
    } else {
        warn!(unflushed = backlog.len(), "persistence task stopped with unflushed samples");
    }
}

fn enqueue(
    backlog: &mut VecDeque<Sample>,
    sample: Sample,
    policy: &FlushPolicy,
    status: &Mutex<PersistenceStatus>,
) {
    let mut status = status.lock();
    if backlog.len() >= policy.max_backlog {
        backlog.pop_front();
        status.dropped += 1;
    }
    backlog.push_back(sample);
    status.backlog = backlog.len();
}

/// Writes the backlog in `policy.batch` sized transactions, oldest first, stopping at
/// the first failure
#[instrument(skip_all, fields(backlog = backlog.len()))]
async fn flush(
    store: &dyn SampleStore,
    backlog: &mut VecDeque<Sample>,
    policy: &FlushPolicy,
    status: &Mutex<PersistenceStatus>,
) {
    while !backlog.is_empty() {
        let take = backlog.len().min(policy.batch);
        let batch = &backlog.make_contiguous()[..take];

        match store.append(batch).await {
            Ok(()) => {
                backlog.drain(..take);
                let mut status = status.lock();
                status.persisted += take as u64;
                status.backlog = backlog.len();
                status.last_flush = Some(now_millis());
                status.last_error = None;
                debug!(written = take, remaining = backlog.len(), "flushed samples");
            }
            Err(e) => {
                let mut status = status.lock();
                status.failed_flushes += 1;
                status.backlog = backlog.len();
                status.last_error = Some(e.to_string());
                warn!(error = %e, pending = backlog.len(), "history flush failed, will retry");
                return;
            }
        }
    }
}
