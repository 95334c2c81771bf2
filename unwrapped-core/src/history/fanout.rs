//! Concurrent walk: time-sliced workers feeding one aggregating consumer.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use super::{fetch_with_retry, oldest, strip_anchor, Cursor, HistoryWalker, RetryPolicy, WalkStats};
use crate::analytics::Aggregator;
use crate::error::{Error, Result};
use crate::source::{HistoryRequest, MessageSource};
use crate::types::{ChannelPeer, Message};

/// The part of history one worker is responsible for: `(lower, upper]`.
#[derive(Debug, Clone, Copy)]
struct SliceJob {
    index: i64,
    peer: ChannelPeer,
    lower: i64,
    upper: i64,
    window_start: i64,
    page_size: usize,
    retry: RetryPolicy,
}

#[derive(Debug, Default)]
struct SliceOutcome {
    pages: usize,
    out_of_window: usize,
}

impl HistoryWalker {
    /// Walk with batches of concurrent workers.
    ///
    /// The aggregator moves into a consumer task for the duration of the
    /// walk and comes back with the stats. A `Fatal` failure stops the
    /// remaining workers and aborts the walk once the batch has drained.
    pub async fn walk_fanout(
        &self,
        peer: ChannelPeer,
        aggregator: Aggregator,
        now: i64,
    ) -> Result<(Aggregator, WalkStats)> {
        let settings = &self.settings;
        let workers = settings.workers.max(1);
        let slice = i64::try_from(settings.slice.as_secs())
            .unwrap_or(i64::MAX)
            .max(1);

        let (tx, mut rx) = mpsc::channel::<Vec<Message>>(workers);
        let consumer = tokio::spawn(async move {
            let mut aggregator = aggregator;
            let (mut folded, mut duplicates) = (0, 0);
            while let Some(page) = rx.recv().await {
                for msg in &page {
                    if aggregator.fold(msg) {
                        folded += 1;
                    } else {
                        duplicates += 1;
                    }
                }
            }
            (aggregator, folded, duplicates)
        });

        let (done_tx, done_rx) = watch::channel(false);
        let mut stats = WalkStats::default();
        let mut fatal: Option<Error> = None;
        let mut next_index: i64 = 0;
        let mut reached_start = false;

        while !reached_start && fatal.is_none() {
            let mut batch = JoinSet::new();
            for _ in 0..workers {
                let upper = now.saturating_sub(next_index.saturating_mul(slice));
                if upper <= settings.window_start {
                    reached_start = true;
                    break;
                }
                let lower = upper.saturating_sub(slice).max(settings.window_start);
                let job = SliceJob {
                    index: next_index,
                    peer,
                    lower,
                    upper,
                    window_start: settings.window_start,
                    page_size: settings.page_size,
                    retry: settings.retry,
                };
                next_index += 1;
                batch.spawn(run_slice(
                    Arc::clone(&self.source),
                    job,
                    tx.clone(),
                    done_rx.clone(),
                ));
                if lower <= settings.window_start {
                    reached_start = true;
                    break;
                }
            }

            tracing::debug!(slices = batch.len(), next_index, "Fan-out batch scheduled");

            while let Some(joined) = batch.join_next().await {
                match joined {
                    Ok((_, Ok(outcome))) => {
                        stats.pages += outcome.pages;
                        stats.out_of_window += outcome.out_of_window;
                    }
                    Ok((job, Err(e @ Error::RetriesExhausted { .. }))) => {
                        tracing::warn!(
                            slice = job.index,
                            lower = job.lower,
                            upper = job.upper,
                            "Skipping slice after retries ran out: {}",
                            e
                        );
                        stats.skipped_slices += 1;
                    }
                    Ok((job, Err(e))) => {
                        tracing::error!(slice = job.index, "Fan-out worker failed: {}", e);
                        done_tx.send_replace(true);
                        fatal.get_or_insert(e);
                    }
                    Err(join_err) => {
                        done_tx.send_replace(true);
                        fatal.get_or_insert(Error::Internal(format!(
                            "fan-out worker panicked: {}",
                            join_err
                        )));
                    }
                }
            }
        }

        drop(tx);
        let (aggregator, folded, duplicates) = consumer
            .await
            .map_err(|e| Error::Internal(format!("aggregating task failed: {}", e)))?;

        if let Some(e) = fatal {
            return Err(e);
        }

        stats.folded = folded;
        stats.duplicates = duplicates;
        Ok((aggregator, stats))
    }
}

/// Page backward through one slice, forwarding in-slice messages.
async fn run_slice(
    source: Arc<dyn MessageSource>,
    job: SliceJob,
    tx: mpsc::Sender<Vec<Message>>,
    done: watch::Receiver<bool>,
) -> (SliceJob, Result<SliceOutcome>) {
    let result = page_slice(source.as_ref(), &job, &tx, &done).await;
    (job, result)
}

async fn page_slice(
    source: &dyn MessageSource,
    job: &SliceJob,
    tx: &mpsc::Sender<Vec<Message>>,
    done: &watch::Receiver<bool>,
) -> Result<SliceOutcome> {
    let mut outcome = SliceOutcome::default();
    let mut cursor = Cursor::open(job.upper);
    let mut anchor: Option<i64> = None;

    loop {
        if *done.borrow() {
            tracing::debug!(slice = job.index, "Walk finished elsewhere, worker stopping");
            break;
        }

        let request = HistoryRequest {
            peer: job.peer,
            offset_date: cursor.date,
            offset_id: cursor.id,
            limit: job.page_size,
        };
        let page = fetch_with_retry(source, &request, &job.retry).await?;
        outcome.pages += 1;

        let Some(next) = oldest(&page) else {
            break;
        };

        let mut in_slice = Vec::with_capacity(page.len());
        for msg in strip_anchor(&page, anchor) {
            if msg.date <= job.window_start {
                outcome.out_of_window += 1;
            } else if msg.date > job.lower && msg.date <= job.upper {
                in_slice.push(msg.clone());
            }
        }
        if !in_slice.is_empty() && tx.send(in_slice).await.is_err() {
            return Err(Error::Internal("aggregating task stopped".to_string()));
        }

        if next >= cursor || page.len() < job.page_size || next.date <= job.lower {
            break;
        }
        cursor = next;
        anchor = Some(next.id);
    }

    Ok(outcome)
}
