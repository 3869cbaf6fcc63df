//! The injection engine: owns the synthetic record pool, the send loop, the
//! metrics sampler and the shutdown/report sequence.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::pool::{RecordPool, POOL_ENTRIES_PER_DESTINATION};
use crate::stats::spawn_sampler;
use crate::transport::Transport;

/// Outcome of a completed run. The cumulative counters come from the
/// transport's own metrics, not from the send loop.
#[derive(Debug, Clone)]
pub struct BenchReport {
    /// Records pushed through the transport by the send loop.
    pub records_submitted: u64,
    /// Records the client reported sent.
    pub records_sent: i64,
    /// ProduceRequests the client issued.
    pub produce_requests: i64,
    /// Records that failed to send (rejected at enqueue or failed delivery).
    pub send_failures: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Streams pool records into the destination topics, round-robin, until the
/// message budget is exhausted, then flushes and reports.
#[derive(Debug)]
pub struct Injector<T: Transport> {
    transport: Arc<T>,
    topics: Vec<String>,
    pool: RecordPool,
    message_budget: u64,
    batch_width: u64,
    message_size: usize,
    random_keys: bool,
    reporting_interval: Duration,
}

impl<T: Transport> Injector<T> {
    /// Destination cycling and pool indexing both divide by the topic
    /// count, so an empty destination set is rejected here.
    pub fn new(config: &BenchConfig, transport: Arc<T>) -> Result<Self, BenchError> {
        let topics = config.topic_names();
        if topics.is_empty() {
            return Err(BenchError::Config(
                "at least one topic is required (NB_TOPICS >= 1)".to_string(),
            ));
        }
        let pool = RecordPool::build(
            topics.len() * POOL_ENTRIES_PER_DESTINATION,
            config.message_size,
            config.use_random_keys,
        );
        Ok(Injector {
            transport,
            topics,
            pool,
            message_budget: config.nb_messages,
            batch_width: config.agg_per_topic_nb_messages,
            message_size: config.message_size,
            random_keys: config.use_random_keys,
            reporting_interval: config.reporting_interval(),
        })
    }

    /// The synthetic record pool backing this run.
    pub fn pool(&self) -> &RecordPool {
        &self.pool
    }

    /// Run the benchmark to completion: stream records, block until the
    /// transport has acknowledged everything, then stop the sampler, take
    /// the closing sample and log the final report.
    pub async fn run(self) -> Result<BenchReport, BenchError> {
        info!(
            "Running benchmark with {} topics {} messages of {} bytes each with random keys={}",
            self.topics.len(),
            self.message_budget,
            self.message_size,
            self.random_keys,
        );
        if self.batch_width > 1 {
            info!(
                "Will use grouping per topic and bulk send every {} messages",
                self.batch_width
            );
        }

        let token = CancellationToken::new();
        let sampler_task = spawn_sampler(
            Arc::clone(&self.transport),
            self.reporting_interval,
            token.clone(),
        );
        let started = Instant::now();

        let transport = Arc::clone(&self.transport);
        let loop_outcome = tokio::task::spawn_blocking(move || self.drive()).await;

        // Stop the periodic task before the closing sample so the two can
        // never overlap, whether or not the loop succeeded.
        token.cancel();
        let mut sampler = sampler_task.await.map_err(BenchError::SamplerShutdown)?;
        let records_submitted = loop_outcome.map_err(BenchError::SendLoop)??;
        let snapshot = sampler.sample(transport.as_ref());

        let elapsed = started.elapsed();
        let report = BenchReport {
            records_submitted,
            records_sent: snapshot.records_sent,
            produce_requests: snapshot.produce_requests,
            send_failures: transport.send_failures(),
            elapsed,
        };
        info!(
            "REPORT: Produced {} with {} ProduceRequest in {}",
            report.records_sent,
            report.produce_requests,
            format_duration_hms(elapsed),
        );
        if report.send_failures > 0 {
            warn!("{} records failed to send during the run", report.send_failures);
        }
        Ok(report)
    }

    /// The send loop. Runs on a blocking thread; the sampler reads the
    /// transport concurrently but never touches the pending buffers.
    fn drive(&self) -> Result<u64, BenchError> {
        let nb_topics = self.topics.len() as u64;
        // Pool counters buffered per destination ordinal, cleared on each
        // flush rather than reallocated.
        let mut pending: Vec<Vec<u64>> = vec![Vec::new(); self.topics.len()];
        let mut total_msgs: u64 = 0;

        // Inclusive bound: budget + 1 records, matching the reference
        // benchmark numbers.
        while total_msgs <= self.message_budget {
            let ordinal = (total_msgs % nb_topics) as usize;
            if self.batch_width <= 1 {
                let (key, payload) = self.pool.entry(total_msgs);
                self.transport.submit(&self.topics[ordinal], key, payload);
            } else {
                pending[ordinal].push(total_msgs);
                if total_msgs % self.batch_width == 0 {
                    self.submit_pending(&mut pending);
                }
            }
            total_msgs += 1;
        }

        // Records buffered past the last width boundary still go out.
        self.submit_pending(&mut pending);
        self.transport.flush()?;
        Ok(total_msgs)
    }

    /// Submit everything buffered, destination order first, insertion order
    /// within a destination, then clear the buffers.
    fn submit_pending(&self, pending: &mut [Vec<u64>]) {
        for (ordinal, counters) in pending.iter_mut().enumerate() {
            for &n in counters.iter() {
                let (key, payload) = self.pool.entry(n);
                self.transport.submit(&self.topics[ordinal], key, payload);
            }
            counters.clear();
        }
    }
}

/// hours:minutes:seconds.millis, e.g. "00:01:23.456".
fn format_duration_hms(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    let ms = total_ms % 1000;
    let secs = (total_ms / 1000) % 60;
    let mins = (total_ms / 60_000) % 60;
    let hours = total_ms / 3_600_000;
    format!("{hours:02}:{mins:02}:{secs:02}.{ms:03}")
}
