//! Periodic sampling of the transport's client-side metrics.
//!
//! The sampler runs independently of the send loop and only ever reads the
//! transport. Cumulative counters are turned into per-interval rates by
//! diffing against the previous sample, the same arithmetic the reference
//! benchmark applies to librdkafka statistics.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::transport::{Transport, TransportSnapshot};

/// Rates derived from two consecutive snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SampleRates {
    pub send_rate: f64,
    pub request_rate: f64,
    pub records_per_request: f64,
}

/// Turns cumulative transport counters into rates and logs one formatted
/// line per sample. The previous snapshot is kept as checkpoint.
#[derive(Debug, Default)]
pub struct MetricsSampler {
    checkpoint: TransportSnapshot,
}

impl MetricsSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one sample: read the transport, log the metric line, advance the
    /// checkpoint. Returns the snapshot that was read.
    pub fn sample<T: Transport + ?Sized>(&mut self, transport: &T) -> TransportSnapshot {
        let snapshot = transport.snapshot();
        let rates = self.rates(&snapshot);
        self.checkpoint = snapshot;
        info!(
            "Sent rate = {:.2}/sec, duration spent in queue = {:.2}ms, batch size = {:.2}, \
             request rate = {:.2}/sec, request latency avg = {:.2}ms, \
             records per ProduceRequest = {:.2}",
            rates.send_rate,
            snapshot.queue_time_avg_ms,
            snapshot.batch_size_avg,
            rates.request_rate,
            snapshot.request_latency_avg_ms,
            rates.records_per_request,
        );
        snapshot
    }

    /// Rates for `snapshot` relative to the current checkpoint. With no
    /// elapsed time yet, cumulative totals stand in for the rates.
    pub fn rates(&self, snapshot: &TransportSnapshot) -> SampleRates {
        let elapsed_secs = (snapshot.ts_secs - self.checkpoint.ts_secs).max(0);
        let send_rate = if elapsed_secs > 0 {
            (snapshot.records_sent - self.checkpoint.records_sent) as f64 / elapsed_secs as f64
        } else {
            snapshot.records_sent as f64
        };
        let request_rate = if elapsed_secs > 0 {
            (snapshot.produce_requests - self.checkpoint.produce_requests) as f64
                / elapsed_secs as f64
        } else {
            snapshot.produce_requests as f64
        };
        let records_per_request = if send_rate > 0.0 && request_rate > 0.0 {
            send_rate / request_rate
        } else {
            0.0
        };
        SampleRates {
            send_rate,
            request_rate,
            records_per_request,
        }
    }
}

/// Spawn the periodic sampler task. The first sample fires immediately.
///
/// On cancellation the task returns its sampler so the caller can take the
/// mandatory post-stop final sample against the same checkpoint; awaiting
/// the handle before that sample guarantees the two never overlap.
pub fn spawn_sampler<T: Transport>(
    transport: Arc<T>,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<MetricsSampler> {
    tokio::spawn(async move {
        let mut sampler = MetricsSampler::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return sampler,
                _ = ticker.tick() => {
                    sampler.sample(transport.as_ref());
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::sync::atomic::Ordering;

    fn snapshot(ts_secs: i64, records_sent: i64, produce_requests: i64) -> TransportSnapshot {
        TransportSnapshot {
            ts_secs,
            records_sent,
            produce_requests,
            ..Default::default()
        }
    }

    #[test]
    fn test_rates_are_deltas_over_elapsed_seconds() {
        let transport = MockTransport::default();
        let mut sampler = MetricsSampler::new();

        transport.set_snapshot(snapshot(10, 1000, 10));
        sampler.sample(&transport);

        transport.set_snapshot(snapshot(12, 5000, 30));
        let rates = sampler.rates(&transport.snapshot());
        assert_eq!(rates.send_rate, 2000.0);
        assert_eq!(rates.request_rate, 10.0);
        assert_eq!(rates.records_per_request, 200.0);
    }

    #[test]
    fn test_first_sample_falls_back_to_cumulative_totals() {
        let sampler = MetricsSampler::new();
        let rates = sampler.rates(&snapshot(0, 500, 5));
        assert_eq!(rates.send_rate, 500.0);
        assert_eq!(rates.request_rate, 5.0);
    }

    #[test]
    fn test_zero_traffic_yields_zero_records_per_request() {
        let sampler = MetricsSampler::new();
        let rates = sampler.rates(&snapshot(5, 0, 0));
        assert_eq!(rates.records_per_request, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_cadence_and_single_final_sample() {
        let transport = Arc::new(MockTransport::default());
        let token = CancellationToken::new();
        let handle = spawn_sampler(Arc::clone(&transport), Duration::from_secs(1), token.clone());

        // First fire is immediate, then one per interval: 0, 1000, 2000, 3000.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(transport.snapshot_calls.load(Ordering::SeqCst), 4);

        token.cancel();
        let mut sampler = handle.await.expect("sampler task panicked");
        sampler.sample(transport.as_ref());
        assert_eq!(transport.snapshot_calls.load(Ordering::SeqCst), 5);
    }
}
