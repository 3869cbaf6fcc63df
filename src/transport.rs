//! Transport seam between the injection engine and the Kafka client.
//!
//! The engine only ever sees the [`Transport`] trait: a non-blocking
//! `submit`, a blocking `flush`, and a read-only `snapshot` of the client's
//! counters. [`KafkaTransport`] implements it over librdkafka's threaded
//! producer; tests drive the engine through an in-memory mock instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{DeliveryResult, Message};
use rdkafka::producer::{BaseRecord, Producer, ProducerContext, ThreadedProducer};
use rdkafka::statistics::Statistics;
use rdkafka::util::Timeout;
use rdkafka::{ClientConfig, ClientContext};
use tracing::{error, warn};

use crate::error::BenchError;

/// Instantaneous view of the transport's internal counters.
///
/// Cumulative counters (`records_sent`, `produce_requests`) are monotonic;
/// the averages are windowed values maintained by the client itself.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransportSnapshot {
    /// Client-side timestamp of the snapshot, in seconds.
    pub ts_secs: i64,
    /// Cumulative records handed to the wire.
    pub records_sent: i64,
    /// Cumulative ProduceRequests issued.
    pub produce_requests: i64,
    /// Average time a record spends in the local queue, milliseconds.
    pub queue_time_avg_ms: f64,
    /// Average wire batch size, bytes.
    pub batch_size_avg: f64,
    /// Average broker round-trip latency, milliseconds.
    pub request_latency_avg_ms: f64,
}

/// Handle shared between the send loop (writer) and the metrics sampler
/// (read-only consumer).
pub trait Transport: Send + Sync + 'static {
    /// Enqueue one record. Non-blocking; the delivery outcome arrives later
    /// through the client's background callback path and is logged there.
    fn submit(&self, destination: &str, key: Option<&str>, payload: &str);

    /// Block until every previously submitted record is acknowledged or
    /// failed. No timeout: a broker that never acknowledges hangs shutdown,
    /// which is acceptable for a benchmark harness.
    fn flush(&self) -> Result<(), BenchError>;

    /// Latest counters. Cheap and safe to call concurrently with `submit`.
    fn snapshot(&self) -> TransportSnapshot;

    /// Records that failed to send so far, whether rejected at enqueue or
    /// reported failed on delivery.
    fn send_failures(&self) -> u64;
}

/// Producer context: logs failed deliveries and caches the latest
/// statistics blob, reduced to a [`TransportSnapshot`].
#[derive(Default)]
struct BenchContext {
    latest: Mutex<TransportSnapshot>,
    failures: AtomicU64,
}

impl ClientContext for BenchContext {
    fn stats(&self, statistics: Statistics) {
        let snapshot = reduce_statistics(&statistics);
        *self.latest.lock().unwrap() = snapshot;
    }
}

impl ProducerContext for BenchContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _: Self::DeliveryOpaque) {
        if let Err((err, message)) = result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            let key = message.key().map(String::from_utf8_lossy);
            error!(
                topic = message.topic(),
                key = key.as_deref(),
                "failed sending: {err}"
            );
        }
    }
}

/// Reduce a librdkafka statistics blob to the counters the sampler needs.
///
/// Topic and broker averages are averaged across their maps; the Produce
/// request count is summed across brokers. Timestamps and latencies come in
/// microseconds.
fn reduce_statistics(stats: &Statistics) -> TransportSnapshot {
    let batch_size_avg = if stats.topics.is_empty() {
        0.0
    } else {
        let total: i64 = stats.topics.values().map(|t| t.batchsize.avg).sum();
        total as f64 / stats.topics.len() as f64
    };

    let nb_brokers = stats.brokers.len();
    let (queue_time_avg_ms, request_latency_avg_ms, produce_requests) = if nb_brokers == 0 {
        (0.0, 0.0, 0)
    } else {
        let queue: i64 = stats
            .brokers
            .values()
            .map(|b| b.int_latency.as_ref().map(|w| w.avg).unwrap_or(0))
            .sum();
        let rtt: i64 = stats
            .brokers
            .values()
            .map(|b| b.rtt.as_ref().map(|w| w.avg).unwrap_or(0))
            .sum();
        let produce: i64 = stats
            .brokers
            .values()
            .map(|b| b.req.get("Produce").copied().unwrap_or(0))
            .sum();
        (
            queue as f64 / nb_brokers as f64 / 1000.0,
            rtt as f64 / nb_brokers as f64 / 1000.0,
            produce,
        )
    };

    TransportSnapshot {
        ts_secs: stats.ts / 1_000_000,
        records_sent: stats.txmsgs,
        produce_requests,
        queue_time_avg_ms,
        batch_size_avg,
        request_latency_avg_ms,
    }
}

/// Kafka-backed transport. The threaded producer polls delivery and
/// statistics callbacks on its own background thread, so `submit` is a pure
/// enqueue.
pub struct KafkaTransport {
    producer: ThreadedProducer<BenchContext>,
}

impl KafkaTransport {
    pub fn new(client_config: &ClientConfig) -> Result<Self, BenchError> {
        let producer = client_config.create_with_context(BenchContext::default())?;
        Ok(KafkaTransport { producer })
    }

    fn context(&self) -> &BenchContext {
        self.producer.context()
    }
}

impl Transport for KafkaTransport {
    fn submit(&self, destination: &str, key: Option<&str>, payload: &str) {
        let mut record: BaseRecord<'_, str, str> =
            BaseRecord::to(destination).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }
        loop {
            match self.producer.send(record) {
                Ok(()) => return,
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), rejected)) => {
                    // Local queue is full: give the poller thread room to
                    // drain, then re-enqueue the same record.
                    warn!("producer queue full, backing off");
                    std::thread::sleep(Duration::from_millis(100));
                    record = rejected;
                }
                Err((err, _)) => {
                    self.context().failures.fetch_add(1, Ordering::Relaxed);
                    error!(topic = destination, "could not enqueue record: {err}");
                    return;
                }
            }
        }
    }

    fn flush(&self) -> Result<(), BenchError> {
        self.producer.flush(Timeout::Never)?;
        Ok(())
    }

    fn snapshot(&self) -> TransportSnapshot {
        *self.context().latest.lock().unwrap()
    }

    fn send_failures(&self) -> u64 {
        self.context().failures.load(Ordering::Relaxed)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::statistics::{Broker, Topic, Window};
    use std::collections::HashMap;

    fn window(avg: i64) -> Window {
        Window {
            avg,
            ..Default::default()
        }
    }

    fn statistics(
        ts_micros: i64,
        txmsgs: i64,
        brokers: Vec<(i64, i64, i64)>,
        batch_avgs: Vec<i64>,
    ) -> Statistics {
        let mut stats = Statistics::default();
        stats.ts = ts_micros;
        stats.txmsgs = txmsgs;
        stats.brokers = brokers
            .into_iter()
            .enumerate()
            .map(|(i, (int_latency, rtt, produce))| {
                let mut broker = Broker::default();
                broker.int_latency = Some(window(int_latency));
                broker.rtt = Some(window(rtt));
                broker.req = HashMap::from([("Produce".to_string(), produce)]);
                (format!("broker-{i}"), broker)
            })
            .collect();
        stats.topics = batch_avgs
            .into_iter()
            .enumerate()
            .map(|(i, avg)| {
                let mut topic = Topic::default();
                topic.batchsize = window(avg);
                (format!("topic-{i}"), topic)
            })
            .collect();
        stats
    }

    #[test]
    fn test_reduce_statistics_averages_across_brokers_and_topics() {
        let stats = statistics(
            5_000_000,
            1234,
            vec![(2_000, 10_000, 40), (4_000, 20_000, 60)],
            vec![100, 300],
        );
        let snapshot = reduce_statistics(&stats);
        assert_eq!(snapshot.ts_secs, 5);
        assert_eq!(snapshot.records_sent, 1234);
        assert_eq!(snapshot.produce_requests, 100);
        assert_eq!(snapshot.queue_time_avg_ms, 3.0);
        assert_eq!(snapshot.request_latency_avg_ms, 15.0);
        assert_eq!(snapshot.batch_size_avg, 200.0);
    }

    #[test]
    fn test_reduce_statistics_with_no_brokers_yet() {
        let stats = statistics(1_000_000, 0, vec![], vec![]);
        let snapshot = reduce_statistics(&stats);
        assert_eq!(snapshot, TransportSnapshot {
            ts_secs: 1,
            ..Default::default()
        });
    }
}
