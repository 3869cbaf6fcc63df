//! Kafka producer benchmark.
//!
//! Provisions a set of topics and streams synthetic records into them at
//! sustained volume, round-robin across topics, while a background task
//! samples the client's transport metrics. At the end of a run the producer
//! is flushed and a single REPORT line summarizes totals and elapsed time.
//!
//! ## Components
//!
//! - **Run configuration**: environment-backed CLI, resolved once at startup
//! - **Record pool**: precomputed random keys/payloads, indexed cyclically so
//!   the hot send path never pays randomness-generation cost
//! - **Injector**: the send loop, per-topic batching and the shutdown/report
//!   sequence
//! - **Metrics sampler**: periodic, cancellable task reading the transport's
//!   counters without touching the send path
//!
//! ## Usage
//!
//! ```bash
//! # 10M messages of 512 bytes across 4 topics, reporting every 2s
//! NB_TOPICS=4 NB_MESSAGES=10000000 MESSAGE_SIZE=512 REPORTING_INTERVAL=2000 \
//!   KAFKA_BOOTSTRAP_SERVERS=broker:9092 kafka-producer-bench
//! ```
//!
//! Any `KAFKA_*` environment variable is forwarded to librdkafka with the
//! prefix stripped and underscores mapped to dots (`KAFKA_LINGER_MS=5`
//! becomes `linger.ms=5`).

pub mod config;
pub mod error;
pub mod injector;
pub mod pool;
pub mod stats;
pub mod topics;
pub mod transport;

pub use config::BenchConfig;
pub use error::BenchError;
pub use injector::{BenchReport, Injector};
pub use transport::{KafkaTransport, Transport, TransportSnapshot};
