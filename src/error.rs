//! Error types for the benchmark.

use thiserror::Error;

/// Errors that can end a benchmark run.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Topic creation error: {0}")]
    TopicCreation(String),

    #[error("Send loop failed: {0}")]
    SendLoop(tokio::task::JoinError),

    /// The sampler task must be joined before the final sample; losing it
    /// means the closing report cannot be trusted.
    #[error("Metrics sampler did not shut down cleanly: {0}")]
    SamplerShutdown(tokio::task::JoinError),
}
