//! Run configuration, resolved once at startup from CLI flags and
//! environment variables. Immutable thereafter.

use std::time::Duration;

use clap::Parser;
use rdkafka::ClientConfig;

const KAFKA_ENV_PREFIX: &str = "KAFKA_";

/// Benchmark parameters. Every flag can also be set through the environment
/// variable named in its help text, matching the knobs of the original
/// multi-language benchmark images.
#[derive(Parser, Clone, Debug)]
#[command(name = "kafka-producer-bench", version, about)]
pub struct BenchConfig {
    /// Kafka bootstrap servers
    #[arg(long, env = "KAFKA_BROKERS", default_value = "localhost:9092")]
    pub kafka_brokers: String,

    /// Prefix for generated topic names ("<prefix>_<n>")
    #[arg(long, env = "TOPIC_PREFIX", default_value = "sample")]
    pub topic_prefix: String,

    /// Number of topics written to, round-robin
    #[arg(long, env = "NB_TOPICS", default_value_t = 1)]
    pub nb_topics: usize,

    /// Payload size in bytes
    #[arg(long, env = "MESSAGE_SIZE", default_value_t = 200)]
    pub message_size: usize,

    /// Metrics reporting interval in milliseconds
    #[arg(long, env = "REPORTING_INTERVAL", default_value_t = 1000)]
    pub reporting_interval_ms: u64,

    /// Message budget for the run
    #[arg(long, env = "NB_MESSAGES", default_value_t = 1_000_000)]
    pub nb_messages: u64,

    /// Attach a random high-cardinality key to every record
    #[arg(
        long,
        env = "USE_RANDOM_KEYS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub use_random_keys: bool,

    /// Buffer records per topic and bulk-send every N messages (1 = send
    /// each record immediately)
    #[arg(long, env = "AGG_PER_TOPIC_NB_MESSAGES", default_value_t = 1)]
    pub agg_per_topic_nb_messages: u64,

    /// Partitions per created topic
    #[arg(long, env = "NUMBER_OF_PARTITIONS", default_value_t = 1)]
    pub partitions: i32,

    /// Replication factor for created topics
    #[arg(long, env = "REPLICATION_FACTOR", default_value_t = 1)]
    pub replication_factor: i32,
}

impl BenchConfig {
    /// Destination topic names, in round-robin cycling order.
    pub fn topic_names(&self) -> Vec<String> {
        (0..self.nb_topics)
            .map(|i| format!("{}_{i}", self.topic_prefix))
            .collect()
    }

    pub fn reporting_interval(&self) -> Duration {
        Duration::from_millis(self.reporting_interval_ms)
    }

    /// Assemble the librdkafka client properties: defaults first, then every
    /// `KAFKA_*` environment variable mapped to its dotted property name.
    ///
    /// `statistics.interval.ms` is pinned to the reporting interval so the
    /// client refreshes its counters at the sampling cadence.
    pub fn client_config(&self) -> ClientConfig {
        let mut conf = ClientConfig::new();
        conf.set("bootstrap.servers", &self.kafka_brokers);
        conf.set("acks", "all");
        conf.set(
            "statistics.interval.ms",
            self.reporting_interval_ms.to_string(),
        );
        for (key, value) in kafka_overrides(std::env::vars()) {
            conf.set(key, value);
        }
        conf
    }
}

/// Map `KAFKA_FOO_BAR=x` to librdkafka property `foo.bar=x`.
///
/// `KAFKA_BROKERS` is the CLI shorthand consumed by [`BenchConfig`], not a
/// librdkafka property, and is skipped here.
pub fn kafka_overrides(
    vars: impl Iterator<Item = (String, String)>,
) -> Vec<(String, String)> {
    vars.filter_map(|(name, value)| {
        let key = name.strip_prefix(KAFKA_ENV_PREFIX)?;
        if key == "BROKERS" {
            return None;
        }
        Some((key.to_lowercase().replace('_', "."), value))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_topic_names() {
        let config = BenchConfig::try_parse_from([
            "kafka-producer-bench",
            "--topic-prefix",
            "bench",
            "--nb-topics",
            "3",
        ])
        .unwrap();
        assert_eq!(config.topic_names(), vec!["bench_0", "bench_1", "bench_2"]);
    }

    #[test]
    fn test_defaults() {
        let config = BenchConfig::try_parse_from(["kafka-producer-bench"]).unwrap();
        assert_eq!(config.topic_prefix, "sample");
        assert_eq!(config.nb_topics, 1);
        assert_eq!(config.message_size, 200);
        assert_eq!(config.reporting_interval_ms, 1000);
        assert_eq!(config.nb_messages, 1_000_000);
        assert!(config.use_random_keys);
        assert_eq!(config.agg_per_topic_nb_messages, 1);
    }

    #[test]
    fn test_bool_flag_takes_explicit_value() {
        let config = BenchConfig::try_parse_from([
            "kafka-producer-bench",
            "--use-random-keys",
            "false",
        ])
        .unwrap();
        assert!(!config.use_random_keys);
    }

    #[test]
    fn test_kafka_overrides_mapping() {
        let mapped = kafka_overrides(
            envs(&[
                ("KAFKA_LINGER_MS", "5"),
                ("KAFKA_BATCH_SIZE", "65536"),
                ("KAFKA_BOOTSTRAP_SERVERS", "broker:9092"),
                ("TOPIC_PREFIX", "sample"),
                ("PATH", "/usr/bin"),
            ])
            .into_iter(),
        );
        assert!(mapped.contains(&("linger.ms".to_string(), "5".to_string())));
        assert!(mapped.contains(&("batch.size".to_string(), "65536".to_string())));
        assert!(mapped.contains(&("bootstrap.servers".to_string(), "broker:9092".to_string())));
        assert_eq!(mapped.len(), 3);
    }

    #[test]
    fn test_kafka_overrides_skip_cli_shorthand() {
        let mapped = kafka_overrides(envs(&[("KAFKA_BROKERS", "broker:9092")]).into_iter());
        assert!(mapped.is_empty());
    }
}
