//! Idempotent topic provisioning through the Kafka admin API.

use std::time::Duration;

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use tracing::info;

use crate::error::BenchError;

/// Create every benchmark topic that does not exist yet. A topic that is
/// already present is not an error.
pub async fn provision_topics(
    client_config: &ClientConfig,
    topics: &[String],
    partitions: i32,
    replication_factor: i32,
) -> Result<(), BenchError> {
    let admin_client: AdminClient<DefaultClientContext> = client_config.create()?;

    let new_topics: Vec<NewTopic> = topics
        .iter()
        .map(|name| NewTopic::new(name, partitions, TopicReplication::Fixed(replication_factor)))
        .collect();
    let opts = AdminOptions::new().operation_timeout(Some(Duration::from_secs(10)));

    info!(
        "Creating {} topics with {} partitions and replication factor {}",
        topics.len(),
        partitions,
        replication_factor
    );

    let results = admin_client
        .create_topics(&new_topics, &opts)
        .await
        .map_err(|e| BenchError::TopicCreation(format!("create_topics request failed: {e}")))?;

    for result in results {
        match result {
            Ok(topic_name) => {
                info!("Topic '{topic_name}' created successfully");
            }
            Err((topic_name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                info!("Topic '{topic_name}' already exists");
            }
            Err((topic_name, err)) => {
                return Err(BenchError::TopicCreation(format!(
                    "failed to create topic {topic_name}: {err}"
                )));
            }
        }
    }

    Ok(())
}
