use std::sync::Arc;

use clap::Parser;
use kafka_producer_bench::config::BenchConfig;
use kafka_producer_bench::injector::Injector;
use kafka_producer_bench::topics::provision_topics;
use kafka_producer_bench::transport::KafkaTransport;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run_main().await {
        Ok(_) => info!("Benchmark finished successfully"),
        Err(e) => {
            eprintln!("Error: {e:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<()> {
    let config = BenchConfig::parse();
    let client_config = config.client_config();

    provision_topics(
        &client_config,
        &config.topic_names(),
        config.partitions,
        config.replication_factor,
    )
    .await?;

    let transport = Arc::new(KafkaTransport::new(&client_config)?);
    let injector = Injector::new(&config, transport)?;
    let report = injector.run().await?;

    info!(
        "Submitted {} records ({} send failures)",
        report.records_submitted, report.send_failures
    );
    Ok(())
}
