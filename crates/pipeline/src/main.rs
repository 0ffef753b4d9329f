use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dashmap::DashMap;
use shared::{
    abstract_trait::RepositoryTrait,
    config::{BrokerArgs, ConsumerConfig, GeneratorArgs, GeneratorConfig, ProducerConfig},
    database::Database,
    domain::ServiceStats,
    errors::AppError,
    generator::RentalEventGenerator,
    kafka::{
        client::{KafkaMessageConsumer, KafkaMessageProducer},
        consumer::RentalEventConsumer,
        producer::RentalEventProducer,
    },
    service::RentalRecordServiceImpl,
    worker::GeneratorWorker,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rental-pipeline", about = "Generates rental events and persists them through Kafka")]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,

    #[command(flatten)]
    broker: BrokerArgs,

    #[command(flatten)]
    generator: GeneratorArgs,
}

#[derive(Debug, Clone, Copy, Default, Subcommand)]
enum Mode {
    /// Only publish generated events
    Generator,
    /// Only consume and persist events
    Consumer,
    /// Run both loops in one process
    #[default]
    All,
}

impl Mode {
    fn runs_generator(self) -> bool {
        matches!(self, Mode::Generator | Mode::All)
    }

    fn runs_consumer(self) -> bool {
        matches!(self, Mode::Consumer | Mode::All)
    }
}

/// Validated configuration for the loops the chosen mode runs.
struct Settings {
    generator: GeneratorConfig,
    producer: Option<ProducerConfig>,
    consumer: Option<ConsumerConfig>,
}

// Generator bounds are always needed: they size the seeded store.
fn settings(cli: &Cli, mode: Mode) -> anyhow::Result<Settings> {
    let generator = cli.generator.build().context("invalid generator settings")?;
    let producer = if mode.runs_generator() {
        Some(cli.broker.producer().context("invalid producer settings")?)
    } else {
        None
    };
    let consumer = if mode.runs_consumer() {
        Some(cli.broker.consumer().context("invalid consumer settings")?)
    } else {
        None
    };
    Ok(Settings {
        generator,
        producer,
        consumer,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mode = cli.mode.unwrap_or_default();
    let Settings {
        generator: generator_config,
        producer: producer_config,
        consumer: consumer_config,
    } = settings(&cli, mode)?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => error!(error = %e, "failed to listen for ctrl-c, shutting down"),
        }
        shutdown.cancel();
    });

    let mut tasks: JoinSet<Result<(), AppError>> = JoinSet::new();

    // Every generated id resolves, so rejections only come from foreign producers.
    let db = Database::seeded(generator_config.max_renter_id, generator_config.max_bike_id);
    let stats = Arc::new(DashMap::<(), ServiceStats>::new());

    if let Some(consumer_config) = consumer_config {
        let client = KafkaMessageConsumer::new(&cli.broker.brokers, &consumer_config.group_id)?;
        let consumer = RentalEventConsumer::new(
            Box::new(client),
            RentalRecordServiceImpl::factory(db.clone(), stats.clone()),
            &consumer_config,
        );
        tasks.spawn(consumer.run(cancel.clone()));
    }

    if let Some(producer_config) = producer_config {
        let client = KafkaMessageProducer::new(&cli.broker.brokers, producer_config.send_timeout)?;
        let producer = RentalEventProducer::new(Arc::new(client), &producer_config);
        let generator = RentalEventGenerator::from_config(generator_config)?;
        let worker = GeneratorWorker::new(generator, producer);
        let token = cancel.clone();
        tasks.spawn(async move {
            worker.run(token).await;
            Ok(())
        });
    }

    info!(?mode, brokers = %cli.broker.brokers, topic = %cli.broker.topic, "rental pipeline started");

    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("pipeline task panicked")? {
            Ok(()) => {}
            Err(e) => {
                error!(error = %e, "pipeline task failed, stopping");
                cancel.cancel();
                if failure.is_none() {
                    failure = Some(e);
                }
            }
        }
    }

    if mode.runs_consumer() {
        let totals = stats.get(&()).map(|s| s.value().clone()).unwrap_or_default();
        let stored = db.rental_records.find_all().await?;
        info!(
            total_operations = totals.total_operations,
            created = totals.create_count,
            rejected = totals.rejected_count,
            stored_records = stored.len(),
            "rental pipeline stopped"
        );
    } else {
        info!("rental pipeline stopped");
    }

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
