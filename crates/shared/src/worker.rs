use std::{
    sync::atomic::{AtomicI32, Ordering},
    time::Duration,
};

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    errors::AppError, generator::RentalEventGenerator, kafka::producer::RentalEventProducer,
};

/// Periodically generates a batch of rental events and publishes it.
///
/// Events of one batch are published one after another, each under the next
/// value of a per-process sequence that starts at 1. The sequence restarts
/// with the process and is only meant for partitioning and log tracing.
pub struct GeneratorWorker<R: Rng> {
    generator: RentalEventGenerator<R>,
    producer: RentalEventProducer,
    interval: Duration,
    batch_size: usize,
    sequence: AtomicI32,
}

impl<R: Rng> GeneratorWorker<R> {
    pub fn new(generator: RentalEventGenerator<R>, producer: RentalEventProducer) -> Self {
        let interval = generator.config().interval;
        let batch_size = generator.config().batch_size;
        Self {
            generator,
            producer,
            interval,
            batch_size,
            sequence: AtomicI32::new(0),
        }
    }

    fn next_key(&self) -> i32 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Runs cycles until `cancel` fires. Failed cycles are logged and the
    /// worker carries on after the usual pause.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            max_renter_id = self.generator.config().max_renter_id,
            max_bike_id = self.generator.config().max_bike_id,
            topic = self.producer.topic(),
            "starting rental event generator"
        );

        while !cancel.is_cancelled() {
            match self.run_cycle(&cancel).await {
                Ok(_) => {}
                Err(e) if e.is_cancelled() => {
                    info!("rental event generation cancelled");
                    break;
                }
                Err(e) => error!(error = %e, "failed to generate or publish rental events"),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("wait for next generation cycle cancelled");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        if let Err(e) = self.producer.close().await {
            warn!(error = %e, "failed to flush pending messages on shutdown");
        }
        info!("rental event generator stopped");
    }

    /// Generates one batch and publishes it in order, returning how many
    /// events were delivered.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<usize, AppError> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let events = self.generator.generate(self.batch_size);
        info!(count = events.len(), "generated rental events");

        for event in &events {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let key = self.next_key();
            info!(
                key,
                renter_id = event.renter_id(),
                bike_id = event.bike_id(),
                start_time = %event.start_time(),
                duration_hours = event.duration().num_hours(),
                "publishing rental event"
            );
            self.producer.publish(key, event, cancel).await?;
        }

        Ok(events.len())
    }
}
