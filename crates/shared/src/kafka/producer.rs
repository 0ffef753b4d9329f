use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    abstract_trait::MessageProducerTrait,
    codec::{Codec, JsonCodec},
    config::ProducerConfig,
    domain::{DeliveryReport, RentalEvent},
    errors::AppError,
    retry::RetryPolicy,
};

/// Publishes rental events to one topic, retrying transient broker failures.
///
/// [`close`](Self::close) flushes whatever the client still buffers on the
/// blocking pool. A producer dropped without being closed flushes inline,
/// bounded by the configured flush timeout.
pub struct RentalEventProducer {
    client: Arc<dyn MessageProducerTrait>,
    topic: String,
    retry: RetryPolicy,
    flush_timeout: Duration,
    flushed: bool,
}

impl RentalEventProducer {
    pub fn new(client: Arc<dyn MessageProducerTrait>, config: &ProducerConfig) -> Self {
        Self {
            client,
            topic: config.topic.clone(),
            retry: RetryPolicy::new(config.retry_count, config.retry_base_delay),
            flush_timeout: config.flush_timeout,
            flushed: false,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish(
        &self,
        key: i32,
        event: &RentalEvent,
        cancel: &CancellationToken,
    ) -> Result<DeliveryReport, AppError> {
        let key_bytes = JsonCodec::encode(Some(&key))?;
        let payload = JsonCodec::encode(Some(event))?;

        let result = self
            .retry
            .run(cancel, "Kafka send", |_| {
                self.client.send(&self.topic, &key_bytes, &payload)
            })
            .await;

        match &result {
            Ok(report) => info!(
                topic = %report.topic,
                partition = report.partition,
                offset = report.offset,
                key,
                "rental event delivered"
            ),
            Err(AppError::Cancelled) => info!(
                key,
                renter_id = event.renter_id(),
                bike_id = event.bike_id(),
                "rental event send cancelled"
            ),
            Err(e) => error!(
                topic = %self.topic,
                key,
                error = %e,
                "failed to deliver rental event"
            ),
        }
        result
    }

    /// Flushes pending messages without blocking the async runtime.
    pub async fn close(&mut self) -> Result<(), AppError> {
        self.flushed = true;
        let client = self.client.clone();
        let timeout = self.flush_timeout;
        tokio::task::spawn_blocking(move || client.flush(timeout))
            .await
            .map_err(|e| AppError::Internal(format!("flush task failed: {e}")))??;
        info!(topic = %self.topic, "producer flushed");
        Ok(())
    }
}

impl Drop for RentalEventProducer {
    fn drop(&mut self) {
        if self.flushed {
            return;
        }
        if let Err(e) = self.client.flush(self.flush_timeout) {
            warn!(error = %e, "failed to flush pending messages on shutdown");
        }
    }
}
