use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    abstract_trait::{MessageConsumerTrait, RentalRecordServiceFactory},
    codec::{Codec, JsonCodec},
    config::ConsumerConfig,
    domain::{ConsumedMessage, RentalEvent},
    errors::{AppError, ErrorKind},
    retry::RetryPolicy,
};

/// What happened to one polled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Persisted; offset committed.
    Stored,
    /// Permanently unprocessable; logged as dead letter and committed.
    Dropped,
    /// Left uncommitted; the partition is rewound so the next poll
    /// delivers it again.
    Retained,
    /// Empty payload; nothing to persist.
    Skipped,
    Cancelled,
}

/// Unsubscribes and closes the client on every exit path of the loop.
struct SubscriptionGuard<'a> {
    client: &'a dyn MessageConsumerTrait,
    topic: &'a str,
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        self.client.close();
        info!(topic = self.topic, "Kafka consumer stopped");
    }
}

/// Consumes rental events into the store with at-least-once semantics.
///
/// An offset is committed only after the service accepted the event, or
/// after the event was found to be permanently unprocessable and written to
/// the `dead_letter` log. Any other failure rewinds the partition to the
/// failed offset.
pub struct RentalEventConsumer {
    client: Box<dyn MessageConsumerTrait>,
    services: RentalRecordServiceFactory,
    topic: String,
    retry: RetryPolicy,
    poll_timeout: Duration,
}

impl RentalEventConsumer {
    pub fn new(
        client: Box<dyn MessageConsumerTrait>,
        services: RentalRecordServiceFactory,
        config: &ConsumerConfig,
    ) -> Self {
        Self {
            client,
            services,
            topic: config.topic.clone(),
            retry: RetryPolicy::new(config.retry_count, config.retry_base_delay),
            poll_timeout: config.poll_timeout,
        }
    }

    /// Runs until `cancel` fires or subscribing fails for good.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), AppError> {
        info!(topic = %self.topic, "starting Kafka consumer");
        let _guard = SubscriptionGuard {
            client: self.client.as_ref(),
            topic: &self.topic,
        };

        let subscribed = self
            .retry
            .run(&cancel, "Kafka subscribe", |_| async {
                self.client.subscribe(&self.topic)
            })
            .await;
        match subscribed {
            Ok(()) => info!(topic = %self.topic, "subscribed to topic"),
            Err(e) if e.is_cancelled() => {
                info!("Kafka consumer cancelled before subscribing");
                return Ok(());
            }
            Err(e) => {
                error!(topic = %self.topic, error = %e, "failed to subscribe to topic");
                return Err(e);
            }
        }

        while !cancel.is_cancelled() {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = self.client.poll(self.poll_timeout) => polled,
            };

            let message = match polled {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "failed to poll message from Kafka");
                    if !self.pause(&cancel).await {
                        break;
                    }
                    continue;
                }
            };

            match self.process(&message, &cancel).await {
                Disposition::Cancelled => {
                    info!(
                        offset = message.offset,
                        "shutdown requested while processing, offset left uncommitted"
                    );
                    break;
                }
                Disposition::Retained => {
                    if !self.pause(&cancel).await {
                        break;
                    }
                }
                Disposition::Stored | Disposition::Dropped | Disposition::Skipped => {}
            }
        }

        info!("Kafka consumer received shutdown request");
        Ok(())
    }

    /// Handles one message and commits its offset when the outcome allows it.
    pub async fn process(
        &self,
        message: &ConsumedMessage,
        cancel: &CancellationToken,
    ) -> Disposition {
        let disposition = self.handle(message, cancel).await;
        match disposition {
            Disposition::Stored | Disposition::Dropped => {
                if let Err(e) = self.client.commit(message) {
                    error!(
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "failed to commit offset"
                    );
                }
            }
            // A later commit on this partition would cover the offset, so
            // rewind before anything else is consumed.
            Disposition::Retained => {
                if let Err(e) = self.client.seek(message) {
                    error!(
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "failed to rewind to uncommitted offset"
                    );
                }
            }
            Disposition::Skipped | Disposition::Cancelled => {}
        }
        disposition
    }

    /// Waits one poll interval. Returns `false` when `cancel` fired first.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.poll_timeout) => true,
        }
    }

    async fn handle(&self, message: &ConsumedMessage, cancel: &CancellationToken) -> Disposition {
        let key = JsonCodec::decode::<i32>(message.key.as_deref()).ok().flatten();
        let event = match JsonCodec::decode::<RentalEvent>(message.payload.as_deref()) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(offset = message.offset, "skipping message without payload");
                return Disposition::Skipped;
            }
            Err(e) => {
                dead_letter(message, key, &e);
                return Disposition::Dropped;
            }
        };

        info!(
            key = ?key,
            renter_id = event.renter_id(),
            bike_id = event.bike_id(),
            "received rental event"
        );

        let service = (self.services)();
        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Disposition::Cancelled,
            created = service.create(&event) => created,
        };

        match created {
            Ok(record) => {
                info!(
                    id = record.id,
                    renter_id = record.renter_id,
                    bike_id = record.bike_id,
                    "rental record created"
                );
                Disposition::Stored
            }
            Err(e) => match e.kind() {
                ErrorKind::Permanent => {
                    dead_letter(message, key, &e);
                    Disposition::Dropped
                }
                ErrorKind::Cancelled => Disposition::Cancelled,
                ErrorKind::Transient | ErrorKind::Unexpected => {
                    error!(
                        offset = message.offset,
                        key = ?key,
                        error = %e,
                        "failed to create rental record, leaving offset uncommitted"
                    );
                    Disposition::Retained
                }
            },
        }
    }
}

fn dead_letter(message: &ConsumedMessage, key: Option<i32>, reason: &AppError) {
    warn!(
        target: "dead_letter",
        topic = %message.topic,
        partition = message.partition,
        offset = message.offset,
        key = ?key,
        payload = %String::from_utf8_lossy(message.payload.as_deref().unwrap_or_default()),
        reason = %reason,
        "dropping unprocessable rental event"
    );
}
