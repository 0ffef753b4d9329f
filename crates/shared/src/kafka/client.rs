//! rdkafka-backed implementations of the broker seams.

use std::time::Duration;

use futures::StreamExt;
use rdkafka::{
    ClientConfig, Message, Offset, TopicPartitionList,
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::{KafkaError, RDKafkaErrorCode},
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
};

use crate::{
    abstract_trait::{MessageConsumerTrait, MessageProducerTrait},
    domain::{ConsumedMessage, DeliveryReport},
    errors::AppError,
};

impl From<KafkaError> for AppError {
    fn from(err: KafkaError) -> Self {
        match err.rdkafka_error_code() {
            Some(
                RDKafkaErrorCode::MessageTimedOut
                | RDKafkaErrorCode::RequestTimedOut
                | RDKafkaErrorCode::OperationTimedOut,
            ) => AppError::BrokerTimeout(err.to_string()),
            Some(
                RDKafkaErrorCode::MessageSizeTooLarge
                | RDKafkaErrorCode::InvalidMessage
                | RDKafkaErrorCode::InvalidMessageSize,
            ) => AppError::BrokerRejected(err.to_string()),
            _ => AppError::BrokerUnavailable(err.to_string()),
        }
    }
}

pub struct KafkaMessageProducer {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl KafkaMessageProducer {
    /// Idempotent producer: every replica must acknowledge and internal
    /// retries never duplicate a log entry.
    pub fn new(brokers: &str, send_timeout: Duration) -> Result<Self, AppError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| AppError::InvalidConfig(format!("Failed to create Kafka producer: {e}")))?;

        Ok(Self {
            producer,
            send_timeout,
        })
    }
}

#[async_trait::async_trait]
impl MessageProducerTrait for KafkaMessageProducer {
    async fn send(
        &self,
        topic: &str,
        key: &[u8],
        payload: &[u8],
    ) -> Result<DeliveryReport, AppError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        let delivery = self
            .producer
            .send(record, Timeout::After(self.send_timeout))
            .await
            .map_err(|(e, _)| AppError::from(e))?;

        Ok(DeliveryReport {
            topic: topic.to_owned(),
            partition: delivery.partition,
            offset: delivery.offset,
        })
    }

    fn flush(&self, timeout: Duration) -> Result<(), AppError> {
        self.producer.flush(Timeout::After(timeout))?;
        Ok(())
    }
}

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct KafkaMessageConsumer {
    consumer: StreamConsumer,
}

impl KafkaMessageConsumer {
    /// Offsets are only ever committed explicitly.
    pub fn new(brokers: &str, group_id: &str) -> Result<Self, AppError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", group_id)
            .set("bootstrap.servers", brokers)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| AppError::InvalidConfig(format!("Failed to create Kafka consumer: {e}")))?;

        Ok(Self { consumer })
    }
}

#[async_trait::async_trait]
impl MessageConsumerTrait for KafkaMessageConsumer {
    fn subscribe(&self, topic: &str) -> Result<(), AppError> {
        self.consumer.subscribe(&[topic])?;
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<ConsumedMessage>, AppError> {
        let mut stream = self.consumer.stream();
        match tokio::time::timeout(timeout, stream.next()).await {
            Err(_) | Ok(None) => Ok(None),
            Ok(Some(Err(e))) => Err(e.into()),
            Ok(Some(Ok(message))) => Ok(Some(ConsumedMessage {
                topic: message.topic().to_owned(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(<[u8]>::to_vec),
                payload: message.payload().map(<[u8]>::to_vec),
            })),
        }
    }

    fn commit(&self, message: &ConsumedMessage) -> Result<(), AppError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.consumer.commit(&offsets, CommitMode::Sync)?;
        Ok(())
    }

    fn seek(&self, message: &ConsumedMessage) -> Result<(), AppError> {
        self.consumer.seek(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset),
            Timeout::After(SEEK_TIMEOUT),
        )?;
        Ok(())
    }

    fn close(&self) {
        self.consumer.unsubscribe();
    }
}
