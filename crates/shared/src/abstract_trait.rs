use std::{sync::Arc, time::Duration};

use crate::{
    domain::{ConsumedMessage, DeliveryReport, Entity, RentalEvent, RentalRecord},
    errors::AppError,
};

#[async_trait::async_trait]
pub trait RepositoryTrait<E: Entity>: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<E>, AppError>;
    async fn find_all(&self) -> Result<Vec<E>, AppError>;
    async fn create(&self, entity: E) -> Result<E, AppError>;
}

/// The one persistence operation the consumer relies on.
#[async_trait::async_trait]
pub trait RentalRecordServiceTrait: Send + Sync {
    async fn create(&self, event: &RentalEvent) -> Result<RentalRecord, AppError>;
}

/// Hands out a fresh service per consumed message.
pub type RentalRecordServiceFactory =
    Arc<dyn Fn() -> Arc<dyn RentalRecordServiceTrait> + Send + Sync>;

/// Raw publish side of a broker connection.
#[async_trait::async_trait]
pub trait MessageProducerTrait: Send + Sync {
    async fn send(
        &self,
        topic: &str,
        key: &[u8],
        payload: &[u8],
    ) -> Result<DeliveryReport, AppError>;
    fn flush(&self, timeout: Duration) -> Result<(), AppError>;
}

/// Raw subscribe side of a broker connection with manual offset commits.
#[async_trait::async_trait]
pub trait MessageConsumerTrait: Send + Sync {
    fn subscribe(&self, topic: &str) -> Result<(), AppError>;
    /// `Ok(None)` when nothing arrived within `timeout`.
    async fn poll(&self, timeout: Duration) -> Result<Option<ConsumedMessage>, AppError>;
    fn commit(&self, message: &ConsumedMessage) -> Result<(), AppError>;
    /// Rewinds the message's partition so the next poll delivers it again.
    fn seek(&self, message: &ConsumedMessage) -> Result<(), AppError>;
    fn close(&self);
}
