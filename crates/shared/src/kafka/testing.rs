//! Scripted broker clients for exercising the loops without Kafka.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio_util::sync::CancellationToken;

use crate::{
    abstract_trait::{
        MessageConsumerTrait, MessageProducerTrait, RentalRecordServiceFactory,
        RentalRecordServiceTrait,
    },
    codec::{Codec, JsonCodec},
    domain::{ConsumedMessage, DeliveryReport, RentalEvent, RentalRecord},
    errors::AppError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub topic: String,
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
}

#[derive(Default)]
pub struct ProducerState {
    sent: Mutex<Vec<SentMessage>>,
    failures: Mutex<VecDeque<AppError>>,
    always_fail: AtomicBool,
    attempts: AtomicUsize,
    flushes: AtomicUsize,
}

/// Accepts every send unless told to fail; clones share state.
#[derive(Clone, Default)]
pub struct StubProducer(Arc<ProducerState>);

impl StubProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next sends with `errors`, in order, then accepts.
    pub fn failing_with(errors: Vec<AppError>) -> Self {
        let stub = Self::new();
        *stub.0.failures.lock().unwrap() = errors.into();
        stub
    }

    pub fn always_unavailable() -> Self {
        let stub = Self::new();
        stub.0.always_fail.store(true, Ordering::SeqCst);
        stub
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.0.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.0.attempts.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.0.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MessageProducerTrait for StubProducer {
    async fn send(
        &self,
        topic: &str,
        key: &[u8],
        payload: &[u8],
    ) -> Result<DeliveryReport, AppError> {
        self.0.attempts.fetch_add(1, Ordering::SeqCst);
        if self.0.always_fail.load(Ordering::SeqCst) {
            return Err(AppError::BrokerUnavailable("stub broker down".to_string()));
        }
        if let Some(err) = self.0.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut sent = self.0.sent.lock().unwrap();
        sent.push(SentMessage {
            topic: topic.to_string(),
            key: key.to_vec(),
            payload: payload.to_vec(),
        });
        Ok(DeliveryReport {
            topic: topic.to_string(),
            partition: 0,
            offset: sent.len() as i64 - 1,
        })
    }

    fn flush(&self, _timeout: Duration) -> Result<(), AppError> {
        self.0.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct ConsumerState {
    queue: Mutex<VecDeque<ConsumedMessage>>,
    subscribe_failures: AtomicUsize,
    poll_failures: AtomicUsize,
    cancel_when_drained: Mutex<Option<CancellationToken>>,
    log: Mutex<Vec<String>>,
}

/// Delivers a fixed queue of messages and records every broker call.
///
/// Like a real partition, a delivered message only comes back after a seek.
#[derive(Clone, Default)]
pub struct ScriptedConsumer(Arc<ConsumerState>);

impl ScriptedConsumer {
    pub fn new(messages: Vec<ConsumedMessage>) -> Self {
        let stub = Self::default();
        *stub.0.queue.lock().unwrap() = messages.into();
        stub
    }

    pub fn failing_subscribes(self, count: usize) -> Self {
        self.0.subscribe_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_polls(self, count: usize) -> Self {
        self.0.poll_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Cancels `token` once every message has been handed out.
    pub fn cancel_when_drained(self, token: CancellationToken) -> Self {
        *self.0.cancel_when_drained.lock().unwrap() = Some(token);
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.0.log.lock().unwrap().clone()
    }

    pub fn commits(&self) -> Vec<i64> {
        self.log()
            .iter()
            .filter_map(|entry| entry.strip_prefix("commit:"))
            .filter_map(|offset| offset.parse().ok())
            .collect()
    }

    fn record(&self, entry: String) {
        self.0.log.lock().unwrap().push(entry);
    }

    pub fn seeks(&self) -> Vec<i64> {
        self.log()
            .iter()
            .filter_map(|entry| entry.strip_prefix("seek:"))
            .filter_map(|offset| offset.parse().ok())
            .collect()
    }
}

#[async_trait::async_trait]
impl MessageConsumerTrait for ScriptedConsumer {
    fn subscribe(&self, topic: &str) -> Result<(), AppError> {
        self.record(format!("subscribe:{topic}"));
        let remaining = self.0.subscribe_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.0.subscribe_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::BrokerUnavailable("stub broker down".to_string()));
        }
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<ConsumedMessage>, AppError> {
        let remaining = self.0.poll_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.0.poll_failures.store(remaining - 1, Ordering::SeqCst);
            self.record("poll-error".to_string());
            return Err(AppError::BrokerTimeout("stub poll failed".to_string()));
        }

        let next = self.0.queue.lock().unwrap().pop_front();
        if let Some(message) = next {
            self.record(format!("deliver:{}", message.offset));
            return Ok(Some(message));
        }

        let token = self.0.cancel_when_drained.lock().unwrap().clone();
        if let Some(token) = token {
            token.cancel();
        }
        tokio::time::sleep(timeout).await;
        Ok(None)
    }

    fn commit(&self, message: &ConsumedMessage) -> Result<(), AppError> {
        self.record(format!("commit:{}", message.offset));
        Ok(())
    }

    fn seek(&self, message: &ConsumedMessage) -> Result<(), AppError> {
        self.record(format!("seek:{}", message.offset));
        let mut queue = self.0.queue.lock().unwrap();
        queue.retain(|queued| queued.offset != message.offset);
        queue.push_front(message.clone());
        Ok(())
    }

    fn close(&self) {
        self.record("close".to_string());
    }
}

/// Fails the first `failures` creates with an unexpected error, then stores.
pub struct FlakyService {
    failures: AtomicUsize,
    created: Mutex<Vec<RentalEvent>>,
    rejected: Option<(&'static str, i32)>,
}

impl FlakyService {
    pub fn failing(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicUsize::new(failures),
            created: Mutex::new(Vec::new()),
            rejected: None,
        })
    }

    /// Rejects every create with a missing reference.
    pub fn rejecting(entity: &'static str, id: i32) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            rejected: Some((entity, id)),
        })
    }

    pub fn created(&self) -> Vec<RentalEvent> {
        self.created.lock().unwrap().clone()
    }

    pub fn factory(self: &Arc<Self>) -> RentalRecordServiceFactory {
        let service = self.clone();
        Arc::new(move || service.clone() as Arc<dyn RentalRecordServiceTrait>)
    }
}

#[async_trait::async_trait]
impl RentalRecordServiceTrait for FlakyService {
    async fn create(&self, event: &RentalEvent) -> Result<RentalRecord, AppError> {
        if let Some((entity, id)) = self.rejected {
            return Err(AppError::ReferenceNotFound { entity, id });
        }
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        let mut created = self.created.lock().unwrap();
        created.push(event.clone());
        let mut record = RentalRecord::from_event(event);
        record.id = created.len() as i32;
        Ok(record)
    }
}

pub fn message(offset: i64, key: i32, event: &RentalEvent) -> ConsumedMessage {
    ConsumedMessage {
        topic: "rental-records".to_string(),
        partition: 0,
        offset,
        key: Some(JsonCodec::encode(Some(&key)).unwrap()),
        payload: Some(JsonCodec::encode(Some(event)).unwrap()),
    }
}
