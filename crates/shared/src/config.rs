use std::time::Duration;

use clap::Args;

use crate::errors::AppError;

pub const DEFAULT_TOPIC: &str = "rental-records";
pub const DEFAULT_GROUP_ID: &str = "api-host-consumer";
pub const MAX_DAYS_RANGE: i64 = 36_500;
pub const MAX_DURATION_HOURS: i64 = 8_760;

/// Broker connection and delivery settings shared by both loops.
#[derive(Debug, Clone, Args)]
pub struct BrokerArgs {
    /// Kafka bootstrap servers
    #[arg(long, env = "KAFKA_BROKERS", default_value = "localhost:9092")]
    pub brokers: String,
    /// Topic rental events are published to and consumed from
    #[arg(long, env = "KAFKA_TOPIC", default_value = DEFAULT_TOPIC)]
    pub topic: String,
    /// Consumer group id
    #[arg(long, env = "KAFKA_GROUP_ID", default_value = DEFAULT_GROUP_ID)]
    pub group_id: String,
    /// Retries after the first attempt on transient broker errors
    #[arg(long, env = "KAFKA_RETRY_COUNT", default_value_t = 5)]
    pub retry_count: u32,
    /// Base backoff delay in seconds, doubled on every retry
    #[arg(long, env = "KAFKA_RETRY_BASE_DELAY_SECONDS", default_value_t = 2)]
    pub retry_base_delay_seconds: u64,
    /// How long a single poll waits for a message, in milliseconds
    #[arg(long, env = "KAFKA_POLL_TIMEOUT_MS", default_value_t = 1000)]
    pub poll_timeout_ms: u64,
    /// How long pending messages may take to flush on shutdown, in seconds
    #[arg(long, env = "KAFKA_FLUSH_TIMEOUT_SECONDS", default_value_t = 5)]
    pub flush_timeout_seconds: u64,
}

impl BrokerArgs {
    pub fn producer(&self) -> Result<ProducerConfig, AppError> {
        require_non_empty("topic", &self.topic)?;
        Ok(ProducerConfig {
            topic: self.topic.clone(),
            retry_count: self.retry_count,
            retry_base_delay: base_delay(self.retry_base_delay_seconds),
            flush_timeout: Duration::from_secs(self.flush_timeout_seconds),
            ..ProducerConfig::default()
        })
    }

    pub fn consumer(&self) -> Result<ConsumerConfig, AppError> {
        require_non_empty("topic", &self.topic)?;
        require_non_empty("group id", &self.group_id)?;
        if self.poll_timeout_ms == 0 {
            return Err(AppError::InvalidConfig(
                "poll timeout must be greater than zero".to_string(),
            ));
        }
        Ok(ConsumerConfig {
            topic: self.topic.clone(),
            group_id: self.group_id.clone(),
            retry_count: self.retry_count,
            retry_base_delay: base_delay(self.retry_base_delay_seconds),
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
        })
    }
}

// Backoff never starts below one second.
fn base_delay(seconds: u64) -> Duration {
    Duration::from_secs(seconds.max(1))
}

fn require_non_empty(name: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidConfig(format!("{name} must not be empty")));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    pub topic: String,
    pub retry_count: u32,
    pub retry_base_delay: Duration,
    pub flush_timeout: Duration,
    pub send_timeout: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            retry_count: 5,
            retry_base_delay: Duration::from_secs(2),
            flush_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub topic: String,
    pub group_id: String,
    pub retry_count: u32,
    pub retry_base_delay: Duration,
    pub poll_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            group_id: DEFAULT_GROUP_ID.to_string(),
            retry_count: 5,
            retry_base_delay: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(1),
        }
    }
}

/// Synthetic event generation settings.
#[derive(Debug, Clone, Args)]
pub struct GeneratorArgs {
    /// Seconds to wait between batches
    #[arg(long, env = "GENERATOR_INTERVAL_SECONDS", default_value_t = 5)]
    pub interval_seconds: u64,
    /// Events generated per batch
    #[arg(long, env = "GENERATOR_BATCH_SIZE", default_value_t = 5)]
    pub batch_size: usize,
    /// Renter ids are drawn from 1..=max
    #[arg(long, env = "GENERATOR_MAX_RENTER_ID", default_value_t = 20)]
    pub max_renter_id: i32,
    /// Bike ids are drawn from 1..=max
    #[arg(long, env = "GENERATOR_MAX_BIKE_ID", default_value_t = 20)]
    pub max_bike_id: i32,
    #[arg(long, env = "GENERATOR_MIN_DURATION_HOURS", default_value_t = 1)]
    pub min_duration_hours: i64,
    #[arg(long, env = "GENERATOR_MAX_DURATION_HOURS", default_value_t = 8)]
    pub max_duration_hours: i64,
    /// Start times fall within this many days before now
    #[arg(long, env = "GENERATOR_DAYS_RANGE", default_value_t = 30)]
    pub days_range: i64,
    /// Fixed RNG seed for reproducible runs
    #[arg(long, env = "GENERATOR_SEED")]
    pub seed: Option<u64>,
}

impl GeneratorArgs {
    pub fn build(&self) -> Result<GeneratorConfig, AppError> {
        let config = GeneratorConfig {
            interval: Duration::from_secs(self.interval_seconds),
            batch_size: self.batch_size,
            max_renter_id: self.max_renter_id,
            max_bike_id: self.max_bike_id,
            min_duration_hours: self.min_duration_hours,
            max_duration_hours: self.max_duration_hours,
            days_range: self.days_range,
            seed: self.seed,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub interval: Duration,
    pub batch_size: usize,
    pub max_renter_id: i32,
    pub max_bike_id: i32,
    pub min_duration_hours: i64,
    pub max_duration_hours: i64,
    pub days_range: i64,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            batch_size: 5,
            max_renter_id: 20,
            max_bike_id: 20,
            min_duration_hours: 1,
            max_duration_hours: 8,
            days_range: 30,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_renter_id < 1 {
            return Err(AppError::InvalidConfig(format!(
                "max renter id must be at least 1, got {}",
                self.max_renter_id
            )));
        }
        if self.max_bike_id < 1 {
            return Err(AppError::InvalidConfig(format!(
                "max bike id must be at least 1, got {}",
                self.max_bike_id
            )));
        }
        if self.min_duration_hours < 1 {
            return Err(AppError::InvalidConfig(format!(
                "min duration must be at least 1 hour, got {}",
                self.min_duration_hours
            )));
        }
        if self.min_duration_hours > self.max_duration_hours {
            return Err(AppError::InvalidConfig(format!(
                "min duration {}h exceeds max duration {}h",
                self.min_duration_hours, self.max_duration_hours
            )));
        }
        if self.max_duration_hours > MAX_DURATION_HOURS {
            return Err(AppError::InvalidConfig(format!(
                "max duration must not exceed {MAX_DURATION_HOURS}h, got {}",
                self.max_duration_hours
            )));
        }
        if !(0..=MAX_DAYS_RANGE).contains(&self.days_range) {
            return Err(AppError::InvalidConfig(format!(
                "days range must be between 0 and {MAX_DAYS_RANGE}, got {}",
                self.days_range
            )));
        }
        Ok(())
    }
}
