//! Synthetic rental events.

use chrono::{DateTime, TimeDelta, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{config::GeneratorConfig, domain::RentalEvent, errors::AppError};

const SECONDS_PER_DAY: i64 = 86_400;

/// Draws rental events uniformly from the configured bounds.
///
/// Start times always lie in the past: `now` minus up to `days_range` days,
/// at whole-second granularity.
pub struct RentalEventGenerator<R: Rng = StdRng> {
    config: GeneratorConfig,
    rng: R,
}

impl RentalEventGenerator<StdRng> {
    /// Seeded from `config.seed` when present, from OS entropy otherwise.
    pub fn from_config(config: GeneratorConfig) -> Result<Self, AppError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(config, rng)
    }
}

impl<R: Rng> RentalEventGenerator<R> {
    pub fn new(config: GeneratorConfig, rng: R) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn generate(&mut self, count: usize) -> Vec<RentalEvent> {
        self.generate_at(Utc::now(), count)
    }

    pub fn generate_at(&mut self, now: DateTime<Utc>, count: usize) -> Vec<RentalEvent> {
        (0..count).map(|_| self.next_event(now)).collect()
    }

    fn next_event(&mut self, now: DateTime<Utc>) -> RentalEvent {
        let renter_id = self.rng.gen_range(1..=self.config.max_renter_id);
        let bike_id = self.rng.gen_range(1..=self.config.max_bike_id);
        let hours = self
            .rng
            .gen_range(self.config.min_duration_hours..=self.config.max_duration_hours);
        let offset = self
            .rng
            .gen_range(0..=self.config.days_range * SECONDS_PER_DAY);

        // Validated bounds keep every field positive.
        RentalEvent::from_parts(
            renter_id,
            bike_id,
            now - TimeDelta::seconds(offset),
            TimeDelta::hours(hours),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(config: GeneratorConfig) -> RentalEventGenerator {
        RentalEventGenerator::new(config, StdRng::seed_from_u64(7)).unwrap()
    }

    #[test]
    fn generates_exactly_the_requested_count() {
        let mut generator = seeded(GeneratorConfig::default());
        assert!(generator.generate(0).is_empty());
        assert_eq!(generator.generate(1).len(), 1);
        assert_eq!(generator.generate(250).len(), 250);
    }

    #[test]
    fn events_stay_within_bounds() {
        let config = GeneratorConfig {
            max_renter_id: 5,
            max_bike_id: 3,
            min_duration_hours: 2,
            max_duration_hours: 4,
            days_range: 10,
            ..GeneratorConfig::default()
        };
        let now = DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap();
        let mut generator = seeded(config);

        for event in generator.generate_at(now, 1_000) {
            assert!((1..=5).contains(&event.renter_id()));
            assert!((1..=3).contains(&event.bike_id()));
            assert!((2..=4).contains(&event.duration().num_hours()));
            assert!(event.start_time() <= now);
            assert!(event.start_time() >= now - TimeDelta::days(10));
        }
    }

    #[test]
    fn same_seed_same_events() {
        let now = Utc::now();
        let mut a = seeded(GeneratorConfig::default());
        let mut b = seeded(GeneratorConfig::default());
        assert_eq!(a.generate_at(now, 20), b.generate_at(now, 20));
    }

    #[test]
    fn zero_day_range_pins_start_to_now() {
        let config = GeneratorConfig {
            days_range: 0,
            ..GeneratorConfig::default()
        };
        let now = Utc::now();
        let mut generator = seeded(config);
        assert!(generator.generate_at(now, 10).iter().all(|e| e.start_time() == now));
    }

    #[test]
    fn invalid_config_fails_at_construction() {
        let config = GeneratorConfig {
            min_duration_hours: 5,
            max_duration_hours: 1,
            ..GeneratorConfig::default()
        };
        let result = RentalEventGenerator::new(config, StdRng::seed_from_u64(1));
        assert!(matches!(result, Err(AppError::InvalidConfig(_))));
    }
}
