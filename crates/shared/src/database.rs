use std::sync::Arc;

use crate::{
    domain::{Bike, RentalRecord, Renter},
    repository::InMemoryRepository,
};

const COLORS: [&str; 5] = ["black", "red", "blue", "green", "white"];
const MODEL_COUNT: i32 = 10;

/// The in-memory store shared by every service instance.
#[derive(Clone, Default)]
pub struct Database {
    pub renters: Arc<InMemoryRepository<Renter>>,
    pub bikes: Arc<InMemoryRepository<Bike>>,
    pub rental_records: Arc<InMemoryRepository<RentalRecord>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference renters `1..=renters` and bikes `1..=bikes`, no rentals.
    pub fn seeded(renters: i32, bikes: i32) -> Self {
        let db = Self::new();
        for id in 1..=renters {
            db.renters.insert(Renter {
                id,
                full_name: format!("Renter {id:03}"),
                phone: format!("+1-555-{:04}", id % 10_000),
            });
        }
        for id in 1..=bikes {
            db.bikes.insert(Bike {
                id,
                serial_number: format!("SN-{id:05}"),
                color: Some(COLORS[(id as usize) % COLORS.len()].to_string()),
                model_id: (id - 1) % MODEL_COUNT + 1,
            });
        }
        db
    }
}
