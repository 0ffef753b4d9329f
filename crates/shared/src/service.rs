use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::{
    abstract_trait::{RentalRecordServiceFactory, RentalRecordServiceTrait, RepositoryTrait},
    database::Database,
    domain::{Bike, RentalEvent, RentalRecord, Renter, ServiceStats},
    errors::AppError,
};

#[derive(Clone)]
pub struct RentalRecordServiceImpl {
    pub renters: Arc<dyn RepositoryTrait<Renter>>,
    pub bikes: Arc<dyn RepositoryTrait<Bike>>,
    pub rental_records: Arc<dyn RepositoryTrait<RentalRecord>>,
    pub stats: Arc<DashMap<(), ServiceStats>>,
}

impl std::fmt::Debug for RentalRecordServiceImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RentalRecordServiceImpl")
            .field("renters", &"Arc<dyn RepositoryTrait<Renter>>")
            .field("bikes", &"Arc<dyn RepositoryTrait<Bike>>")
            .field("rental_records", &"Arc<dyn RepositoryTrait<RentalRecord>>")
            .field("stats", &self.stats)
            .finish()
    }
}

impl RentalRecordServiceImpl {
    pub fn new(
        renters: Arc<dyn RepositoryTrait<Renter>>,
        bikes: Arc<dyn RepositoryTrait<Bike>>,
        rental_records: Arc<dyn RepositoryTrait<RentalRecord>>,
        stats: Arc<DashMap<(), ServiceStats>>,
    ) -> Self {
        Self {
            renters,
            bikes,
            rental_records,
            stats,
        }
    }

    pub fn from_database(db: &Database, stats: Arc<DashMap<(), ServiceStats>>) -> Self {
        Self::new(
            db.renters.clone(),
            db.bikes.clone(),
            db.rental_records.clone(),
            stats,
        )
    }

    /// A factory building a new service over `db` for every call.
    ///
    /// All instances report into the same `stats`.
    pub fn factory(db: Database, stats: Arc<DashMap<(), ServiceStats>>) -> RentalRecordServiceFactory {
        Arc::new(move || {
            Arc::new(RentalRecordServiceImpl::from_database(&db, stats.clone()))
                as Arc<dyn RentalRecordServiceTrait>
        })
    }

    fn increment_stat<F>(&self, f: F)
    where
        F: FnOnce(&mut ServiceStats),
    {
        let mut stats = self.stats.entry(()).or_default();
        stats.total_operations += 1;
        f(&mut stats);
    }

    pub fn get_stats(&self) -> ServiceStats {
        self.stats
            .get(&())
            .map(|s| s.value().clone())
            .unwrap_or_default()
    }

    async fn ensure_references(&self, event: &RentalEvent) -> Result<(), AppError> {
        if self.renters.find_by_id(event.renter_id()).await?.is_none() {
            return Err(AppError::ReferenceNotFound {
                entity: "Renter",
                id: event.renter_id(),
            });
        }
        if self.bikes.find_by_id(event.bike_id()).await?.is_none() {
            return Err(AppError::ReferenceNotFound {
                entity: "Bike",
                id: event.bike_id(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RentalRecordServiceTrait for RentalRecordServiceImpl {
    async fn create(&self, event: &RentalEvent) -> Result<RentalRecord, AppError> {
        if let Err(e) = self.ensure_references(event).await {
            if matches!(e, AppError::ReferenceNotFound { .. }) {
                self.increment_stat(|s| s.rejected_count += 1);
            }
            return Err(e);
        }

        let record = self
            .rental_records
            .create(RentalRecord::from_event(event))
            .await?;
        self.increment_stat(|s| s.create_count += 1);
        debug!(
            id = record.id,
            renter_id = record.renter_id,
            bike_id = record.bike_id,
            "rental record stored"
        );
        Ok(record)
    }
}
