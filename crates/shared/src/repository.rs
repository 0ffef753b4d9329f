use std::sync::{
    Arc,
    atomic::{AtomicI32, Ordering},
};

use dashmap::DashMap;

use crate::{abstract_trait::RepositoryTrait, domain::Entity, errors::AppError};

pub struct InMemoryRepository<E: Entity> {
    pub db: Arc<DashMap<i32, E>>,
    next_id: AtomicI32,
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new() -> Self {
        Self {
            db: Arc::new(DashMap::new()),
            next_id: AtomicI32::new(1),
        }
    }

    /// Stores `entity` under its own id, keeping later generated ids above it.
    pub fn insert(&self, entity: E) {
        self.next_id.fetch_max(entity.id() + 1, Ordering::SeqCst);
        self.db.insert(entity.id(), entity);
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

impl<E: Entity> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<E: Entity> RepositoryTrait<E> for InMemoryRepository<E> {
    async fn find_by_id(&self, id: i32) -> Result<Option<E>, AppError> {
        Ok(self.db.get(&id).map(|e| e.value().clone()))
    }

    async fn find_all(&self) -> Result<Vec<E>, AppError> {
        let mut items: Vec<E> = self.db.iter().map(|kv| kv.value().clone()).collect();
        items.sort_by_key(|e| e.id());
        Ok(items)
    }

    async fn create(&self, mut entity: E) -> Result<E, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if id <= 0 {
            return Err(AppError::Internal("id sequence exhausted".to_string()));
        }
        entity.set_id(id);
        self.db.insert(id, entity.clone());
        Ok(entity)
    }
}
