use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::domain::DeskError;
use crate::record::Record;
use crate::repository::{
    DeleteRequest, Entity, FetchRequest, InsertRequest, MutationResponse, Repository,
    UpdateRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

/// Toast shown in the status line.
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    pub created: Instant,
}

impl Notification {
    fn new(level: Level, message: impl Into<String>) -> Self {
        Notification {
            level,
            message: message.into(),
            created: Instant::now(),
        }
    }
}

/// Cached per-entity queries over a repository.
///
/// Every mutation invalidates the cached records of its entity and queues a
/// notification. Fetch failures read as an empty table.
pub struct EntityStore {
    repository: Box<dyn Repository>,
    cache: HashMap<Entity, Arc<Vec<Record>>>,
    notifications: VecDeque<Notification>,
}

impl EntityStore {
    pub fn new(repository: Box<dyn Repository>) -> Self {
        EntityStore {
            repository,
            cache: HashMap::new(),
            notifications: VecDeque::new(),
        }
    }

    pub fn records(&mut self, entity: Entity) -> Arc<Vec<Record>> {
        if let Some(records) = self.cache.get(&entity) {
            return Arc::clone(records);
        }
        let start_time = Instant::now();
        let records = match self.repository.fetch(&FetchRequest { entity }) {
            Ok(response) => response.records,
            Err(e) => {
                error!("Fetching {} failed: {e}", entity.title());
                self.notify(Level::Error, format!("Could not load {}: {e}", entity.title()));
                Vec::new()
            }
        };
        debug!(
            "Fetched {} {} in {}ms",
            records.len(),
            entity.name(),
            start_time.elapsed().as_millis()
        );
        let records = Arc::new(records);
        self.cache.insert(entity, Arc::clone(&records));
        records
    }

    pub fn is_cached(&self, entity: Entity) -> bool {
        self.cache.contains_key(&entity)
    }

    pub fn invalidate(&mut self, entity: Entity) {
        if self.is_cached(entity) {
            self.cache.remove(&entity);
            debug!("Invalidated {}", entity.name());
        }
    }

    pub fn insert(&mut self, entity: Entity, record: Record) -> Result<MutationResponse, DeskError> {
        let result = self.repository.insert(InsertRequest { entity, record });
        self.finish(entity, result, "Created")
    }

    pub fn update(
        &mut self,
        entity: Entity,
        id: &str,
        changes: Record,
    ) -> Result<MutationResponse, DeskError> {
        let result = self.repository.update(UpdateRequest {
            entity,
            id: id.to_string(),
            changes,
        });
        self.finish(entity, result, "Updated")
    }

    pub fn delete(&mut self, entity: Entity, id: &str) -> Result<MutationResponse, DeskError> {
        let result = self.repository.delete(DeleteRequest {
            entity,
            id: id.to_string(),
        });
        self.finish(entity, result, "Deleted")
    }

    fn finish(
        &mut self,
        entity: Entity,
        result: Result<MutationResponse, DeskError>,
        verb: &str,
    ) -> Result<MutationResponse, DeskError> {
        match &result {
            Ok(response) => {
                info!("{verb} {} {} record(s)", response.affected, entity.name());
                self.invalidate(entity);
                let message = match &response.id {
                    Some(id) => format!("{verb} {} record {id}", entity.title()),
                    None => format!("{verb} {} {} record(s)", response.affected, entity.title()),
                };
                self.notify(Level::Success, message);
            }
            Err(e) => {
                error!("{verb} on {} failed: {e}", entity.name());
                let message = format!("{} not {}: {e}", entity.title(), verb.to_lowercase());
                self.notify(Level::Error, message);
            }
        }
        result
    }

    pub fn notify(&mut self, level: Level, message: impl Into<String>) {
        self.notifications.push_back(Notification::new(level, message));
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    fn store() -> EntityStore {
        let repo = MemoryRepository::new().with_records(
            Entity::Products,
            vec![rec(json!({"id": 1, "name": "Bolt"})), rec(json!({"id": 2, "name": "Nut"}))],
        );
        EntityStore::new(Box::new(repo))
    }

    #[test]
    fn records_are_cached() {
        let mut s = store();
        let first = s.records(Entity::Products);
        assert!(s.is_cached(Entity::Products));
        let second = s.records(Entity::Products);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn mutation_invalidates_and_notifies() {
        let mut s = store();
        let before = s.records(Entity::Products);
        s.insert(Entity::Products, rec(json!({"name": "Washer"}))).unwrap();
        assert!(!s.is_cached(Entity::Products));
        let after = s.records(Entity::Products);
        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 3);

        let toasts = s.take_notifications();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].level, Level::Success);
        assert_eq!(toasts[0].message, "Created Products record 3");
        assert!(s.take_notifications().is_empty());
    }

    #[test]
    fn failed_mutation_keeps_cache() {
        let mut s = store();
        s.records(Entity::Products);
        assert!(s.delete(Entity::Products, "42").is_err());
        assert!(s.is_cached(Entity::Products));
        let toasts = s.take_notifications();
        assert_eq!(toasts[0].level, Level::Error);
        assert_eq!(toasts[0].message, "Products not deleted: Products record 42 not found");
    }

    #[test]
    fn update_and_delete_round() {
        let mut s = store();
        s.update(Entity::Products, "2", rec(json!({"name": "Lock nut"}))).unwrap();
        assert_eq!(s.records(Entity::Products)[1]["name"], json!("Lock nut"));
        s.delete(Entity::Products, "1").unwrap();
        assert_eq!(s.records(Entity::Products).len(), 1);
        let toasts = s.take_notifications();
        assert_eq!(toasts[1].message, "Deleted 1 Products record(s)");
    }

    struct Broken;

    impl Repository for Broken {
        fn fetch(
            &mut self,
            _: &FetchRequest,
        ) -> Result<crate::repository::FetchResponse, DeskError> {
            Err(DeskError::FileNotFound)
        }
        fn insert(&mut self, _: InsertRequest) -> Result<MutationResponse, DeskError> {
            Err(DeskError::PermissionDenied)
        }
        fn update(&mut self, _: UpdateRequest) -> Result<MutationResponse, DeskError> {
            Err(DeskError::PermissionDenied)
        }
        fn delete(&mut self, _: DeleteRequest) -> Result<MutationResponse, DeskError> {
            Err(DeskError::PermissionDenied)
        }
    }

    #[test]
    fn fetch_errors_read_as_empty() {
        let mut s = EntityStore::new(Box::new(Broken));
        assert!(s.records(Entity::Invoices).is_empty());
        let toasts = s.take_notifications();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].level, Level::Error);
    }
}
