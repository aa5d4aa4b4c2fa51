mod config;
mod factory;
mod memory;
mod models;
mod sqlite;

pub use config::{DatabaseConfig, DatabaseType};
pub use factory::create_store;
pub use memory::MemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::event::{Event, ResourceType, Subscription};
use crate::Error;

#[async_trait]
pub trait Store: Send + Sync {
    // Initialize database schema
    async fn init(&self) -> crate::Result<()>;

    // Entity operations
    async fn save_host(&self, host: Host) -> crate::Result<()>;
    async fn get_host(&self, id: &str) -> crate::Result<Option<Host>>;
    async fn save_volume(&self, volume: Volume) -> crate::Result<()>;
    async fn get_volume(&self, id: &str) -> crate::Result<Option<Volume>>;
    async fn save_task(&self, task: Task) -> crate::Result<()>;
    async fn get_task(&self, id: &str) -> crate::Result<Option<Task>>;

    // Subscription operations
    async fn save_subscription(&self, subscription: Subscription) -> crate::Result<()>;
    async fn find_subscriptions(&self, resource_type: ResourceType) -> crate::Result<Vec<Subscription>>;

    // Alert records
    /// Atomically inserts the record unless one with the same key exists.
    /// Returns whether a record already existed.
    async fn exists_or_create(&self, record: &AlertRecord) -> crate::Result<bool>;
    /// Administrative clearing; returns the number of records removed.
    async fn clear_alert_records(&self, resource_id: &str) -> crate::Result<u64>;

    /// Loads the entity an event refers to, failing with `NotFound` once it
    /// no longer exists.
    async fn load_entity(&self, event: &Event) -> crate::Result<Entity> {
        let id = event.resource_id.as_str();
        let entity = match event.resource_type {
            ResourceType::Host => self.get_host(id).await?.map(Entity::Host),
            ResourceType::Volume => self.get_volume(id).await?.map(Entity::Volume),
            ResourceType::Task => self.get_task(id).await?.map(Entity::Task),
        };
        entity.ok_or_else(|| {
            Error::NotFound(format!(
                "{} '{}' referenced by event '{}'",
                event.resource_type.as_str().to_lowercase(),
                id,
                event.id
            ))
        })
    }
}
