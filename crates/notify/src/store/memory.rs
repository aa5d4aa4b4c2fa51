use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::{
    event::{ResourceType, Subscription},
    store::{AlertRecord, Host, Store, Task, Volume},
    Result,
};

/// In-process store. Alert record insertion happens under a single lock, so
/// `exists_or_create` is atomic across concurrent dispatches.
#[derive(Default)]
pub struct MemoryStore {
    hosts: RwLock<HashMap<String, Host>>,
    volumes: RwLock<HashMap<String, Volume>>,
    tasks: RwLock<HashMap<String, Task>>,
    subscriptions: RwLock<Vec<Subscription>>,
    alert_records: Mutex<HashSet<(String, String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn save_host(&self, host: Host) -> Result<()> {
        debug!("Saving host: {}", host.id);
        self.hosts.write().await.insert(host.id.clone(), host);
        Ok(())
    }

    async fn get_host(&self, id: &str) -> Result<Option<Host>> {
        Ok(self.hosts.read().await.get(id).cloned())
    }

    async fn save_volume(&self, volume: Volume) -> Result<()> {
        debug!("Saving volume: {}", volume.id);
        self.volumes.write().await.insert(volume.id.clone(), volume);
        Ok(())
    }

    async fn get_volume(&self, id: &str) -> Result<Option<Volume>> {
        Ok(self.volumes.read().await.get(id).cloned())
    }

    async fn save_task(&self, task: Task) -> Result<()> {
        debug!("Saving task: {}", task.id);
        self.tasks.write().await.insert(task.id.clone(), task);
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn save_subscription(&self, subscription: Subscription) -> Result<()> {
        debug!("Saving subscription: {}", subscription.id);
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.retain(|s| s.id != subscription.id);
        subscriptions.push(subscription);
        Ok(())
    }

    async fn find_subscriptions(&self, resource_type: ResourceType) -> Result<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|s| s.resource_type == resource_type)
            .cloned()
            .collect())
    }

    async fn exists_or_create(&self, record: &AlertRecord) -> Result<bool> {
        let inserted = self.alert_records.lock().await.insert(record.key());
        Ok(!inserted)
    }

    async fn clear_alert_records(&self, resource_id: &str) -> Result<u64> {
        let mut records = self.alert_records.lock().await;
        let before = records.len();
        records.retain(|(id, _, _)| id != resource_id);
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_exists_or_create_reports_existing_records() {
        let store = MemoryStore::new();
        let record = AlertRecord::new("v0", "volume_expiration_warning", Some("12".to_string()));

        assert!(!store.exists_or_create(&record).await.unwrap());
        assert!(store.exists_or_create(&record).await.unwrap());

        // a different discriminator is a different alert
        let other = AlertRecord::new("v0", "volume_expiration_warning", Some("2".to_string()));
        assert!(!store.exists_or_create(&other).await.unwrap());

        assert_eq!(store.clear_alert_records("v0").await.unwrap(), 2);
        assert!(!store.exists_or_create(&record).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_create_exactly_one_record() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let record = AlertRecord::new("h0", "host_expiration_warning", None);
                store.exists_or_create(&record).await.unwrap()
            }));
        }

        let mut created = 0;
        for handle in handles {
            if !handle.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }
}
