use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use tracing::{debug, error, info};

use crate::{
    event::{ResourceType, Selector, Subscriber, Subscription},
    store::{AlertRecord, Host, Store, Task, TestResult, Volume},
    Error, Result,
};

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new(path: &Path, max_connections: u32) -> Result<Self> {
        info!("Connecting to SQLite database: {}", path.display());

        // Every connection to an in-memory database sees its own copy, so the
        // pool is pinned to one long-lived connection.
        let (options, max_connections) = if path.as_os_str() == ":memory:" {
            (SqliteConnectOptions::from_str("sqlite::memory:")?, 1)
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            (
                SqliteConnectOptions::new().filename(path).create_if_missing(true),
                max_connections,
            )
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to connect to SQLite: {}", e);
                Error::Sqlx(e)
            })?;

        Ok(Self { pool })
    }
}

fn task_from_row(r: &SqliteRow) -> Result<Task> {
    let test_results: Vec<TestResult> = serde_json::from_str(&r.try_get::<String, _>("test_results")?)?;
    let execution: i64 = r.try_get("execution")?;

    Ok(Task {
        id: r.try_get("id")?,
        display_name: r.try_get("display_name")?,
        build_variant: r.try_get("build_variant")?,
        project: r.try_get("project")?,
        execution: u32::try_from(execution)
            .map_err(|_| Error::Internal(format!("invalid task execution {}", execution)))?,
        host_id: r.try_get("host_id")?,
        test_results,
    })
}

fn subscription_from_row(r: &SqliteRow) -> Result<Subscription> {
    let selectors: Vec<Selector> = serde_json::from_str(&r.try_get::<String, _>("selectors")?)?;
    let subscriber: Subscriber = serde_json::from_str(&r.try_get::<String, _>("subscriber")?)?;

    Ok(Subscription {
        id: r.try_get("id")?,
        resource_type: r.try_get::<String, _>("resource_type")?.parse()?,
        owner: r.try_get("owner")?,
        trigger: r.try_get("trigger_name")?,
        selectors,
        subscriber,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn init(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                Error::Migrate(e)
            })?;

        Ok(())
    }

    async fn save_host(&self, host: Host) -> Result<()> {
        debug!("Saving host: {}", host.id);

        sqlx::query(
            r#"
            INSERT INTO hosts (id, host, distro, owner, expiration_time)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                host = excluded.host,
                distro = excluded.distro,
                owner = excluded.owner,
                expiration_time = excluded.expiration_time
            "#,
        )
        .bind(&host.id)
        .bind(&host.host)
        .bind(&host.distro)
        .bind(&host.owner)
        .bind(host.expiration_time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_host(&self, id: &str) -> Result<Option<Host>> {
        debug!("Getting host: {}", id);

        let row = sqlx::query(
            "SELECT id, host, distro, owner, expiration_time FROM hosts WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Host {
                id: r.try_get("id")?,
                host: r.try_get("host")?,
                distro: r.try_get("distro")?,
                owner: r.try_get("owner")?,
                expiration_time: r.try_get::<DateTime<Utc>, _>("expiration_time")?,
            })),
            None => Ok(None),
        }
    }

    async fn save_volume(&self, volume: Volume) -> Result<()> {
        debug!("Saving volume: {}", volume.id);

        sqlx::query(
            r#"
            INSERT INTO volumes (id, owner, host_id, expiration_time)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                owner = excluded.owner,
                host_id = excluded.host_id,
                expiration_time = excluded.expiration_time
            "#,
        )
        .bind(&volume.id)
        .bind(&volume.owner)
        .bind(&volume.host_id)
        .bind(volume.expiration_time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_volume(&self, id: &str) -> Result<Option<Volume>> {
        debug!("Getting volume: {}", id);

        let row = sqlx::query(
            "SELECT id, owner, host_id, expiration_time FROM volumes WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Volume {
                id: r.try_get("id")?,
                owner: r.try_get("owner")?,
                host_id: r.try_get("host_id")?,
                expiration_time: r.try_get::<DateTime<Utc>, _>("expiration_time")?,
            })),
            None => Ok(None),
        }
    }

    async fn save_task(&self, task: Task) -> Result<()> {
        debug!("Saving task: {}", task.id);

        let test_results_json = serde_json::to_string(&task.test_results)?;

        sqlx::query(
            r#"
            INSERT INTO tasks (id, display_name, build_variant, project, execution, host_id, test_results)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                build_variant = excluded.build_variant,
                project = excluded.project,
                execution = excluded.execution,
                host_id = excluded.host_id,
                test_results = excluded.test_results
            "#,
        )
        .bind(&task.id)
        .bind(&task.display_name)
        .bind(&task.build_variant)
        .bind(&task.project)
        .bind(i64::from(task.execution))
        .bind(&task.host_id)
        .bind(test_results_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        debug!("Getting task: {}", id);

        let row = sqlx::query(
            r#"
            SELECT id, display_name, build_variant, project, execution, host_id, test_results
            FROM tasks
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn save_subscription(&self, subscription: Subscription) -> Result<()> {
        debug!("Saving subscription: {}", subscription.id);

        let selectors_json = serde_json::to_string(&subscription.selectors)?;
        let subscriber_json = serde_json::to_string(&subscription.subscriber)?;

        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, resource_type, owner, trigger_name, selectors, subscriber)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                resource_type = excluded.resource_type,
                owner = excluded.owner,
                trigger_name = excluded.trigger_name,
                selectors = excluded.selectors,
                subscriber = excluded.subscriber
            "#,
        )
        .bind(&subscription.id)
        .bind(subscription.resource_type.as_str())
        .bind(&subscription.owner)
        .bind(&subscription.trigger)
        .bind(selectors_json)
        .bind(subscriber_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_subscriptions(&self, resource_type: ResourceType) -> Result<Vec<Subscription>> {
        debug!("Listing subscriptions for resource type: {}", resource_type);

        let rows = sqlx::query(
            r#"
            SELECT id, resource_type, owner, trigger_name, selectors, subscriber
            FROM subscriptions
            WHERE resource_type = ?1
            ORDER BY id
            "#,
        )
        .bind(resource_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(subscription_from_row).collect()
    }

    async fn exists_or_create(&self, record: &AlertRecord) -> Result<bool> {
        debug!(
            "Recording alert {} for {} ({:?})",
            record.alert_type, record.resource_id, record.discriminator
        );

        // A single conditional insert, so two dispatches racing on the same
        // key cannot both observe "absent".
        let result = sqlx::query(
            r#"
            INSERT INTO alert_records (resource_id, alert_type, discriminator, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(resource_id, alert_type, discriminator) DO NOTHING
            "#,
        )
        .bind(&record.resource_id)
        .bind(&record.alert_type)
        .bind(record.discriminator.as_deref().unwrap_or(""))
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 0)
    }

    async fn clear_alert_records(&self, resource_id: &str) -> Result<u64> {
        info!("Clearing alert records for {}", resource_id);

        let result = sqlx::query("DELETE FROM alert_records WHERE resource_id = ?1")
            .bind(resource_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{SubscriberType, TRIGGER_EXPIRATION};
    use crate::store::TestStatus;

    async fn memory_store() -> SqliteStore {
        let store = SqliteStore::new(Path::new(":memory:"), 1).await.unwrap();
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_alert_records_are_inserted_once() {
        let store = memory_store().await;
        let record = AlertRecord::new("v0", "volume_expiration_warning", Some("12".to_string()));

        assert!(!store.exists_or_create(&record).await.unwrap());
        assert!(store.exists_or_create(&record).await.unwrap());

        // no discriminator is its own key, not a wildcard
        let bare = AlertRecord::new("v0", "volume_expiration_warning", None);
        assert!(!store.exists_or_create(&bare).await.unwrap());
        assert!(store.exists_or_create(&bare).await.unwrap());

        assert_eq!(store.clear_alert_records("v0").await.unwrap(), 2);
        assert!(!store.exists_or_create(&record).await.unwrap());
    }

    #[tokio::test]
    async fn test_subscriptions_are_scoped_by_resource_type() {
        let store = memory_store().await;
        let email = Subscriber {
            subscriber_type: SubscriberType::Email,
            target: "foo@bar.com".to_string(),
        };
        let volume_sub = Subscription::by_id(ResourceType::Volume, TRIGGER_EXPIRATION, "v0", email.clone())
            .with_owner("alice");
        store.save_subscription(volume_sub.clone()).await.unwrap();
        store
            .save_subscription(Subscription::by_id(ResourceType::Host, TRIGGER_EXPIRATION, "h0", email))
            .await
            .unwrap();

        let found = store.find_subscriptions(ResourceType::Volume).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, volume_sub.id);
        assert_eq!(found[0].owner, "alice");
        assert_eq!(found[0].selectors, volume_sub.selectors);
        assert_eq!(found[0].subscriber, volume_sub.subscriber);
    }

    #[tokio::test]
    async fn test_task_round_trips_with_results() {
        let store = memory_store().await;
        store
            .save_task(Task {
                id: "t0".to_string(),
                display_name: "compile".to_string(),
                build_variant: "ubuntu".to_string(),
                project: "mci".to_string(),
                execution: 2,
                host_id: "h0".to_string(),
                test_results: vec![TestResult {
                    test_file: "jstests/core/a.js".to_string(),
                    url: "http://logs/a".to_string(),
                    status: TestStatus::Fail,
                }],
            })
            .await
            .unwrap();

        let task = store.get_task("t0").await.unwrap().unwrap();
        assert_eq!(task.execution, 2);
        assert_eq!(task.test_results.len(), 1);
        assert_eq!(task.test_results[0].status, TestStatus::Fail);
        assert!(store.get_task("missing").await.unwrap().is_none());
    }
}
