use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Spawn host lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    /// DNS name the host is reachable at.
    pub host: String,
    pub distro: String,
    pub owner: String,
    pub expiration_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub owner: String,
    pub host_id: Option<String>,
    pub expiration_time: DateTime<Utc>,
}

// Task execution results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub display_name: String,
    pub build_variant: String,
    pub project: String,
    pub execution: u32,
    pub host_id: String,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_file: String,
    pub url: String,
    pub status: TestStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
}

/// The domain object an event refers to, as returned by the entity loader.
#[derive(Debug, Clone)]
pub enum Entity {
    Host(Host),
    Volume(Volume),
    Task(Task),
}

impl Entity {
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Host(_) => "host",
            Entity::Volume(_) => "volume",
            Entity::Task(_) => "task",
        }
    }
}

/// Dedup marker: presence means the alert was already sent.
///
/// Records are keyed by (resource id, alert type, discriminator) and are
/// never updated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub resource_id: String,
    pub alert_type: String,
    pub discriminator: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(
        resource_id: impl Into<String>,
        alert_type: impl Into<String>,
        discriminator: Option<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            alert_type: alert_type.into(),
            discriminator,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> (String, String, String) {
        (
            self.resource_id.clone(),
            self.alert_type.clone(),
            self.discriminator.clone().unwrap_or_default(),
        )
    }
}
