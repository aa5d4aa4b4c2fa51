//! Events and the subscription vocabulary used to route them.

mod selector;
mod subscription;

pub use selector::{matches, Selector, SELECTOR_ID, SELECTOR_OBJECT, SELECTOR_OWNER};
pub use subscription::{Subscriber, SubscriberType, Subscription, TRIGGER_EXPIRATION};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::Error;

/// Kind of resource an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceType {
    Host,
    Volume,
    Task,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Host => "HOST",
            ResourceType::Volume => "VOLUME",
            ResourceType::Task => "TASK",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HOST" => Ok(ResourceType::Host),
            "VOLUME" => Ok(ResourceType::Volume),
            "TASK" => Ok(ResourceType::Task),
            other => Err(Error::Validation(format!("unknown resource type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    HostExpirationWarningSent,
    VolumeExpirationWarningSent,
    TaskFinished,
}

/// Immutable record of something that happened to a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// Type-specific payload, opaque to the dispatch engine.
    #[serde(default)]
    pub data: JsonValue,
}

impl Event {
    pub fn new(resource_type: ResourceType, event_type: EventType, resource_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            resource_type,
            resource_id: resource_id.into(),
            event_type,
            timestamp: Utc::now(),
            data: JsonValue::Null,
        }
    }
}
