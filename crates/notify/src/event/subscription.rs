use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ResourceType, Selector, SELECTOR_ID};

pub const TRIGGER_EXPIRATION: &str = "expiration";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubscriberType {
    Email,
    Slack,
    JiraIssue,
}

impl fmt::Display for SubscriberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriberType::Email => write!(f, "email"),
            SubscriberType::Slack => write!(f, "slack"),
            SubscriberType::JiraIssue => write!(f, "jira-issue"),
        }
    }
}

/// Delivery channel and address for a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    #[serde(rename = "type")]
    pub subscriber_type: SubscriberType,
    /// Email address, chat channel, or ticket project depending on the type.
    pub target: String,
}

/// A user rule binding selectors and a trigger name to a subscriber.
/// All selectors must match (AND semantics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub owner: String,
    pub trigger: String,
    pub selectors: Vec<Selector>,
    pub subscriber: Subscriber,
}

impl Subscription {
    /// Subscription that follows one resource by id.
    pub fn by_id(
        resource_type: ResourceType,
        trigger: impl Into<String>,
        id: impl Into<String>,
        subscriber: Subscriber,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            resource_type,
            owner: String::new(),
            trigger: trigger.into(),
            selectors: vec![Selector::new(SELECTOR_ID, id)],
            subscriber,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }
}
