//! Rendered, channel-ready messages and the renderers that produce them.

mod assembler;
mod render;

pub use assembler::assemble;
pub use render::PayloadRenderer;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Subscriber;
use crate::tickets::{TicketData, TicketRequest};

/// A notification ready to hand to a delivery sink.
///
/// `event_id` and `subscription_id` let the sink track redelivery
/// idempotently; the engine keeps no copy after handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub event_id: String,
    pub subscription_id: String,
    pub trigger: String,
    pub subscriber: Subscriber,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        event_id: impl Into<String>,
        subscription_id: impl Into<String>,
        trigger: impl Into<String>,
        subscriber: Subscriber,
        payload: Payload,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_id: event_id.into(),
            subscription_id: subscription_id.into(),
            trigger: trigger.into(),
            subscriber,
            payload,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Payload {
    Email(EmailPayload),
    Slack(SlackPayload),
    JiraIssue(TicketRequest),
}

impl Payload {
    pub fn channel(&self) -> &'static str {
        match self {
            Payload::Email(_) => "email",
            Payload::Slack(_) => "slack",
            Payload::JiraIssue(_) => "jira-issue",
        }
    }

    /// Subject and body as plain text, for sinks that only print messages.
    pub fn text(&self) -> (&str, &str) {
        match self {
            Payload::Email(email) => (&email.subject, &email.body),
            Payload::Slack(slack) => ("", &slack.body),
            Payload::JiraIssue(ticket) => (&ticket.summary, &ticket.description),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackPayload {
    pub body: String,
}

/// Data a trigger hands to the renderers.
#[derive(Debug, Clone, Serialize)]
pub enum TemplateData {
    Expiration(ExpirationData),
    BuildFailure(TicketData),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiringResource {
    Host,
    Volume,
}

/// Everything an expiration warning needs to render.
#[derive(Debug, Clone, Serialize)]
pub struct ExpirationData {
    pub kind: ExpiringResource,
    pub id: String,
    /// Only hosts carry a distro.
    pub distro: Option<String>,
    pub expiration_time: DateTime<Utc>,
    pub url: String,
}
