use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::TicketRequest;
use crate::config::JiraConfig;
use crate::{Error, Result};

/// Key of a ticket the tracker accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTicket {
    pub id: String,
    pub key: String,
    #[serde(rename = "self")]
    pub url: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketTracker: Send + Sync {
    async fn create_ticket(&self, request: &TicketRequest) -> Result<CreatedTicket>;
}

/// Jira REST client. One attempt per ticket, no retries.
pub struct JiraClient {
    host: String,
    username: String,
    password: String,
    client: Client,
    timeout: Duration,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Self {
        Self {
            host: config.host.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TicketTracker for JiraClient {
    async fn create_ticket(&self, request: &TicketRequest) -> Result<CreatedTicket> {
        let url = format!("{}/rest/api/2/issue", self.host);
        debug!("Creating ticket in project {} via {}", request.project, url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "fields": request.fields() }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("ticket tracker unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "HTTP status '{}' creating ticket: {}",
                status, error_text
            )));
        }

        response
            .json::<CreatedTicket>()
            .await
            .map_err(|e| Error::Upstream(format!("unexpected ticket tracker response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_ticket_decodes_self_link() {
        let ticket: CreatedTicket = serde_json::from_str(
            r#"{"id":"10001","key":"BF-1","self":"https://jira.example.com/rest/api/2/issue/10001"}"#,
        )
        .unwrap();
        assert_eq!(ticket.key, "BF-1");
        assert_eq!(ticket.url, "https://jira.example.com/rest/api/2/issue/10001");
    }

    #[tokio::test]
    async fn test_unreachable_tracker_is_upstream_error() {
        let client = JiraClient::new(&JiraConfig {
            host: "http://127.0.0.1:1/".to_string(),
            username: "bot".to_string(),
            password: "secret".to_string(),
        })
        .with_timeout(Duration::from_secs(2));
        let request = TicketRequest {
            project: "BF".to_string(),
            summary: "s".to_string(),
            description: "d".to_string(),
            failing_tasks: vec![],
            failing_variants: vec![],
            projects: vec![],
            issue_type: "Build Failure".to_string(),
            assignee: "alice".to_string(),
            reporter: "alice".to_string(),
            field_ids: Default::default(),
        };
        let err = client.create_ticket(&request).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }
}
