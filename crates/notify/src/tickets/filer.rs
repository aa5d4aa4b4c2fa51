use std::sync::Arc;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use super::{select_failures, CreatedTicket, TicketData, TicketRequest, TicketTracker};
use crate::config::TicketConfig;
use crate::metrics::TICKETS_FILED_TOTAL;
use crate::notification::{Payload, PayloadRenderer, TemplateData};
use crate::store::Store;

/// Body of a filing request: a task id and the test files to report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTicketInput {
    pub task: String,
    #[serde(default)]
    pub tests: Vec<String>,
}

#[derive(Debug, Error)]
pub enum FilingError {
    #[error("invalid request body: {0}")]
    Decode(String),
    #[error("must be logged in to file a ticket")]
    Unauthorized,
    #[error("task not found for id {0}")]
    TaskNotFound(String),
    #[error("{0}")]
    Lookup(String),
    #[error("host not found for task id {task_id} with host id: {host_id}")]
    HostNotFound { task_id: String, host_id: String },
    #[error("no ticket project configured for project {0}")]
    NoProject(String),
    #[error("error creating description: {0}")]
    Description(String),
    #[error("error creating ticket: {0}")]
    Upstream(String),
}

impl FilingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FilingError::Decode(_) | FilingError::Lookup(_) | FilingError::HostNotFound { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            FilingError::Unauthorized => StatusCode::UNAUTHORIZED,
            FilingError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            FilingError::NoProject(_) | FilingError::Description(_) | FilingError::Upstream(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

/// Files build-failure tickets on behalf of a user.
pub struct TicketFiler {
    store: Arc<dyn Store>,
    tracker: Arc<dyn TicketTracker>,
    config: TicketConfig,
    ui_root: String,
}

impl TicketFiler {
    pub fn new(
        store: Arc<dyn Store>,
        tracker: Arc<dyn TicketTracker>,
        config: TicketConfig,
        ui_root: impl Into<String>,
    ) -> Self {
        Self {
            store,
            tracker,
            config,
            ui_root: ui_root.into(),
        }
    }

    /// Decode a raw request body and file the ticket it describes.
    pub async fn file_ticket_from_body(
        &self,
        user: Option<&str>,
        body: &[u8],
    ) -> Result<CreatedTicket, FilingError> {
        let input: FileTicketInput =
            serde_json::from_slice(body).map_err(|e| FilingError::Decode(e.to_string()))?;
        self.file_ticket(user, &input).await
    }

    pub async fn file_ticket(
        &self,
        user: Option<&str>,
        input: &FileTicketInput,
    ) -> Result<CreatedTicket, FilingError> {
        let user_id = user.filter(|u| !u.is_empty()).ok_or(FilingError::Unauthorized)?;

        let task = self
            .store
            .get_task(&input.task)
            .await
            .map_err(|e| FilingError::Lookup(e.to_string()))?
            .ok_or_else(|| FilingError::TaskNotFound(input.task.clone()))?;

        let host = self
            .store
            .get_host(&task.host_id)
            .await
            .map_err(|e| FilingError::Lookup(e.to_string()))?
            .ok_or_else(|| FilingError::HostNotFound {
                task_id: task.id.clone(),
                host_id: task.host_id.clone(),
            })?;

        let project_key = self
            .config
            .project_key(&task.project)
            .ok_or_else(|| FilingError::NoProject(task.project.clone()))?
            .to_string();

        let tests = select_failures(&self.ui_root, &task, &input.tests);
        let data = TemplateData::BuildFailure(TicketData {
            task,
            host,
            user_id: user_id.to_string(),
            tests,
            project_key,
            ui_root: self.ui_root.clone(),
            fields: self.config.fields.clone(),
            issue_type: self.config.issue_type.clone(),
        });
        let request = render_request(&data)?;

        info!("Creating ticket for user {}", user_id);
        let ticket = self.tracker.create_ticket(&request).await.map_err(|e| {
            error!("Error creating ticket for task {}: {}", input.task, e);
            FilingError::Upstream(e.to_string())
        })?;

        TICKETS_FILED_TOTAL.inc();
        info!("Ticket {} successfully created", ticket.key);
        Ok(ticket)
    }
}

fn render_request(data: &TemplateData) -> Result<TicketRequest, FilingError> {
    match PayloadRenderer::Ticket.render(data) {
        Ok(Payload::JiraIssue(request)) => Ok(request),
        Ok(other) => Err(FilingError::Description(format!(
            "ticket renderer produced a {} payload",
            other.channel()
        ))),
        Err(e) => Err(FilingError::Description(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Host, MemoryStore, Task, TestResult, TestStatus};
    use crate::tickets::MockTicketTracker;
    use crate::Error;
    use chrono::{Duration, Utc};

    async fn seeded_store(with_host: bool) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .save_task(Task {
                id: "t0".to_string(),
                display_name: "jsCore".to_string(),
                build_variant: "linux-64".to_string(),
                project: "mci".to_string(),
                execution: 0,
                host_id: "h0".to_string(),
                test_results: vec![
                    TestResult {
                        test_file: "jstests/core/a.js".to_string(),
                        url: "http://logs/a".to_string(),
                        status: TestStatus::Fail,
                    },
                    TestResult {
                        test_file: "jstests/core/b.js".to_string(),
                        url: "http://logs/b".to_string(),
                        status: TestStatus::Fail,
                    },
                ],
            })
            .await
            .unwrap();
        if with_host {
            store
                .save_host(Host {
                    id: "h0".to_string(),
                    host: "ec2-0.compute.amazonaws.com".to_string(),
                    distro: "rhel80".to_string(),
                    owner: "ci".to_string(),
                    expiration_time: Utc::now() + Duration::days(1),
                })
                .await
                .unwrap();
        }
        store
    }

    fn config() -> TicketConfig {
        let mut config = TicketConfig::default();
        config.projects.insert("mci".to_string(), "BF".to_string());
        config
    }

    fn input(tests: &[&str]) -> FileTicketInput {
        FileTicketInput {
            task: "t0".to_string(),
            tests: tests.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn created() -> CreatedTicket {
        CreatedTicket {
            id: "10001".to_string(),
            key: "BF-1".to_string(),
            url: "http://jira/rest/api/2/issue/10001".to_string(),
        }
    }

    #[tokio::test]
    async fn test_file_ticket_success() {
        let mut tracker = MockTicketTracker::new();
        tracker
            .expect_create_ticket()
            .withf(|req: &TicketRequest| {
                req.project == "BF"
                    && req.summary == "a.js, b.js"
                    && req.description.contains("[Logs|http://logs/a]")
                    && req.description.contains("[Logs|http://logs/b]")
                    && req
                        .description
                        .contains("http://ci/task_history/mci/jsCore#b.js=fail")
                    && req.description.contains("[~alice]")
                    && req.assignee == "alice"
                    && req.reporter == "alice"
            })
            .times(1)
            .returning(|_| Ok(created()));

        let filer = TicketFiler::new(seeded_store(true).await, Arc::new(tracker), config(), "http://ci");
        let ticket = filer
            .file_ticket(Some("alice"), &input(&["jstests/core/a.js", "jstests/core/b.js"]))
            .await
            .unwrap();
        assert_eq!(ticket.key, "BF-1");
    }

    #[tokio::test]
    async fn test_unauthenticated_request_files_nothing() {
        let mut tracker = MockTicketTracker::new();
        tracker.expect_create_ticket().times(0);

        let filer = TicketFiler::new(seeded_store(true).await, Arc::new(tracker), config(), "http://ci");
        let err = filer.file_ticket(None, &input(&[])).await.unwrap_err();
        assert!(matches!(err, FilingError::Unauthorized));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_task_is_not_found() {
        let mut tracker = MockTicketTracker::new();
        tracker.expect_create_ticket().times(0);

        let filer = TicketFiler::new(Arc::new(MemoryStore::new()), Arc::new(tracker), config(), "http://ci");
        let err = filer.file_ticket(Some("alice"), &input(&[])).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_host_is_internal() {
        let mut tracker = MockTicketTracker::new();
        tracker.expect_create_ticket().times(0);

        let filer = TicketFiler::new(seeded_store(false).await, Arc::new(tracker), config(), "http://ci");
        let err = filer.file_ticket(Some("alice"), &input(&[])).await.unwrap_err();
        assert!(matches!(err, FilingError::HostNotFound { .. }));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unmapped_project_is_bad_request() {
        let mut tracker = MockTicketTracker::new();
        tracker.expect_create_ticket().times(0);

        let filer = TicketFiler::new(
            seeded_store(true).await,
            Arc::new(tracker),
            TicketConfig::default(),
            "http://ci",
        );
        let err = filer.file_ticket(Some("alice"), &input(&[])).await.unwrap_err();
        assert!(matches!(err, FilingError::NoProject(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_request() {
        let mut tracker = MockTicketTracker::new();
        tracker
            .expect_create_ticket()
            .times(1)
            .returning(|_| Err(Error::Upstream("HTTP status '503 Service Unavailable'".to_string())));

        let filer = TicketFiler::new(seeded_store(true).await, Arc::new(tracker), config(), "http://ci");
        let err = filer.file_ticket(Some("alice"), &input(&[])).await.unwrap_err();
        assert!(matches!(err, FilingError::Upstream(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_internal() {
        let mut tracker = MockTicketTracker::new();
        tracker.expect_create_ticket().times(0);

        let filer = TicketFiler::new(seeded_store(true).await, Arc::new(tracker), config(), "http://ci");
        let err = filer
            .file_ticket_from_body(Some("alice"), b"{not json")
            .await
            .unwrap_err();
        assert!(matches!(err, FilingError::Decode(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_no_selected_tests_summarizes_task() {
        let mut tracker = MockTicketTracker::new();
        tracker
            .expect_create_ticket()
            .withf(|req: &TicketRequest| req.summary == "jsCore failure")
            .times(1)
            .returning(|_| Ok(created()));

        let filer = TicketFiler::new(seeded_store(true).await, Arc::new(tracker), config(), "http://ci");
        assert!(filer.file_ticket(Some("alice"), &input(&[])).await.is_ok());
    }
}
