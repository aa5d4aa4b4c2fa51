//! Build-failure ticket filing.
//!
//! A filing request names a task and a subset of its failing tests. The
//! filer looks both up, renders a ticket through the ticket renderer and
//! hands the result to the issue tracker.

mod filer;
mod jira;

pub use filer::{FileTicketInput, FilingError, TicketFiler};
pub use jira::{CreatedTicket, JiraClient, TicketTracker};

#[cfg(test)]
pub use jira::MockTicketTracker;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use tera::Context;

use crate::config::TicketFieldIds;
use crate::store::{Host, Task};
use crate::template::{self, TICKET_DESCRIPTION};
use crate::Result;

/// Above this many selected tests the summary stops listing names.
const MAX_SUMMARY_TESTS: usize = 4;

/// One selected failing test as it appears in a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestFailure {
    pub name: String,
    pub url: String,
    pub history_url: String,
}

/// Everything the ticket renderer needs.
#[derive(Debug, Clone, Serialize)]
pub struct TicketData {
    pub task: Task,
    pub host: Host,
    pub user_id: String,
    pub tests: Vec<TestFailure>,
    pub project_key: String,
    pub ui_root: String,
    pub fields: TicketFieldIds,
    pub issue_type: String,
}

/// A create-ticket request ready for the issue tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRequest {
    pub project: String,
    pub summary: String,
    pub description: String,
    pub failing_tasks: Vec<String>,
    pub failing_variants: Vec<String>,
    pub projects: Vec<String>,
    pub issue_type: String,
    pub assignee: String,
    pub reporter: String,
    pub field_ids: TicketFieldIds,
}

impl TicketRequest {
    /// The tracker's `fields` object, with custom fields keyed by their
    /// configured ids.
    pub fn fields(&self) -> JsonValue {
        let mut fields = Map::new();
        fields.insert("project".to_string(), json!({ "key": self.project }));
        fields.insert("summary".to_string(), json!(self.summary));
        fields.insert("description".to_string(), json!(self.description));
        fields.insert(self.field_ids.failing_tasks.clone(), json!(self.failing_tasks));
        fields.insert(self.field_ids.failing_variants.clone(), json!(self.failing_variants));
        fields.insert(self.field_ids.project.clone(), json!(self.projects));
        fields.insert("issuetype".to_string(), json!({ "name": self.issue_type }));
        fields.insert("assignee".to_string(), json!({ "name": self.assignee }));
        fields.insert("reporter".to_string(), json!({ "name": self.reporter }));
        JsonValue::Object(fields)
    }
}

/// Short name of a test file: the last path segment, after trailing
/// separators are dropped. `/` is checked before `\`.
pub fn clean_test_name(path: &str) -> &str {
    let mut path = path;
    loop {
        let Some(idx) = path.rfind('/').or_else(|| path.rfind('\\')) else {
            return path;
        };
        if idx == path.len() - 1 {
            path = &path[..idx];
        } else {
            return &path[idx + 1..];
        }
    }
}

pub fn history_url(ui_root: &str, task: &Task, test_name: &str) -> String {
    format!(
        "{}/task_history/{}/{}#{}=fail",
        ui_root, task.project, task.display_name, test_name
    )
}

pub fn summary(task_name: &str, tests: &[TestFailure]) -> String {
    match tests.len() {
        // most likely a compile failure
        0 => format!("{} failure", task_name),
        n if n > MAX_SUMMARY_TESTS => format!("{} failures", task_name),
        _ => tests
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Failing tests of `task` whose file is among `selected`, in task order.
pub fn select_failures(ui_root: &str, task: &Task, selected: &[String]) -> Vec<TestFailure> {
    task.test_results
        .iter()
        .filter(|result| selected.iter().any(|s| *s == result.test_file))
        .map(|result| {
            let name = clean_test_name(&result.test_file);
            TestFailure {
                name: name.to_string(),
                url: result.url.clone(),
                history_url: history_url(ui_root, task, name),
            }
        })
        .collect()
}

pub fn render_ticket(data: &TicketData) -> Result<TicketRequest> {
    let context = Context::from_serialize(data)
        .map_err(|e| crate::Error::Template(format!("invalid ticket data: {}", e)))?;
    let description = template::render(TICKET_DESCRIPTION, &context)?;

    Ok(TicketRequest {
        project: data.project_key.clone(),
        summary: summary(&data.task.display_name, &data.tests),
        description,
        failing_tasks: vec![data.task.display_name.clone()],
        failing_variants: vec![data.task.build_variant.clone()],
        projects: vec![data.task.project.clone()],
        issue_type: data.issue_type.clone(),
        assignee: data.user_id.clone(),
        reporter: data.user_id.clone(),
        field_ids: data.fields.clone(),
    })
}
