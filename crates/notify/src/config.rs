use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::store::{DatabaseConfig, DatabaseType};
use crate::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    pub tickets: TicketConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

/// Settings shared by every trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Base URL for every link placed in a message.
    pub ui_root: String,
    /// Hours before expiration at which a warning is sent, one alert per
    /// threshold.
    pub expiration_warning_hours: Vec<i64>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            ui_root: "http://localhost:9090".to_string(),
            expiration_warning_hours: vec![12, 2],
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    pub host: String,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl fmt::Debug for JiraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JiraConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Issue tracker custom field identifiers filled on every filed ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketFieldIds {
    pub failing_tasks: String,
    pub failing_variants: String,
    pub project: String,
}

impl Default for TicketFieldIds {
    fn default() -> Self {
        Self {
            failing_tasks: "customfield_12950".to_string(),
            failing_variants: "customfield_14277".to_string(),
            project: "customfield_14278".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketConfig {
    pub jira: JiraConfig,
    /// CI project id -> ticket project key.
    #[serde(default)]
    pub projects: HashMap<String, String>,
    #[serde(default)]
    pub default_project: Option<String>,
    #[serde(default)]
    pub fields: TicketFieldIds,
    pub issue_type: String,
}

impl TicketConfig {
    pub fn project_key(&self, project: &str) -> Option<&str> {
        self.projects
            .get(project)
            .or(self.default_project.as_ref())
            .map(String::as_str)
    }
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            jira: JiraConfig {
                host: "http://localhost:8081".to_string(),
                username: String::new(),
                password: String::new(),
            },
            projects: HashMap::new(),
            default_project: None,
            fields: TicketFieldIds::default(),
            issue_type: "Build Failure".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub format: SinkFormat,
    #[serde(default)]
    pub pretty: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            format: SinkFormat::Json,
            pretty: false,
        }
    }
}

fn parse_hours(value: &str) -> crate::Result<Vec<i64>> {
    let hours = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<i64>() {
            Ok(hours) if hours > 0 => Ok(hours),
            _ => Err(Error::Config(format!("invalid warning threshold '{}'", s))),
        })
        .collect::<crate::Result<Vec<i64>>>()?;

    // An empty list would disable every expiration warning.
    if hours.is_empty() {
        return Err(Error::Config(
            "EXPIRATION_WARNING_HOURS must list at least one threshold".to_string(),
        ));
    }
    Ok(hours)
}

fn parse_projects(value: &str) -> crate::Result<HashMap<String, String>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((project, key)) if !project.trim().is_empty() && !key.trim().is_empty() => {
                Ok((project.trim().to_string(), key.trim().to_string()))
            }
            _ => Err(Error::Config(format!(
                "invalid ticket project mapping '{}', expected project=KEY",
                pair
            ))),
        })
        .collect()
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from a variable lookup, falling back to the
    /// defaults for anything unset.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        let defaults = Config::default();

        let db_type = match var("DATABASE_TYPE")
            .unwrap_or_else(|| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => DatabaseType::Sqlite,
            "memory" => DatabaseType::Memory,
            other => return Err(Error::Config(format!("unknown DATABASE_TYPE '{}'", other))),
        };

        let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(s) => s
                .parse()
                .map_err(|_| Error::Config(format!("invalid DATABASE_MAX_CONNECTIONS '{}'", s)))?,
            None => defaults.database.max_connections,
        };

        let sink_format = match var("SINK_FORMAT")
            .unwrap_or_else(|| "json".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => SinkFormat::Json,
            "text" => SinkFormat::Text,
            other => {
                return Err(Error::Config(format!(
                    "invalid SINK_FORMAT '{}', must be 'json' or 'text'",
                    other
                )))
            }
        };

        let config = Config {
            server: ServerConfig {
                addr: var("SERVER_ADDR").unwrap_or(defaults.server.addr),
            },
            database: DatabaseConfig {
                db_type,
                sqlite_path: var("SQLITE_PATH")
                    .map(PathBuf::from)
                    .or(defaults.database.sqlite_path),
                max_connections,
            },
            notify: NotifyConfig {
                ui_root: var("UI_ROOT")
                    .map(|root| root.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.notify.ui_root),
                expiration_warning_hours: match var("EXPIRATION_WARNING_HOURS") {
                    Some(hours) => parse_hours(&hours)?,
                    None => defaults.notify.expiration_warning_hours,
                },
            },
            tickets: TicketConfig {
                jira: JiraConfig {
                    host: var("JIRA_HOST").unwrap_or(defaults.tickets.jira.host),
                    username: var("JIRA_USERNAME").unwrap_or_default(),
                    password: var("JIRA_PASSWORD").unwrap_or_default(),
                },
                projects: match var("TICKET_PROJECTS") {
                    Some(projects) => parse_projects(&projects)?,
                    None => HashMap::new(),
                },
                default_project: var("TICKET_DEFAULT_PROJECT").filter(|s| !s.is_empty()),
                fields: TicketFieldIds {
                    failing_tasks: var("TICKET_FAILING_TASKS_FIELD")
                        .unwrap_or(defaults.tickets.fields.failing_tasks),
                    failing_variants: var("TICKET_FAILING_VARIANT_FIELD")
                        .unwrap_or(defaults.tickets.fields.failing_variants),
                    project: var("TICKET_PROJECT_FIELD").unwrap_or(defaults.tickets.fields.project),
                },
                issue_type: var("TICKET_ISSUE_TYPE").unwrap_or(defaults.tickets.issue_type),
            },
            sink: SinkConfig {
                format: sink_format,
                pretty: var("SINK_PRETTY")
                    .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
            },
        };

        if config.tickets.jira.username.is_empty() {
            tracing::warn!("JIRA_USERNAME is not set. Ticket filing may be rejected by the tracker.");
        }

        config.database.validate().map_err(Error::Config)?;

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
            database: DatabaseConfig::default(),
            notify: NotifyConfig::default(),
            tickets: TicketConfig::default(),
            sink: SinkConfig::default(),
        }
    }
}
