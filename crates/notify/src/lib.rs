//! Event trigger and notification dispatch for CI resources.
//!
//! Events about hosts and volumes are matched against subscriptions, turned
//! into email or chat notifications at most once per alert, and handed to a
//! delivery sink. Build failures can be filed as issue-tracker tickets.

pub mod config;
pub mod event;
pub mod metrics;
pub mod notification;
pub mod server;
pub mod sinks;
pub mod store;
pub mod template;
pub mod tickets;
pub mod trigger;

use thiserror::Error;

use crate::event::ResourceType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(ResourceType),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_resource_type_names_the_type() {
        let err = Error::UnsupportedResourceType(ResourceType::Task);
        assert_eq!(err.to_string(), "Unsupported resource type: TASK");
    }

    #[test]
    fn json_errors_convert() {
        let json_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::SerdeJson(_)));
    }
}
