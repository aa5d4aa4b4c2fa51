//! Delivery sinks. A sink owns transmission of assembled notifications;
//! the engine keeps no copy once they are handed over.

pub mod stdout;

pub use stdout::StdoutSink;

use async_trait::async_trait;

use crate::notification::Notification;
use crate::Result;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, notifications: &[Notification]) -> Result<()>;
}
