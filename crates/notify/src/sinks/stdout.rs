use std::io::{self, Stdout, Write};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::NotificationSink;
use crate::config::{SinkConfig, SinkFormat};
use crate::notification::Notification;
use crate::Result;

/// Writes notifications to a stream, one JSON document or text block each.
pub struct StdoutSink<W: Write + Send = Stdout> {
    name: String,
    format: SinkFormat,
    pretty: bool,
    writer: Mutex<W>,
}

impl StdoutSink<Stdout> {
    pub fn new(config: &SinkConfig) -> Self {
        Self::with_writer(config, io::stdout())
    }
}

impl<W: Write + Send> StdoutSink<W> {
    pub fn with_writer(config: &SinkConfig, writer: W) -> Self {
        Self {
            name: "stdout".to_string(),
            format: config.format,
            pretty: config.pretty,
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn format_one(&self, notification: &Notification) -> Result<String> {
        match self.format {
            SinkFormat::Json if self.pretty => Ok(serde_json::to_string_pretty(notification)?),
            SinkFormat::Json => Ok(serde_json::to_string(notification)?),
            SinkFormat::Text => {
                let (subject, body) = notification.payload.text();
                let mut out = format!(
                    "[{}] to {} ({})",
                    notification.payload.channel(),
                    notification.subscriber.target,
                    notification.trigger
                );
                if !subject.is_empty() {
                    out.push_str("\nSubject: ");
                    out.push_str(subject);
                }
                out.push('\n');
                out.push_str(body.trim());
                Ok(out)
            }
        }
    }
}

#[async_trait]
impl<W: Write + Send> NotificationSink for StdoutSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, notifications: &[Notification]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        for notification in notifications {
            let line = self.format_one(notification)?;
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Subscriber, SubscriberType};
    use crate::notification::{EmailPayload, Payload, SlackPayload};

    fn notification(payload: Payload) -> Notification {
        Notification::new(
            "e0",
            "s0",
            "expiration",
            Subscriber {
                subscriber_type: SubscriberType::Email,
                target: "alice@example.com".to_string(),
            },
            payload,
        )
    }

    fn email() -> Notification {
        notification(Payload::Email(EmailPayload {
            subject: "Volume termination reminder".to_string(),
            body: "Your volume with id v0 will be terminated at soon.".to_string(),
            headers: Default::default(),
        }))
    }

    fn config(format: SinkFormat, pretty: bool) -> SinkConfig {
        SinkConfig { format, pretty }
    }

    #[tokio::test]
    async fn test_json_lines() {
        let sink = StdoutSink::with_writer(&config(SinkFormat::Json, false), Vec::new());
        sink.deliver(&[email(), email()]).await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["event_id"], "e0");
        assert_eq!(value["payload"]["type"], "email");
        assert_eq!(value["payload"]["subject"], "Volume termination reminder");
    }

    #[tokio::test]
    async fn test_json_pretty() {
        let sink = StdoutSink::with_writer(&config(SinkFormat::Json, true), Vec::new());
        sink.deliver(&[email()]).await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.lines().count() > 1);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["subscription_id"], "s0");
    }

    #[tokio::test]
    async fn test_text_format() {
        let sink = StdoutSink::with_writer(&config(SinkFormat::Text, false), Vec::new());
        let slack = notification(Payload::Slack(SlackPayload {
            body: "Your volume with id v0 will be terminated at soon.".to_string(),
        }));
        sink.deliver(&[email(), slack]).await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("[email] to alice@example.com (expiration)\nSubject: Volume termination reminder"));
        assert!(out.contains("[slack] to alice@example.com (expiration)\nYour volume with id v0"));
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let sink = StdoutSink::with_writer(&SinkConfig::default(), Vec::new());
        sink.deliver(&[]).await.unwrap();
        assert_eq!(sink.name(), "stdout");
        assert!(sink.into_inner().is_empty());
    }
}
