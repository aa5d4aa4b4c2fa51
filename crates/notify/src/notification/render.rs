use tera::Context;

use super::{EmailPayload, ExpirationData, ExpiringResource, Payload, SlackPayload, TemplateData};
use crate::event::SubscriberType;
use crate::template::{self, EXPIRATION_TIME_FORMAT};
use crate::tickets;
use crate::{Error, Result};

/// Channel-specific renderer, selected by subscriber type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadRenderer {
    Email,
    Slack,
    Ticket,
}

const RENDERERS: &[(SubscriberType, PayloadRenderer)] = &[
    (SubscriberType::Email, PayloadRenderer::Email),
    (SubscriberType::Slack, PayloadRenderer::Slack),
    (SubscriberType::JiraIssue, PayloadRenderer::Ticket),
];

struct ExpirationTemplates {
    email_subject: &'static str,
    email_body: &'static str,
    slack_body: &'static str,
}

fn expiration_templates(kind: ExpiringResource) -> ExpirationTemplates {
    match kind {
        ExpiringResource::Host => ExpirationTemplates {
            email_subject: template::HOST_EXPIRATION_EMAIL_SUBJECT,
            email_body: template::HOST_EXPIRATION_EMAIL_BODY,
            slack_body: template::HOST_EXPIRATION_SLACK_BODY,
        },
        ExpiringResource::Volume => ExpirationTemplates {
            email_subject: template::VOLUME_EXPIRATION_EMAIL_SUBJECT,
            email_body: template::VOLUME_EXPIRATION_EMAIL_BODY,
            slack_body: template::VOLUME_EXPIRATION_SLACK_BODY,
        },
    }
}

fn expiration_context(data: &ExpirationData) -> Context {
    let mut context = Context::new();
    context.insert("id", &data.id);
    context.insert(
        "expiration_time",
        &data.expiration_time.format(EXPIRATION_TIME_FORMAT).to_string(),
    );
    context.insert("url", &data.url);
    if let Some(distro) = &data.distro {
        context.insert("distro", distro);
    }
    context
}

impl PayloadRenderer {
    pub fn for_channel(subscriber_type: SubscriberType) -> Option<Self> {
        RENDERERS
            .iter()
            .find(|(channel, _)| *channel == subscriber_type)
            .map(|(_, renderer)| *renderer)
    }

    /// Whether this renderer knows how to turn `data` into a payload.
    pub fn supports(&self, data: &TemplateData) -> bool {
        matches!(
            (self, data),
            (PayloadRenderer::Email | PayloadRenderer::Slack, TemplateData::Expiration(_))
                | (PayloadRenderer::Ticket, TemplateData::BuildFailure(_))
        )
    }

    pub fn render(&self, data: &TemplateData) -> Result<Payload> {
        match (self, data) {
            (PayloadRenderer::Email, TemplateData::Expiration(data)) => {
                let templates = expiration_templates(data.kind);
                let context = expiration_context(data);
                Ok(Payload::Email(EmailPayload {
                    subject: template::render(templates.email_subject, &context)?,
                    body: template::render(templates.email_body, &context)?,
                    headers: Default::default(),
                }))
            }
            (PayloadRenderer::Slack, TemplateData::Expiration(data)) => {
                let templates = expiration_templates(data.kind);
                let context = expiration_context(data);
                Ok(Payload::Slack(SlackPayload {
                    body: template::render(templates.slack_body, &context)?,
                }))
            }
            (PayloadRenderer::Ticket, TemplateData::BuildFailure(data)) => {
                Ok(Payload::JiraIssue(tickets::render_ticket(data)?))
            }
            (renderer, _) => Err(Error::Template(format!(
                "{:?} renderer cannot render this template data",
                renderer
            ))),
        }
    }
}
