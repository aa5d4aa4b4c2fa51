use std::collections::BTreeMap;

use tracing::warn;

use super::{Notification, Payload, PayloadRenderer};
use crate::event::{Event, Selector, Subscription};
use crate::trigger::Firing;
use crate::Result;

const HEADER_PREFIX: &str = "X-Notify-";

fn selector_headers(selectors: &[Selector]) -> BTreeMap<String, Vec<String>> {
    let mut headers = BTreeMap::new();
    for selector in selectors {
        headers
            .entry(format!("{}{}", HEADER_PREFIX, selector.selector_type))
            .or_insert_with(Vec::new)
            .push(selector.data.clone());
    }
    headers
}

/// Render a firing for one subscription's subscriber and package the result.
///
/// A subscriber whose channel cannot render this kind of data is skipped
/// with a warning, which yields an empty list rather than an error.
pub fn assemble(subscription: &Subscription, event: &Event, firing: &Firing) -> Result<Vec<Notification>> {
    let subscriber_type = subscription.subscriber.subscriber_type;
    let renderer = match PayloadRenderer::for_channel(subscriber_type) {
        Some(renderer) if renderer.supports(&firing.data) => renderer,
        _ => {
            warn!(
                "Subscription {} uses channel {} which cannot render trigger '{}' for event {}",
                subscription.id, subscriber_type, firing.trigger, event.id
            );
            return Ok(Vec::new());
        }
    };

    let mut payload = renderer.render(&firing.data)?;
    if let Payload::Email(email) = &mut payload {
        email.headers = selector_headers(&firing.selectors);
        email
            .headers
            .insert(format!("{}Trigger", HEADER_PREFIX), vec![firing.trigger.clone()]);
    }

    Ok(vec![Notification::new(
        &event.id,
        &subscription.id,
        &firing.trigger,
        subscription.subscriber.clone(),
        payload,
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        EventType, ResourceType, Subscriber, SubscriberType, SELECTOR_ID, SELECTOR_OBJECT,
        TRIGGER_EXPIRATION,
    };
    use crate::notification::{ExpirationData, ExpiringResource, TemplateData};
    use chrono::{Duration, Utc};

    fn firing() -> Firing {
        Firing {
            trigger: TRIGGER_EXPIRATION.to_string(),
            data: TemplateData::Expiration(ExpirationData {
                kind: ExpiringResource::Volume,
                id: "v0".to_string(),
                distro: None,
                expiration_time: Utc::now() + Duration::hours(2),
                url: "http://localhost:9090/volume/v0".to_string(),
            }),
            selectors: vec![
                Selector::new(SELECTOR_ID, "v0"),
                Selector::new(SELECTOR_OBJECT, "volume"),
            ],
            alert: None,
        }
    }

    fn subscription(subscriber_type: SubscriberType) -> Subscription {
        Subscription::by_id(
            ResourceType::Volume,
            TRIGGER_EXPIRATION,
            "v0",
            Subscriber {
                subscriber_type,
                target: "target".to_string(),
            },
        )
    }

    #[test]
    fn test_email_notification_carries_ids_and_headers() {
        let event = Event::new(ResourceType::Volume, EventType::VolumeExpirationWarningSent, "v0");
        let sub = subscription(SubscriberType::Email);

        let notifications = assemble(&sub, &event, &firing()).unwrap();
        assert_eq!(notifications.len(), 1);
        let n = &notifications[0];
        assert_eq!(n.event_id, event.id);
        assert_eq!(n.subscription_id, sub.id);
        assert_eq!(n.subscriber.target, "target");

        let Payload::Email(email) = &n.payload else {
            panic!("expected email payload");
        };
        assert_eq!(email.headers["X-Notify-id"], vec!["v0".to_string()]);
        assert_eq!(email.headers["X-Notify-object"], vec!["volume".to_string()]);
        assert_eq!(email.headers["X-Notify-Trigger"], vec![TRIGGER_EXPIRATION.to_string()]);
    }

    #[test]
    fn test_unrenderable_channel_is_skipped() {
        let event = Event::new(ResourceType::Volume, EventType::VolumeExpirationWarningSent, "v0");
        let sub = subscription(SubscriberType::JiraIssue);

        assert!(assemble(&sub, &event, &firing()).unwrap().is_empty());
    }
}
