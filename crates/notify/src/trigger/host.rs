use chrono::{DateTime, Utc};
use tracing::debug;

use super::{expiration_warning_threshold, Firing, Trigger};
use crate::config::NotifyConfig;
use crate::event::{Event, EventType, Selector, SELECTOR_ID, SELECTOR_OBJECT, SELECTOR_OWNER, TRIGGER_EXPIRATION};
use crate::notification::{ExpirationData, ExpiringResource, TemplateData};
use crate::store::{AlertRecord, Entity, Host};
use crate::{Error, Result};

pub const HOST_EXPIRATION_WARNING: &str = "host_expiration_warning";

type HostTriggerFn = fn(&HostTriggers, &NotifyConfig, DateTime<Utc>) -> Result<Option<Firing>>;

#[derive(Debug, Clone)]
pub struct HostTriggers {
    event: Event,
    host: Host,
}

impl HostTriggers {
    pub fn new(event: Event, host: Host) -> Self {
        Self { event, host }
    }

    pub fn from_event(event: &Event, entity: Entity) -> Result<Trigger> {
        match entity {
            Entity::Host(host) => Ok(Trigger::Host(Self::new(event.clone(), host))),
            other => Err(Error::Internal(format!(
                "host trigger for event {} was given a {}",
                event.id,
                other.kind()
            ))),
        }
    }

    fn lookup(name: &str) -> Option<HostTriggerFn> {
        match name {
            TRIGGER_EXPIRATION => Some(Self::expiration),
            _ => None,
        }
    }

    pub fn selectors(&self) -> Vec<Selector> {
        vec![
            Selector::new(SELECTOR_ID, &self.host.id),
            Selector::new(SELECTOR_OBJECT, "host"),
            Selector::new(SELECTOR_OWNER, &self.host.owner),
        ]
    }

    pub fn fire(&self, name: &str, config: &NotifyConfig, now: DateTime<Utc>) -> Result<Option<Firing>> {
        match Self::lookup(name) {
            Some(trigger) => trigger(self, config, now),
            None => {
                debug!("Host trigger '{}' is not defined, skipping event {}", name, self.event.id);
                Ok(None)
            }
        }
    }

    fn expiration(&self, config: &NotifyConfig, now: DateTime<Utc>) -> Result<Option<Firing>> {
        if self.event.event_type != EventType::HostExpirationWarningSent {
            return Ok(None);
        }
        let Some(hours) =
            expiration_warning_threshold(self.host.expiration_time, now, &config.expiration_warning_hours)
        else {
            return Ok(None);
        };

        Ok(Some(Firing {
            trigger: TRIGGER_EXPIRATION.to_string(),
            data: TemplateData::Expiration(ExpirationData {
                kind: ExpiringResource::Host,
                id: self.host.id.clone(),
                distro: Some(self.host.distro.clone()),
                expiration_time: self.host.expiration_time,
                url: format!("{}/host/{}", config.ui_root, self.host.id),
            }),
            selectors: self.selectors(),
            alert: Some(AlertRecord::new(
                &self.host.id,
                HOST_EXPIRATION_WARNING,
                Some(hours.to_string()),
            )),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ResourceType;
    use crate::store::Volume;
    use chrono::Duration;

    fn host(expires_in: Duration) -> Host {
        Host {
            id: "h0".to_string(),
            host: "ec2-0.compute.amazonaws.com".to_string(),
            distro: "ubuntu2204".to_string(),
            owner: "alice".to_string(),
            expiration_time: Utc::now() + expires_in,
        }
    }

    fn warning_event() -> Event {
        Event::new(ResourceType::Host, EventType::HostExpirationWarningSent, "h0")
    }

    #[test]
    fn test_expiration_fires_within_threshold() {
        let triggers = HostTriggers::new(warning_event(), host(Duration::hours(1)));
        let firing = triggers
            .fire(TRIGGER_EXPIRATION, &NotifyConfig::default(), Utc::now())
            .unwrap()
            .unwrap();

        let alert = firing.alert.unwrap();
        assert_eq!(alert.resource_id, "h0");
        assert_eq!(alert.alert_type, HOST_EXPIRATION_WARNING);
        assert_eq!(alert.discriminator.as_deref(), Some("2"));

        let TemplateData::Expiration(data) = firing.data else {
            panic!("expected expiration data");
        };
        assert_eq!(data.url, "http://localhost:9090/host/h0");
        assert_eq!(data.distro.as_deref(), Some("ubuntu2204"));
    }

    #[test]
    fn test_expiration_ignores_other_event_types() {
        let event = Event::new(ResourceType::Host, EventType::TaskFinished, "h0");
        let triggers = HostTriggers::new(event, host(Duration::hours(1)));
        assert!(triggers
            .fire(TRIGGER_EXPIRATION, &NotifyConfig::default(), Utc::now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unknown_trigger_is_a_no_op() {
        let triggers = HostTriggers::new(warning_event(), host(Duration::hours(1)));
        assert!(triggers
            .fire("idle", &NotifyConfig::default(), Utc::now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_selectors_describe_the_host() {
        let triggers = HostTriggers::new(warning_event(), host(Duration::hours(1)));
        assert_eq!(
            triggers.selectors(),
            vec![
                Selector::new(SELECTOR_ID, "h0"),
                Selector::new(SELECTOR_OBJECT, "host"),
                Selector::new(SELECTOR_OWNER, "alice"),
            ]
        );
    }

    #[test]
    fn test_factory_rejects_other_entities() {
        let volume = Volume {
            id: "v0".to_string(),
            owner: "alice".to_string(),
            host_id: None,
            expiration_time: Utc::now(),
        };
        let err = HostTriggers::from_event(&warning_event(), Entity::Volume(volume)).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
