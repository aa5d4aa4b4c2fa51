use chrono::{DateTime, Utc};
use tracing::debug;

use super::{expiration_warning_threshold, Firing, Trigger};
use crate::config::NotifyConfig;
use crate::event::{Event, EventType, Selector, SELECTOR_ID, SELECTOR_OBJECT, SELECTOR_OWNER, TRIGGER_EXPIRATION};
use crate::notification::{ExpirationData, ExpiringResource, TemplateData};
use crate::store::{AlertRecord, Entity, Volume};
use crate::{Error, Result};

pub const VOLUME_EXPIRATION_WARNING: &str = "volume_expiration_warning";

type VolumeTriggerFn = fn(&VolumeTriggers, &NotifyConfig, DateTime<Utc>) -> Result<Option<Firing>>;

#[derive(Debug, Clone)]
pub struct VolumeTriggers {
    event: Event,
    volume: Volume,
}

impl VolumeTriggers {
    pub fn new(event: Event, volume: Volume) -> Self {
        Self { event, volume }
    }

    pub fn from_event(event: &Event, entity: Entity) -> Result<Trigger> {
        match entity {
            Entity::Volume(volume) => Ok(Trigger::Volume(Self::new(event.clone(), volume))),
            other => Err(Error::Internal(format!(
                "volume trigger for event {} was given a {}",
                event.id,
                other.kind()
            ))),
        }
    }

    fn lookup(name: &str) -> Option<VolumeTriggerFn> {
        match name {
            TRIGGER_EXPIRATION => Some(Self::expiration),
            _ => None,
        }
    }

    pub fn selectors(&self) -> Vec<Selector> {
        vec![
            Selector::new(SELECTOR_ID, &self.volume.id),
            Selector::new(SELECTOR_OBJECT, "volume"),
            Selector::new(SELECTOR_OWNER, &self.volume.owner),
        ]
    }

    pub fn fire(&self, name: &str, config: &NotifyConfig, now: DateTime<Utc>) -> Result<Option<Firing>> {
        match Self::lookup(name) {
            Some(trigger) => trigger(self, config, now),
            None => {
                debug!("Volume trigger '{}' is not defined, skipping event {}", name, self.event.id);
                Ok(None)
            }
        }
    }

    fn expiration(&self, config: &NotifyConfig, now: DateTime<Utc>) -> Result<Option<Firing>> {
        if self.event.event_type != EventType::VolumeExpirationWarningSent {
            return Ok(None);
        }
        let Some(hours) =
            expiration_warning_threshold(self.volume.expiration_time, now, &config.expiration_warning_hours)
        else {
            return Ok(None);
        };

        Ok(Some(Firing {
            trigger: TRIGGER_EXPIRATION.to_string(),
            data: TemplateData::Expiration(ExpirationData {
                kind: ExpiringResource::Volume,
                id: self.volume.id.clone(),
                distro: None,
                expiration_time: self.volume.expiration_time,
                url: format!("{}/volume/{}", config.ui_root, self.volume.id),
            }),
            selectors: self.selectors(),
            alert: Some(AlertRecord::new(
                &self.volume.id,
                VOLUME_EXPIRATION_WARNING,
                Some(hours.to_string()),
            )),
        }))
    }
}
