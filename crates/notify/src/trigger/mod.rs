//! Triggers decide whether an event warrants a notification and with what
//! data. One trigger type exists per resource kind; the registry maps a
//! resource type to the factory that builds it.

mod dispatch;
mod host;
mod registry;
mod volume;

pub use dispatch::Dispatcher;
pub use host::{HostTriggers, HOST_EXPIRATION_WARNING};
pub use registry::{Registry, TriggerFactory};
pub use volume::{VolumeTriggers, VOLUME_EXPIRATION_WARNING};

use chrono::{DateTime, Duration, Utc};

use crate::config::NotifyConfig;
use crate::event::Selector;
use crate::notification::TemplateData;
use crate::store::AlertRecord;
use crate::Result;

/// Outcome of a trigger whose conditions hold.
#[derive(Debug, Clone)]
pub struct Firing {
    pub trigger: String,
    pub data: TemplateData,
    /// Selectors describing the subject, carried into message metadata.
    pub selectors: Vec<Selector>,
    /// Dedup marker to record once a notification has been built. `None`
    /// for triggers that may fire repeatedly.
    pub alert: Option<AlertRecord>,
}

/// A trigger bound to one event and the entity it references.
/// Built fresh for every dispatch.
#[derive(Debug, Clone)]
pub enum Trigger {
    Host(HostTriggers),
    Volume(VolumeTriggers),
}

impl Trigger {
    pub fn selectors(&self) -> Vec<Selector> {
        match self {
            Trigger::Host(t) => t.selectors(),
            Trigger::Volume(t) => t.selectors(),
        }
    }

    /// Evaluate the named trigger. `Ok(None)` means the conditions do not
    /// hold (or the name is unknown for this resource kind).
    pub fn fire(&self, name: &str, config: &NotifyConfig, now: DateTime<Utc>) -> Result<Option<Firing>> {
        match self {
            Trigger::Host(t) => t.fire(name, config, now),
            Trigger::Volume(t) => t.fire(name, config, now),
        }
    }
}

/// Smallest configured warning threshold (in hours) the remaining lifetime
/// falls under. `None` once expired or while still beyond every threshold.
pub(crate) fn expiration_warning_threshold(
    expiration: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold_hours: &[i64],
) -> Option<i64> {
    let remaining = expiration - now;
    if remaining <= Duration::zero() {
        return None;
    }

    let mut thresholds: Vec<i64> = threshold_hours.iter().copied().filter(|h| *h > 0).collect();
    thresholds.sort_unstable();
    thresholds.into_iter().find(|h| remaining <= Duration::hours(*h))
}
