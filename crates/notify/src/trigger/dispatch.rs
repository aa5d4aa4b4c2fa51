use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::Registry;
use crate::config::NotifyConfig;
use crate::event::{matches, Event, Subscription};
use crate::metrics::{ALERTS_SUPPRESSED_TOTAL, EVENTS_UNPROCESSABLE_TOTAL, NOTIFICATIONS_TOTAL};
use crate::notification::{assemble, Notification};
use crate::store::Store;
use crate::{Error, Result};

/// Turns persisted events into notifications.
///
/// One event is processed as a sequential pipeline: resolve the trigger,
/// load the entity, match subscriptions, fire, assemble, then record the
/// alert. Distinct events may be dispatched concurrently.
pub struct Dispatcher {
    registry: Registry,
    store: Arc<dyn Store>,
    config: NotifyConfig,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, config: NotifyConfig) -> Self {
        Self::with_registry(Registry::default(), store, config)
    }

    pub fn with_registry(registry: Registry, store: Arc<dyn Store>, config: NotifyConfig) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    pub async fn notifications_from_event(&self, event: &Event) -> Result<Vec<Notification>> {
        self.notifications_at(event, Utc::now()).await.map_err(|e| {
            if matches!(e, Error::UnsupportedResourceType(_) | Error::NotFound(_)) {
                EVENTS_UNPROCESSABLE_TOTAL.inc();
            }
            error!(
                "Failed to process event {} for {} {}: {}",
                event.id, event.resource_type, event.resource_id, e
            );
            e
        })
    }

    async fn notifications_at(&self, event: &Event, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        let factory = self.registry.resolve(event.resource_type)?;
        let entity = self.store.load_entity(event).await?;
        let trigger = factory(event, entity)?;
        let event_selectors = trigger.selectors();

        let subscriptions = self.store.find_subscriptions(event.resource_type).await?;
        let mut by_trigger: BTreeMap<&str, Vec<&Subscription>> = BTreeMap::new();
        for subscription in &subscriptions {
            match matches(&subscription.selectors, &event_selectors) {
                Ok(true) => by_trigger
                    .entry(subscription.trigger.as_str())
                    .or_default()
                    .push(subscription),
                Ok(false) => {}
                Err(e) => warn!("Skipping subscription {}: {}", subscription.id, e),
            }
        }

        let mut notifications = Vec::new();
        for (name, subscriptions) in by_trigger {
            let fired = trigger.fire(name, &self.config, now).map_err(|e| {
                error!(
                    "Failed to evaluate trigger '{}' for {} {} (event {}): {}",
                    name, event.resource_type, event.resource_id, event.id, e
                );
                e
            })?;
            let firing = match fired {
                Some(firing) => firing,
                None => {
                    debug!("Trigger '{}' did not fire for event {}", name, event.id);
                    continue;
                }
            };

            let mut batch = Vec::new();
            for subscription in subscriptions {
                let assembled = assemble(subscription, event, &firing).map_err(|e| {
                    error!(
                        "Failed to render trigger '{}' for subscription {} on {} {} (event {}): {}",
                        name, subscription.id, event.resource_type, event.resource_id, event.id, e
                    );
                    e
                })?;
                batch.extend(assembled);
            }
            if batch.is_empty() {
                continue;
            }

            // Recorded only once something was built; delivery outcome does
            // not matter past this point.
            if let Some(record) = &firing.alert {
                let existed = self.store.exists_or_create(record).await.map_err(|e| {
                    error!(
                        "Failed to record alert for trigger '{}' on {} {} (event {}): {}",
                        name, event.resource_type, event.resource_id, event.id, e
                    );
                    e
                })?;
                if existed {
                    info!(
                        "Suppressing trigger '{}' for {} {}: already alerted ({:?})",
                        name, event.resource_type, event.resource_id, record.discriminator
                    );
                    ALERTS_SUPPRESSED_TOTAL.inc();
                    continue;
                }
            }

            for notification in &batch {
                NOTIFICATIONS_TOTAL
                    .with_label_values(&[notification.payload.channel()])
                    .inc();
            }
            notifications.extend(batch);
        }

        Ok(notifications)
    }
}
