use std::collections::HashMap;

use super::{HostTriggers, Trigger, VolumeTriggers};
use crate::event::{Event, ResourceType};
use crate::store::Entity;
use crate::{Error, Result};

/// Builds a trigger bound to an event and the entity it references.
pub type TriggerFactory = fn(&Event, Entity) -> Result<Trigger>;

/// Maps resource types to trigger factories. Populated once at startup and
/// read-only afterwards.
#[derive(Clone)]
pub struct Registry {
    factories: HashMap<ResourceType, TriggerFactory>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(mut self, resource_type: ResourceType, factory: TriggerFactory) -> Self {
        self.factories.insert(resource_type, factory);
        self
    }

    pub fn resolve(&self, resource_type: ResourceType) -> Result<TriggerFactory> {
        self.factories
            .get(&resource_type)
            .copied()
            .ok_or(Error::UnsupportedResourceType(resource_type))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::empty()
            .register(ResourceType::Host, HostTriggers::from_event)
            .register(ResourceType::Volume, VolumeTriggers::from_event)
    }
}
