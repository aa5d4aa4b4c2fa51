use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const SELECTOR_ID: &str = "id";
pub const SELECTOR_OBJECT: &str = "object";
pub const SELECTOR_OWNER: &str = "owner";

/// A (type, data) matching key binding subscriptions to events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    #[serde(rename = "type")]
    pub selector_type: String,
    pub data: String,
}

impl Selector {
    pub fn new(selector_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            selector_type: selector_type.into(),
            data: data.into(),
        }
    }
}

/// Returns true when every subscription selector has an exact counterpart
/// among the event's selectors.
///
/// A subscription without selectors is a configuration error rather than a
/// wildcard, so it is reported as `Error::Validation`.
pub fn matches(subscription_selectors: &[Selector], event_selectors: &[Selector]) -> Result<bool> {
    if subscription_selectors.is_empty() {
        return Err(Error::Validation(
            "subscription must specify at least one selector".to_string(),
        ));
    }

    Ok(subscription_selectors
        .iter()
        .all(|wanted| event_selectors.iter().any(|have| have == wanted)))
}
