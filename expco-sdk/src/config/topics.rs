//! Event topics the coordinator reacts to.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventTopics {
    /// Topic of events carrying a freshly taken image.
    pub new_image: String,
    /// Topic of device status events.
    pub status: String,
}

impl Default for EventTopics {
    fn default() -> Self {
        Self {
            new_image: "plant-growth-observation_new-image".to_string(),
            status: "plant-growth-observation_status".to_string(),
        }
    }
}
