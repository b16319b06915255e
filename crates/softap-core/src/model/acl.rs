use serde::{Deserialize, Serialize};

use super::MacAddress;

/// One persisted allow-list record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
    pub mac: MacAddress,
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AccessControlEntry {
    pub fn new(mac: MacAddress, name: Option<String>) -> Self {
        Self {
            mac,
            blocked: false,
            name,
        }
    }
}
