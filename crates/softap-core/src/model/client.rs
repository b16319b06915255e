use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MacAddress;

/// A station associated with the soft AP.
///
/// Blocked clients stay in the client table after they disconnect, so
/// `connected_at` is `None` for a blocked client that is currently away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotClient {
    pub mac: MacAddress,
    pub blocked: bool,
    pub name: Option<String>,
    /// Filled in by lease polling.
    pub ip: Option<IpAddr>,
    pub hostname: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl HotspotClient {
    pub fn connected(mac: MacAddress, at: DateTime<Utc>) -> Self {
        Self {
            mac,
            blocked: false,
            name: None,
            ip: None,
            hostname: None,
            connected_at: Some(at),
        }
    }

    /// Name shown to users: explicit name, then DHCP hostname.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.hostname.as_deref())
    }
}
