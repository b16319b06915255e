// ── Status and notifications ──

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::MacAddress;

/// The two states of the soft AP state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MachineState {
    #[default]
    Idle,
    Started,
}

/// AP status announced to listeners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApStatus {
    #[default]
    Disabled,
    Enabling,
    Enabled,
    Disabling,
    Failed,
}

/// Why a start (or a running AP) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StartFailure {
    General,
    NoChannel,
}

/// Notifications fanned out to every subscriber of the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HotspotEvent {
    StatusChanged {
        status: ApStatus,
        previous: ApStatus,
        failure: Option<StartFailure>,
    },
    ClientsChanged,
    ClientIpReady {
        mac: MacAddress,
        ip: IpAddr,
        name: Option<String>,
    },
    WpsOverlap,
    WpsCheckPinFailed,
}

/// Point-in-time view of the soft AP, refreshed after every processed message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SoftApStatus {
    pub state: MachineState,
    pub ap: ApStatus,
    pub failure: Option<StartFailure>,
    pub interface: Option<String>,
    pub connected: usize,
    pub interface_up: bool,
    pub auto_disable_deadline: Option<DateTime<Utc>>,
}
