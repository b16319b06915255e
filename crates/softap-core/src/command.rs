// ── Controller commands ──
//
// Requests accepted by the state machine. Each is sent with a oneshot
// reply channel and processed in arrival order.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::config::SoftApConfiguration;
use crate::error::CoreError;
use crate::model::{AccessControlEntry, MacAddress};

/// How a WPS session is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WpsConfig {
    PushButton,
    /// PIN read from the enrollee; validated by the daemon first.
    Pin(String),
}

#[derive(Debug, Clone)]
pub enum Command {
    Start(Box<SoftApConfiguration>),
    Stop,
    BlockClient(MacAddress),
    UnblockClient(MacAddress),
    /// `allow_connected` adds every connected, unblocked client to the
    /// allow-list before restricting access.
    SetAllDevicesAllowed { enabled: bool, allow_connected: bool },
    AllowDevice { mac: MacAddress, name: Option<String> },
    DisallowDevice(MacAddress),
    GetAllowedDevices,
    StartWps(WpsConfig),
    SetAutoDisable(Duration),
}

/// Outcome of a processed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandResult {
    Ok,
    /// The daemon was asked; `false` if it refused or the call failed.
    Remote(bool),
    AllowedDevices(Vec<AccessControlEntry>),
}

impl CommandResult {
    /// `false` only for a refused remote call.
    pub fn succeeded(&self) -> bool {
        !matches!(self, Self::Remote(false))
    }
}

pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: oneshot::Sender<Result<CommandResult, CoreError>>,
}
