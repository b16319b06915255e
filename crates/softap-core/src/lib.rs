// softap-core: hostapd lifecycle, AP event monitor, soft AP state machine
// and MAC access control, on top of the softap-hal transport traits.

pub mod channel;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod hostapd_conf;
pub mod leases;
pub mod lifecycle;
mod machine;
pub mod model;
pub mod monitor;
pub mod platform;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult, WpsConfig};
pub use config::{ManagerConfig, RetryPolicy, Security, SoftApConfiguration, StatePaths, WpsDeviceInfo};
pub use controller::{Backends, SoftApController};
pub use error::CoreError;
pub use lifecycle::HostapdManager;
pub use monitor::{ApEvent, ApEventKind, ApMonitor, EventListener, HostapdConnector};
pub use platform::TetheringControl;
pub use store::{AccessControlStore, ClientTable, Settings, SettingsStore};
pub use stream::{ClientFilter, ClientStream};

pub use model::{
    AccessControlEntry, ApStatus, HotspotClient, HotspotEvent, MacAddress, MachineState,
    SoftApStatus, StartFailure,
};

pub use softap_hal::Band;
