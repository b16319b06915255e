//! Transport binding to a remote hostapd daemon.
//!
//! This crate is the seam between the soft AP core and whatever actually
//! carries calls to hostapd. The core only ever sees the traits in
//! [`binding`]:
//!
//! - **[`ServiceRegistry`]**: discovery of the hostapd service and
//!   "service became available" notifications.
//! - **[`Hostapd`]**: the daemon root: interface enumeration and lookup.
//! - **[`HostapdIface`]**: one AP interface: WPS, client blocking, MAC
//!   allow-list control and event callback registration.
//! - **[`ApInterface`]**: the AP control surface that writes the daemon
//!   configuration, starts/stops the daemon, sets the country code and
//!   reports usable channels.
//! - **[`NetworkService`]**: network-link observation for the AP interface.
//!
//! Every remote object can be watched for death through a cancellable
//! [`Subscription`]. Two implementations ship with the crate: [`local`]
//! drives a real hostapd over its UNIX control socket, and `testing`
//! (feature `testing`) is a scriptable in-memory fake.

pub mod binding;
pub mod error;
pub mod local;
pub mod status;
pub mod subscription;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use binding::{
    ApInterface, Band, EncryptionType, Hostapd, HostapdIface, HostapdIfaceCallback,
    HostapdParams, InterfaceObserver, NetworkService, ServiceNotification, ServiceRegistry,
    HOSTAPD_SERVICE_NAME,
};
pub use error::TransportError;
pub use status::{HalStatus, HalStatusCode, Reply};
pub use subscription::{DeathRecipient, Subscription};
