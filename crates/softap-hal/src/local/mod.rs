//! Transport binding backed by a real hostapd on the local machine.
//!
//! The registry is the control directory (`/var/run/hostapd` by default):
//! a daemon "registers" when its per-interface control socket appears.
//! Interface calls are control-socket commands, station events come from an
//! `ATTACH`ed socket, and death is detected by periodic `PING`s. The AP
//! control surface writes the daemon configuration and owns the hostapd
//! child process; link state is read from `/sys/class/net`.
//!
//! Watchers run as tokio tasks, so the registry, death watches, callbacks
//! and observers must be set up from inside a runtime.

mod ap;
mod ctrl;
mod iface;
mod netdev;
mod registry;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use ap::LocalApInterface;
pub use netdev::LocalNetwork;
pub use registry::LocalRegistry;

use crate::binding::{ApInterface, NetworkService, ServiceRegistry};
use crate::error::TransportError;

/// Paths and timings of the local backend.
#[derive(Debug, Clone)]
pub struct LocalHalConfig {
    /// AP network interface (e.g. `wlan0`).
    pub interface: String,
    /// hostapd `ctrl_interface` directory.
    pub ctrl_dir: PathBuf,
    /// Where the daemon configuration is written.
    pub conf_path: PathBuf,
    /// hostapd executable.
    pub hostapd_binary: PathBuf,
    /// `/sys/class/net` root, overridable for tests.
    pub sysfs_net: PathBuf,
    /// Period of liveness pings, socket-appearance and link polling.
    pub poll_interval: Duration,
    /// Control-socket reply timeout.
    pub reply_timeout: Duration,
}

impl LocalHalConfig {
    pub fn new(interface: impl Into<String>, conf_path: impl Into<PathBuf>) -> Self {
        Self {
            interface: interface.into(),
            ctrl_dir: PathBuf::from("/var/run/hostapd"),
            conf_path: conf_path.into(),
            hostapd_binary: PathBuf::from("hostapd"),
            sysfs_net: PathBuf::from("/sys/class/net"),
            poll_interval: Duration::from_secs(1),
            reply_timeout: Duration::from_secs(2),
        }
    }
}

/// Factory for the local implementations of the binding traits.
///
/// Dropping the last clone cancels every watcher it spawned.
#[derive(Clone)]
pub struct LocalHal {
    config: Arc<LocalHalConfig>,
    cancel: CancellationToken,
    _guard: Arc<tokio_util::sync::DropGuard>,
}

impl LocalHal {
    pub fn new(config: LocalHalConfig) -> Self {
        let cancel = CancellationToken::new();
        Self {
            config: Arc::new(config),
            _guard: Arc::new(cancel.clone().drop_guard()),
            cancel,
        }
    }

    pub fn config(&self) -> &LocalHalConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<dyn ServiceRegistry> {
        Arc::new(LocalRegistry::new(
            Arc::clone(&self.config),
            self.cancel.child_token(),
        ))
    }

    pub fn ap_interface(&self) -> Arc<dyn ApInterface> {
        Arc::new(LocalApInterface::new(
            Arc::clone(&self.config),
            self.cancel.child_token(),
        ))
    }

    pub fn network(&self) -> Arc<dyn NetworkService> {
        Arc::new(LocalNetwork::new(
            Arc::clone(&self.config),
            self.cancel.child_token(),
        ))
    }
}

/// Spawn a watcher on the current runtime, stopped by `cancel`.
pub(crate) fn spawn_watcher<F>(
    what: &'static str,
    cancel: CancellationToken,
    fut: F,
) -> Result<(), TransportError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle =
        tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime { what })?;
    handle.spawn(async move {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {}
            () = fut => {}
        }
    });
    Ok(())
}
