use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{spawn_watcher, LocalHalConfig};
use crate::binding::{InterfaceObserver, NetworkService};
use crate::error::TransportError;
use crate::subscription::Subscription;

/// Link observation through `/sys/class/net/<iface>/operstate`.
pub struct LocalNetwork {
    config: Arc<LocalHalConfig>,
    cancel: CancellationToken,
}

impl LocalNetwork {
    pub(crate) fn new(config: Arc<LocalHalConfig>, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }
}

/// `true` for `up`, `false` for anything else, `None` if the interface is gone.
pub(crate) fn read_operstate(sysfs_net: &Path, iface: &str) -> Option<bool> {
    std::fs::read_to_string(sysfs_net.join(iface).join("operstate"))
        .ok()
        .map(|s| s.trim() == "up")
}

impl NetworkService for LocalNetwork {
    fn register_observer(
        &self,
        observer: Arc<dyn InterfaceObserver>,
    ) -> Result<Subscription, TransportError> {
        let token = self.cancel.child_token();
        let config = Arc::clone(&self.config);
        spawn_watcher("link observer", token.clone(), async move {
            let mut last = false;
            let mut ticker = tokio::time::interval(config.poll_interval);
            loop {
                ticker.tick().await;
                let up = read_operstate(&config.sysfs_net, &config.interface).unwrap_or(false);
                if up != last {
                    debug!(iface = %config.interface, up, "link state changed");
                    observer.interface_link_state_changed(&config.interface, up);
                    last = up;
                }
            }
        })?;
        Ok(Subscription::new(move || token.cancel()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::local::LocalHalConfig;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<bool>>);

    impl InterfaceObserver for Recorder {
        fn interface_link_state_changed(&self, _iface: &str, up: bool) {
            self.0.lock().unwrap().push(up);
        }
    }

    #[test]
    fn operstate_parsing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("wlan0")).unwrap();
        std::fs::write(dir.path().join("wlan0/operstate"), "up\n").unwrap();
        assert_eq!(read_operstate(dir.path(), "wlan0"), Some(true));
        std::fs::write(dir.path().join("wlan0/operstate"), "dormant\n").unwrap();
        assert_eq!(read_operstate(dir.path(), "wlan0"), Some(false));
        assert_eq!(read_operstate(dir.path(), "wlan1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_sees_edges_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("wlan0")).unwrap();
        let state = dir.path().join("wlan0/operstate");
        std::fs::write(&state, "up\n").unwrap();

        let mut config = LocalHalConfig::new("wlan0", dir.path().join("hostapd.conf"));
        config.sysfs_net = dir.path().to_path_buf();
        let net = LocalNetwork::new(Arc::new(config), CancellationToken::new());
        let recorder = Arc::new(Recorder::default());
        let _sub = net.register_observer(recorder.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        std::fs::write(&state, "down\n").unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(*recorder.0.lock().unwrap(), vec![true, false]);
    }
}
