use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::ctrl::CtrlSocket;
use super::iface::{ping, LocalHostapd};
use super::{spawn_watcher, LocalHalConfig};
use crate::binding::{Hostapd, ServiceNotification, ServiceRegistry, HOSTAPD_SERVICE_NAME};
use crate::error::TransportError;
use crate::subscription::{DeathRecipient, Subscription};

/// Treats the hostapd control directory as the service registry.
pub struct LocalRegistry {
    config: Arc<LocalHalConfig>,
    cancel: CancellationToken,
}

impl LocalRegistry {
    pub(crate) fn new(config: Arc<LocalHalConfig>, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    fn socket_path(&self) -> std::path::PathBuf {
        self.config.ctrl_dir.join(&self.config.interface)
    }
}

pub(crate) fn is_socket(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.file_type().is_socket())
}

impl ServiceRegistry for LocalRegistry {
    // The control directory cannot die.
    fn link_to_death(&self, _recipient: DeathRecipient) -> Result<Subscription, TransportError> {
        Ok(Subscription::noop())
    }

    fn register_for_notifications(
        &self,
        service: &str,
        notification: Arc<dyn ServiceNotification>,
    ) -> Result<bool, TransportError> {
        if service != HOSTAPD_SERVICE_NAME {
            return Ok(false);
        }
        let path = self.socket_path();
        let interval = self.config.poll_interval;
        let service = service.to_owned();
        let timeout = self.config.reply_timeout;
        spawn_watcher("service registration watcher", self.cancel.child_token(), async move {
            // A killed daemon leaves its socket file behind, and a restarted
            // one rebinds it in place, so presence means answering PING.
            let mut alive = false;
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let target = path.clone();
                let now = tokio::task::spawn_blocking(move || ping(&target, timeout))
                    .await
                    .unwrap_or(false);
                if now && !alive {
                    debug!(path = %path.display(), "hostapd control socket answering");
                    let notification = Arc::clone(&notification);
                    let service = service.clone();
                    let _ = tokio::task::spawn_blocking(move || {
                        notification.on_registration(&service);
                    })
                    .await;
                } else if !now && alive {
                    trace!(path = %path.display(), "hostapd control socket stopped answering");
                }
                alive = now;
            }
        })?;
        Ok(true)
    }

    fn get_hostapd(&self) -> Result<Option<Arc<dyn Hostapd>>, TransportError> {
        let path = self.socket_path();
        if !is_socket(&path) {
            return Ok(None);
        }
        let sock = CtrlSocket::connect(&path, self.config.reply_timeout)?;
        if sock.request("PING")? != "PONG" {
            return Ok(None);
        }
        Ok(Some(Arc::new(LocalHostapd::new(
            Arc::clone(&self.config),
            self.cancel.child_token(),
        ))))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::os::unix::net::UnixDatagram;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl ServiceNotification for Counter {
        fn on_registration(&self, _service: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Answer every PING on `path` until no request arrives for a while.
    fn serve_pings(path: &Path) -> std::thread::JoinHandle<()> {
        let server = UnixDatagram::bind(path).unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            while let Ok((n, peer)) = server.recv_from(&mut buf) {
                let Some(peer) = peer.as_pathname() else {
                    continue;
                };
                if buf.get(..n) == Some(b"PING".as_slice()) {
                    let _ = server.send_to(b"PONG\n", peer);
                }
            }
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn announces_daemon_rebinding_a_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LocalHalConfig::new("wlan0", dir.path().join("hostapd.conf"));
        config.ctrl_dir = dir.path().to_path_buf();
        config.poll_interval = Duration::from_millis(20);
        config.reply_timeout = Duration::from_millis(200);
        let socket = config.ctrl_dir.join("wlan0");

        // Left behind by a killed daemon.
        drop(UnixDatagram::bind(&socket).unwrap());

        let cancel = CancellationToken::new();
        let registry = LocalRegistry::new(Arc::new(config), cancel.clone());
        let counter = Arc::new(Counter::default());
        assert!(
            registry
                .register_for_notifications(HOSTAPD_SERVICE_NAME, counter.clone())
                .unwrap()
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        assert!(registry.get_hostapd().is_err());

        // The new daemon replaces the file in place.
        std::fs::remove_file(&socket).unwrap();
        let server = serve_pings(&socket);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while counter.0.load(Ordering::SeqCst) == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert!(registry.get_hostapd().unwrap().is_some());

        cancel.cancel();
        server.join().unwrap();
    }

    #[tokio::test]
    async fn ignores_other_services() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LocalHalConfig::new("wlan0", dir.path().join("hostapd.conf"));
        config.ctrl_dir = dir.path().to_path_buf();
        let registry = LocalRegistry::new(Arc::new(config), CancellationToken::new());
        assert!(
            !registry
                .register_for_notifications("wpa_supplicant", Arc::new(Counter::default()))
                .unwrap()
        );
    }
}
