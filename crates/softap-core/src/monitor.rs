// ── AP event monitor ──
//
// Per-interface pub/sub between the transport (station events, daemon
// connection changes) and whoever consumes them. Events for an interface
// are delivered only while its monitoring flag is set, and only to the
// listeners registered for that exact (interface, event kind) pair.

use std::sync::Arc;

use dashmap::DashMap;
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::model::MacAddress;

/// Kinds of events a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum ApEventKind {
    StaConnected,
    StaDisconnected,
    WpsOverlap,
    HostapdConnected,
    HostapdDisconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApEvent {
    StaConnected { iface: String, mac: MacAddress },
    StaDisconnected { iface: String, mac: MacAddress },
    WpsOverlap { iface: String },
    HostapdConnected { iface: String },
    HostapdDisconnected { iface: String },
}

impl ApEvent {
    pub fn kind(&self) -> ApEventKind {
        match self {
            Self::StaConnected { .. } => ApEventKind::StaConnected,
            Self::StaDisconnected { .. } => ApEventKind::StaDisconnected,
            Self::WpsOverlap { .. } => ApEventKind::WpsOverlap,
            Self::HostapdConnected { .. } => ApEventKind::HostapdConnected,
            Self::HostapdDisconnected { .. } => ApEventKind::HostapdDisconnected,
        }
    }

    pub fn iface(&self) -> &str {
        match self {
            Self::StaConnected { iface, .. }
            | Self::StaDisconnected { iface, .. }
            | Self::WpsOverlap { iface }
            | Self::HostapdConnected { iface }
            | Self::HostapdDisconnected { iface } => iface,
        }
    }
}

/// A consumer of monitor events. `post` must not block.
pub trait EventListener: Send + Sync {
    fn post(&self, event: ApEvent);
}

impl<F> EventListener for F
where
    F: Fn(ApEvent) + Send + Sync,
{
    fn post(&self, event: ApEvent) {
        self(event);
    }
}

/// The daemon connection handshake performed by [`ApMonitor::start_monitoring`].
pub trait HostapdConnector: Send + Sync {
    /// One attempt. Returns `true` once the daemon interface is usable.
    fn connect(&self) -> bool;
}

pub struct ApMonitor {
    handlers: DashMap<(String, ApEventKind), Vec<Arc<dyn EventListener>>>,
    monitoring: DashMap<String, bool>,
    handshake: RetryPolicy,
}

impl ApMonitor {
    pub fn new(handshake: RetryPolicy) -> Self {
        Self {
            handlers: DashMap::new(),
            monitoring: DashMap::new(),
            handshake,
        }
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Add `listener` for `kind` events on `iface`. Adding the same listener
    /// twice has no effect.
    pub fn register_handler(&self, iface: &str, kind: ApEventKind, listener: Arc<dyn EventListener>) {
        let mut set = self.handlers.entry((iface.to_owned(), kind)).or_default();
        if !set.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            set.push(listener);
        }
    }

    /// Register `listener` for every event kind on `iface`.
    pub fn register_all(&self, iface: &str, listener: &Arc<dyn EventListener>) {
        for kind in ApEventKind::iter() {
            self.register_handler(iface, kind, Arc::clone(listener));
        }
    }

    pub fn set_monitoring(&self, iface: &str, enabled: bool) {
        self.monitoring.insert(iface.to_owned(), enabled);
    }

    pub fn is_monitoring(&self, iface: &str) -> bool {
        self.monitoring.get(iface).is_some_and(|m| *m)
    }

    // ── Connection handshake ─────────────────────────────────────────

    /// Connect to the daemon with bounded retry, then enable monitoring and
    /// announce the connection. On failure announce a disconnection and
    /// leave the monitoring flag as it was.
    ///
    /// Attempts run on the blocking pool; a connector may wait on sockets.
    pub async fn start_monitoring(
        &self,
        iface: &str,
        connector: &Arc<dyn HostapdConnector>,
    ) -> bool {
        let attempts = self.handshake.attempts.max(1);
        for attempt in 1..=attempts {
            let attempt_connector = Arc::clone(connector);
            let connected = tokio::task::spawn_blocking(move || attempt_connector.connect())
                .await
                .unwrap_or(false);
            if connected {
                debug!(iface, attempt, "connected to hostapd");
                self.set_monitoring(iface, true);
                self.broadcast_hostapd_connected(iface);
                return true;
            }
            if attempt < attempts {
                debug!(iface, attempt, "hostapd not ready, retrying");
                tokio::time::sleep(self.handshake.interval).await;
            }
        }

        warn!(iface, attempts, "failed to connect to hostapd");
        let original = self.is_monitoring(iface);
        self.set_monitoring(iface, true);
        self.broadcast_hostapd_disconnected(iface);
        self.set_monitoring(iface, original);
        false
    }

    /// Announce a disconnection, then stop delivering events for `iface`.
    pub fn stop_monitoring(&self, iface: &str) {
        self.set_monitoring(iface, true);
        self.broadcast_hostapd_disconnected(iface);
        self.set_monitoring(iface, false);
    }

    pub fn stop_all_monitoring(&self) {
        let ifaces: Vec<String> = self
            .monitoring
            .iter()
            .filter(|e| *e.value())
            .map(|e| e.key().clone())
            .collect();
        for iface in ifaces {
            info!(iface = %iface, "stopping monitoring");
            self.stop_monitoring(&iface);
        }
    }

    // ── Broadcasts ───────────────────────────────────────────────────

    pub fn broadcast_sta_connected(&self, iface: &str, mac: MacAddress) {
        self.dispatch(ApEvent::StaConnected {
            iface: iface.to_owned(),
            mac,
        });
    }

    pub fn broadcast_sta_disconnected(&self, iface: &str, mac: MacAddress) {
        self.dispatch(ApEvent::StaDisconnected {
            iface: iface.to_owned(),
            mac,
        });
    }

    pub fn broadcast_wps_overlap(&self, iface: &str) {
        self.dispatch(ApEvent::WpsOverlap {
            iface: iface.to_owned(),
        });
    }

    pub fn broadcast_hostapd_connected(&self, iface: &str) {
        self.dispatch(ApEvent::HostapdConnected {
            iface: iface.to_owned(),
        });
    }

    pub fn broadcast_hostapd_disconnected(&self, iface: &str) {
        self.dispatch(ApEvent::HostapdDisconnected {
            iface: iface.to_owned(),
        });
    }

    fn dispatch(&self, event: ApEvent) {
        let iface = event.iface();
        if !self.is_monitoring(iface) {
            debug!(iface, kind = %event.kind(), "dropping event, not monitoring");
            return;
        }
        let listeners: Vec<Arc<dyn EventListener>> = self
            .handlers
            .get(&(iface.to_owned(), event.kind()))
            .map(|set| set.clone())
            .unwrap_or_default();
        for listener in listeners {
            listener.post(event.clone());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ApEvent>>);

    impl EventListener for Recorder {
        fn post(&self, event: ApEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl Recorder {
        fn events(&self) -> Vec<ApEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    /// Succeeds on the given attempt (never if 0).
    struct Flaky {
        succeed_on: u32,
        calls: AtomicU32,
    }

    impl HostapdConnector for Flaky {
        fn connect(&self) -> bool {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.succeed_on != 0 && n >= self.succeed_on
        }
    }

    fn monitor() -> ApMonitor {
        ApMonitor::new(RetryPolicy {
            attempts: 5,
            interval: Duration::from_secs(1),
        })
    }

    fn mac() -> MacAddress {
        MacAddress::parse("aa:bb:cc:dd:ee:ff").unwrap()
    }

    #[test]
    fn events_are_dropped_unless_monitoring() {
        let m = monitor();
        let rec = Arc::new(Recorder::default());
        m.register_handler("wlan0", ApEventKind::StaConnected, rec.clone());
        m.broadcast_sta_connected("wlan0", mac());
        assert!(rec.events().is_empty());

        m.set_monitoring("wlan0", true);
        m.broadcast_sta_connected("wlan0", mac());
        assert_eq!(rec.events().len(), 1);
    }

    #[test]
    fn set_monitoring_twice_is_same_as_once() {
        let m = monitor();
        let rec = Arc::new(Recorder::default());
        m.register_handler("wlan0", ApEventKind::WpsOverlap, rec.clone());
        m.set_monitoring("wlan0", true);
        m.set_monitoring("wlan0", true);
        m.broadcast_wps_overlap("wlan0");
        assert_eq!(rec.events().len(), 1);
    }

    #[test]
    fn registering_a_listener_twice_delivers_once() {
        let m = monitor();
        let rec = Arc::new(Recorder::default());
        let listener: Arc<dyn EventListener> = rec.clone();
        m.register_handler("wlan0", ApEventKind::StaDisconnected, Arc::clone(&listener));
        m.register_handler("wlan0", ApEventKind::StaDisconnected, listener);
        m.set_monitoring("wlan0", true);
        m.broadcast_sta_disconnected("wlan0", mac());
        assert_eq!(rec.events().len(), 1);
    }

    #[test]
    fn dispatch_is_scoped_to_the_interface() {
        let m = monitor();
        let other = Arc::new(Recorder::default());
        m.register_handler("wlan1", ApEventKind::StaConnected, other.clone());
        m.set_monitoring("wlan0", true);
        m.set_monitoring("wlan1", true);
        // No listener for wlan0: nothing is delivered anywhere.
        m.broadcast_sta_connected("wlan0", mac());
        assert!(other.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_monitoring_retries_then_connects() {
        let m = monitor();
        let rec = Arc::new(Recorder::default());
        let listener: Arc<dyn EventListener> = rec.clone();
        m.register_all("wlan0", &listener);
        let connector: Arc<dyn HostapdConnector> = Arc::new(Flaky {
            succeed_on: 3,
            calls: AtomicU32::new(0),
        });

        let started = tokio::time::Instant::now();
        assert!(m.start_monitoring("wlan0", &connector).await);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert!(m.is_monitoring("wlan0"));
        assert_eq!(
            rec.events(),
            vec![ApEvent::HostapdConnected {
                iface: "wlan0".into()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_handshake_restores_monitoring_flag() {
        let m = monitor();
        let rec = Arc::new(Recorder::default());
        let listener: Arc<dyn EventListener> = rec.clone();
        m.register_all("wlan0", &listener);
        let flaky = Arc::new(Flaky {
            succeed_on: 0,
            calls: AtomicU32::new(0),
        });
        let connector: Arc<dyn HostapdConnector> = flaky.clone();

        assert!(!m.start_monitoring("wlan0", &connector).await);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 5);
        assert!(!m.is_monitoring("wlan0"));
        assert_eq!(
            rec.events(),
            vec![ApEvent::HostapdDisconnected {
                iface: "wlan0".into()
            }]
        );
    }

    #[test]
    fn stop_monitoring_announces_then_disables() {
        let m = monitor();
        let rec = Arc::new(Recorder::default());
        let listener: Arc<dyn EventListener> = rec.clone();
        m.register_all("wlan0", &listener);
        m.set_monitoring("wlan0", true);
        m.stop_all_monitoring();
        assert!(!m.is_monitoring("wlan0"));
        assert_eq!(rec.events().len(), 1);
        m.broadcast_wps_overlap("wlan0");
        assert_eq!(rec.events().len(), 1);
    }

    #[test]
    fn closures_are_listeners() {
        let m = monitor();
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        m.register_handler(
            "wlan0",
            ApEventKind::WpsOverlap,
            Arc::new(move |_e: ApEvent| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        m.set_monitoring("wlan0", true);
        m.broadcast_wps_overlap("wlan0");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
