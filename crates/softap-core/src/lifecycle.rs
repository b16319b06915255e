// ── Hostapd lifecycle manager ──
//
// Owns the connection to the remote daemon: registry watch, "service
// registered" notification, daemon root and interface handles, and their
// death watches. Every remote operation funnels through one mutex and
// reports a plain `bool`; a transport failure is treated as the daemon
// dying.
//
// Death recipients carry the generation they were created for, so a
// notification that arrives after the handles were replaced is ignored.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use softap_hal::{
    DeathRecipient, HalStatus, Hostapd, HostapdIface, HostapdIfaceCallback, ServiceNotification,
    ServiceRegistry, Subscription, HOSTAPD_SERVICE_NAME,
};
use tracing::{debug, error, info, warn};

use crate::model::MacAddress;
use crate::monitor::{ApMonitor, HostapdConnector};

#[derive(Default)]
struct HalState {
    /// Registry death watch; `Some` once initialization has started.
    registry_watch: Option<Subscription>,
    registry_generation: u64,
    hostapd: Option<Arc<dyn Hostapd>>,
    hostapd_watch: Option<Subscription>,
    iface: Option<Arc<dyn HostapdIface>>,
    iface_watch: Option<Subscription>,
    service_generation: u64,
    /// Last interface acquired. Kept across deaths for the disconnect broadcast.
    iface_name: Option<String>,
}

#[derive(Clone, Copy, Debug)]
enum DeathSource {
    Registry,
    Service,
}

struct ManagerInner {
    registry: Arc<dyn ServiceRegistry>,
    monitor: Arc<ApMonitor>,
    state: Mutex<HalState>,
}

/// Cheaply cloneable handle to the daemon connection.
#[derive(Clone)]
pub struct HostapdManager {
    inner: Arc<ManagerInner>,
}

impl HostapdManager {
    pub fn new(registry: Arc<dyn ServiceRegistry>, monitor: Arc<ApMonitor>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry,
                monitor,
                state: Mutex::new(HalState::default()),
            }),
        }
    }

    // ── Initialization ───────────────────────────────────────────────

    /// Watch the registry and ask to be told when the daemon registers.
    /// Calling it again after a successful start is a no-op.
    pub fn initialize(&self) -> bool {
        let inner = &self.inner;
        let mut st = inner.lock();
        if st.registry_watch.is_some() {
            debug!("hostapd manager already initialized");
            return true;
        }
        st.registry_generation += 1;
        let generation = st.registry_generation;

        let recipient = inner.death_recipient(DeathSource::Registry, generation);
        let watch = match inner.registry.link_to_death(recipient) {
            Ok(sub) => sub,
            Err(e) => {
                error!(error = %e, "cannot watch the service registry");
                return false;
            }
        };

        let notification = Arc::new(RegistrationListener {
            manager: Arc::downgrade(inner),
            generation,
        });
        match inner
            .registry
            .register_for_notifications(HOSTAPD_SERVICE_NAME, notification)
        {
            Ok(true) => {}
            Ok(false) => {
                error!("registry refused hostapd notifications");
                return false;
            }
            Err(e) => {
                error!(error = %e, "registering for hostapd notifications failed");
                inner.service_died(&mut st);
                return false;
            }
        }

        st.registry_watch = Some(watch);
        info!("hostapd manager initialized");
        true
    }

    pub fn is_initialization_started(&self) -> bool {
        self.inner.lock().registry_watch.is_some()
    }

    pub fn is_initialization_complete(&self) -> bool {
        self.inner.lock().iface.is_some()
    }

    /// Name of the interface acquired from the daemon, if any.
    pub fn interface_name(&self) -> Option<String> {
        let st = self.inner.lock();
        st.iface.as_ref().map(|i| i.name().to_owned())
    }

    /// Drop every handle and watch. Pending notifications become stale.
    pub fn deinitialize(&self) {
        let mut st = self.inner.lock();
        st.registry_watch = None;
        st.registry_generation += 1;
        self.inner.reset_service(&mut st);
        st.iface_name = None;
        debug!("hostapd manager deinitialized");
    }

    // ── Interface operations ─────────────────────────────────────────

    pub fn start_wps_push_button(&self) -> bool {
        self.inner
            .with_iface("start_wps_push_button", |i| i.start_wps_push_button())
    }

    pub fn start_wps_pin_keypad(&self, pin: &str) -> bool {
        self.inner
            .with_iface("start_wps_pin_keypad", |i| i.start_wps_pin_keypad(pin))
    }

    /// The daemon's normalized form of `pin`, or `None` if it is invalid or
    /// the call failed.
    pub fn check_wps_pin(&self, pin: &str) -> Option<String> {
        let inner = &self.inner;
        let mut st = inner.lock();
        let iface = st.iface.clone().or_else(|| {
            error!(op = "check_wps_pin", "hostapd interface not available");
            None
        })?;
        match iface.check_wps_pin(pin) {
            Ok(reply) if reply.status.is_success() => Some(reply.value),
            Ok(reply) => {
                log_status("check_wps_pin", &reply.status);
                None
            }
            Err(e) => {
                error!(op = "check_wps_pin", error = %e, "hostapd call failed");
                inner.service_died(&mut st);
                None
            }
        }
    }

    pub fn block_client(&self, mac: &MacAddress) -> bool {
        self.inner
            .with_iface("block_client", |i| i.block_client(mac.as_str()))
    }

    pub fn unblock_client(&self, mac: &MacAddress) -> bool {
        self.inner
            .with_iface("unblock_client", |i| i.unblock_client(mac.as_str()))
    }

    /// Hand the daemon an accept-list update file.
    pub fn update_allowed_list(&self, path: &Path) -> bool {
        self.inner
            .with_iface("update_allowed_list", |i| i.update_allowed_list(path))
    }

    pub fn set_all_devices_allowed(&self, enabled: bool) -> bool {
        self.inner.with_iface("set_all_devices_allowed", |i| {
            i.set_all_devices_allowed(enabled)
        })
    }
}

impl HostapdConnector for HostapdManager {
    fn connect(&self) -> bool {
        if !self.is_initialization_started() && !self.initialize() {
            return false;
        }
        self.is_initialization_complete()
    }
}

// ── Internals ────────────────────────────────────────────────────────

impl ManagerInner {
    fn lock(&self) -> MutexGuard<'_, HalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn death_recipient(self: &Arc<Self>, source: DeathSource, generation: u64) -> DeathRecipient {
        let weak = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_death(source, generation);
            }
        })
    }

    fn on_death(&self, source: DeathSource, generation: u64) {
        let mut st = self.lock();
        let current = match source {
            DeathSource::Registry => st.registry_generation,
            DeathSource::Service => st.service_generation,
        };
        if generation != current {
            debug!(?source, generation, current, "ignoring stale death notification");
            return;
        }
        warn!(?source, "hostapd remote object died");
        if matches!(source, DeathSource::Registry) {
            st.registry_watch = None;
            st.registry_generation += 1;
        }
        self.service_died(&mut st);
    }

    /// Acquire the daemon root and its first interface, watch both and
    /// register the event callback. Any failure counts as a death.
    fn on_registration(self: &Arc<Self>, generation: u64) {
        let mut st = self.lock();
        if st.registry_watch.is_none() || generation != st.registry_generation {
            debug!("ignoring registration notification for a stale registry");
            return;
        }
        info!("hostapd service registered");
        self.reset_service(&mut st);
        st.service_generation += 1;
        if self.acquire(&mut st).is_none() {
            self.service_died(&mut st);
        }
    }

    fn acquire(self: &Arc<Self>, st: &mut HalState) -> Option<()> {
        let generation = st.service_generation;
        let hostapd = match self.registry.get_hostapd() {
            Ok(Some(h)) => h,
            Ok(None) => {
                error!("hostapd service is not available");
                return None;
            }
            Err(e) => {
                error!(error = %e, "cannot get hostapd service");
                return None;
            }
        };
        let hostapd_watch = hostapd
            .link_to_death(self.death_recipient(DeathSource::Service, generation))
            .map_err(|e| error!(error = %e, "cannot watch hostapd"))
            .ok()?;

        let names = match hostapd.list_interfaces() {
            Ok(reply) if reply.status.is_success() => reply.value,
            Ok(reply) => {
                log_status("list_interfaces", &reply.status);
                return None;
            }
            Err(e) => {
                error!(error = %e, "listing hostapd interfaces failed");
                return None;
            }
        };
        let Some(name) = names.into_iter().next() else {
            error!("hostapd has no interfaces");
            return None;
        };
        let iface = match hostapd.get_interface(&name) {
            Ok(reply) if reply.status.is_success() => reply.value.or_else(|| {
                error!(iface = %name, "hostapd returned no interface");
                None
            })?,
            Ok(reply) => {
                log_status("get_interface", &reply.status);
                return None;
            }
            Err(e) => {
                error!(iface = %name, error = %e, "getting hostapd interface failed");
                return None;
            }
        };
        let iface_watch = iface
            .link_to_death(self.death_recipient(DeathSource::Service, generation))
            .map_err(|e| error!(error = %e, "cannot watch hostapd interface"))
            .ok()?;

        let callback = Arc::new(IfaceEvents {
            monitor: Arc::clone(&self.monitor),
            iface: name.clone(),
        });
        match iface.register_callback(callback) {
            Ok(status) if status.is_success() => {}
            Ok(status) => {
                log_status("register_callback", &status);
                return None;
            }
            Err(e) => {
                error!(error = %e, "registering hostapd callback failed");
                return None;
            }
        }

        info!(iface = %name, "hostapd interface ready");
        st.hostapd = Some(hostapd);
        st.hostapd_watch = Some(hostapd_watch);
        st.iface = Some(iface);
        st.iface_watch = Some(iface_watch);
        st.iface_name = Some(name);
        Some(())
    }

    fn reset_service(&self, st: &mut HalState) {
        st.iface_watch = None;
        st.iface = None;
        st.hostapd_watch = None;
        st.hostapd = None;
    }

    /// Forget the daemon handles and announce the disconnection.
    fn service_died(&self, st: &mut HalState) {
        self.reset_service(st);
        st.service_generation += 1;
        if let Some(name) = st.iface_name.clone() {
            self.monitor.broadcast_hostapd_disconnected(&name);
        }
    }

    fn with_iface(
        &self,
        op: &'static str,
        call: impl FnOnce(&dyn HostapdIface) -> Result<HalStatus, softap_hal::TransportError>,
    ) -> bool {
        let mut st = self.lock();
        let Some(iface) = st.iface.clone() else {
            error!(op, "hostapd interface not available");
            return false;
        };
        match call(&*iface) {
            Ok(status) if status.is_success() => true,
            Ok(status) => {
                log_status(op, &status);
                false
            }
            Err(e) => {
                error!(op, error = %e, "hostapd call failed");
                self.service_died(&mut st);
                false
            }
        }
    }
}

fn log_status(op: &str, status: &HalStatus) {
    error!(op, status = %status, "hostapd returned failure");
}

// ── Remote callbacks ─────────────────────────────────────────────────

struct RegistrationListener {
    manager: Weak<ManagerInner>,
    generation: u64,
}

impl ServiceNotification for RegistrationListener {
    fn on_registration(&self, service: &str) {
        if service != HOSTAPD_SERVICE_NAME {
            return;
        }
        if let Some(inner) = self.manager.upgrade() {
            inner.on_registration(self.generation);
        }
    }
}

/// Forwards daemon events to the monitor.
struct IfaceEvents {
    monitor: Arc<ApMonitor>,
    iface: String,
}

impl HostapdIfaceCallback for IfaceEvents {
    fn on_wps_pbc_overlap(&self) {
        self.monitor.broadcast_wps_overlap(&self.iface);
    }

    fn on_sta_authorized(&self, mac: &str) {
        self.monitor
            .broadcast_sta_connected(&self.iface, MacAddress::new(mac));
    }

    fn on_sta_deauthorized(&self, mac: &str) {
        self.monitor
            .broadcast_sta_disconnected(&self.iface, MacAddress::new(mac));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use softap_hal::testing::{FakeFailure, FakeHal, FakeOp};

    use super::*;
    use crate::config::RetryPolicy;
    use crate::monitor::{ApEvent, EventListener};

    fn setup() -> (FakeHal, Arc<ApMonitor>, HostapdManager, Arc<StdMutex<Vec<ApEvent>>>) {
        let hal = FakeHal::new();
        let monitor = Arc::new(ApMonitor::new(RetryPolicy {
            attempts: 5,
            interval: Duration::from_secs(1),
        }));
        let events = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let listener: Arc<dyn EventListener> = Arc::new(move |e: ApEvent| {
            sink.lock().unwrap().push(e);
        });
        monitor.register_all("wlan0", &listener);
        monitor.set_monitoring("wlan0", true);
        let manager = HostapdManager::new(hal.registry(), Arc::clone(&monitor));
        (hal, monitor, manager, events)
    }

    #[test]
    fn registration_acquires_interface() {
        let (hal, _monitor, manager, _events) = setup();
        assert!(manager.initialize());
        assert!(manager.is_initialization_started());
        assert!(!manager.is_initialization_complete());

        hal.start_daemon();
        assert!(manager.is_initialization_complete());
        assert_eq!(manager.interface_name().as_deref(), Some("wlan0"));
        assert_eq!(hal.registered_callbacks(), 1);
        assert!(manager.connect());
    }

    #[test]
    fn operations_fail_without_interface() {
        let (hal, _monitor, manager, _events) = setup();
        assert!(!manager.block_client(&MacAddress::new("aa:bb:cc:dd:ee:ff")));
        assert!(manager.check_wps_pin("12345670").is_none());
        assert_eq!(hal.count_calls("block_client"), 0);
    }

    #[test]
    fn operations_forward_and_report_status() {
        let (hal, _monitor, manager, _events) = setup();
        manager.initialize();
        hal.start_daemon();
        let mac = MacAddress::new("aa:bb:cc:dd:ee:ff");
        assert!(manager.block_client(&mac));
        assert_eq!(hal.count_calls("block_client aa:bb:cc:dd:ee:ff"), 1);

        hal.fail(FakeOp::UnblockClient, FakeFailure::unknown());
        assert!(!manager.unblock_client(&mac));
        // A status failure is not a death.
        assert!(manager.is_initialization_complete());
    }

    #[test]
    fn transport_failure_is_treated_as_death() {
        let (hal, _monitor, manager, events) = setup();
        manager.initialize();
        hal.start_daemon();
        hal.fail(FakeOp::StartWpsPushButton, FakeFailure::Transport);
        assert!(!manager.start_wps_push_button());
        assert!(!manager.is_initialization_complete());
        assert_eq!(
            events.lock().unwrap().last(),
            Some(&ApEvent::HostapdDisconnected {
                iface: "wlan0".into()
            })
        );
    }

    #[test]
    fn daemon_death_clears_handles_and_broadcasts_once() {
        let (hal, _monitor, manager, events) = setup();
        manager.initialize();
        hal.start_daemon();
        hal.stop_daemon();
        assert!(!manager.is_initialization_complete());
        // Both the root and interface watches fire; the second is stale.
        let disconnects = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, ApEvent::HostapdDisconnected { .. }))
            .count();
        assert_eq!(disconnects, 1);

        // Re-registration reacquires.
        hal.start_daemon();
        assert!(manager.is_initialization_complete());
    }

    #[test]
    fn failed_callback_registration_counts_as_death() {
        let (hal, _monitor, manager, _events) = setup();
        hal.fail(FakeOp::RegisterCallback, FakeFailure::unknown());
        manager.initialize();
        hal.start_daemon();
        assert!(!manager.is_initialization_complete());
        assert_eq!(hal.death_watch_counts().2, 0);
    }

    #[test]
    fn registry_death_requires_reinitialization() {
        let (hal, _monitor, manager, _events) = setup();
        manager.initialize();
        hal.kill_registry();
        assert!(!manager.is_initialization_started());
        assert!(manager.initialize());
    }

    #[test]
    fn station_events_reach_the_monitor() {
        let (hal, _monitor, manager, events) = setup();
        manager.initialize();
        hal.start_daemon();
        hal.sta_connected("AA:BB:CC:DD:EE:FF");
        assert_eq!(
            events.lock().unwrap().last(),
            Some(&ApEvent::StaConnected {
                iface: "wlan0".into(),
                mac: MacAddress::new("aa:bb:cc:dd:ee:ff"),
            })
        );
    }

    #[test]
    fn deinitialize_ignores_late_registration() {
        let (hal, _monitor, manager, _events) = setup();
        manager.initialize();
        manager.deinitialize();
        hal.start_daemon();
        assert!(!manager.is_initialization_complete());
        assert_eq!(hal.count_calls("get_hostapd"), 0);
    }
}
