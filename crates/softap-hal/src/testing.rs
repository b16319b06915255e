// ── Scriptable in-memory transport ──
//
// `FakeHal` stands in for the registry, the daemon, its interface, the AP
// control surface and the network-link service. Tests drive it from the
// outside (start/stop the daemon, kill objects, inject station events,
// force failures) and inspect the calls it recorded.
//
// Notifications and death recipients are always invoked after the fake's
// own lock is released.

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use secrecy::ExposeSecret;

use crate::binding::{
    ApInterface, Band, Hostapd, HostapdIface, HostapdIfaceCallback, HostapdParams,
    InterfaceObserver, NetworkService, ServiceNotification, ServiceRegistry,
    HOSTAPD_SERVICE_NAME,
};
use crate::error::TransportError;
use crate::status::{HalStatus, HalStatusCode, Reply};
use crate::subscription::{DeathRecipient, Subscription};

/// Default interface name exposed by the fake daemon.
pub const FAKE_IFACE: &str = "wlan0";

/// Operations whose outcome can be scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    RegistryLinkToDeath,
    RegisterForNotifications,
    GetHostapd,
    HostapdLinkToDeath,
    ListInterfaces,
    GetInterface,
    IfaceLinkToDeath,
    RegisterCallback,
    StartWpsPushButton,
    StartWpsPinKeypad,
    CheckWpsPin,
    BlockClient,
    UnblockClient,
    UpdateAllowedList,
    SetAllDevicesAllowed,
    ApLinkToDeath,
    WriteHostapdConfig,
    StartHostapd,
    StopHostapd,
    SetCountryCode,
    RegisterObserver,
}

/// How a scripted operation fails.
#[derive(Debug, Clone)]
pub enum FakeFailure {
    /// The call reaches the daemon and answers with this status.
    /// Boolean-returning calls answer `false`.
    Status(HalStatus),
    /// The call fails at the transport level.
    Transport,
}

impl FakeFailure {
    pub fn unknown() -> Self {
        Self::Status(HalStatus::failure(HalStatusCode::FailureUnknown, "scripted failure"))
    }
}

#[derive(Default)]
struct State {
    daemon_running: bool,
    interfaces: Vec<String>,
    notifications: Vec<(String, Arc<dyn ServiceNotification>)>,
    registry_deaths: Vec<(u64, DeathRecipient)>,
    hostapd_deaths: Vec<(u64, DeathRecipient)>,
    iface_deaths: Vec<(u64, DeathRecipient)>,
    ap_deaths: Vec<(u64, DeathRecipient)>,
    callbacks: Vec<Arc<dyn HostapdIfaceCallback>>,
    observers: Vec<(u64, Arc<dyn InterfaceObserver>)>,
    failures: HashMap<FakeOp, FakeFailure>,
    calls: Vec<String>,
    allowed_list_updates: Vec<String>,
    channels: HashMap<Band, Vec<u32>>,
    country_code: Option<String>,
    last_params: Option<HostapdParams>,
    link_up: bool,
    auto_link: bool,
}

struct Shared {
    state: Mutex<State>,
    next_id: AtomicU64,
    _dir: tempfile::TempDir,
    conf_path: PathBuf,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn record(&self, call: String) {
        self.lock().calls.push(call);
    }

    fn failure(&self, op: FakeOp) -> Option<FakeFailure> {
        self.lock().failures.get(&op).cloned()
    }

    fn status_call(&self, op: FakeOp, call: String) -> Result<HalStatus, TransportError> {
        self.record(call);
        match self.failure(op) {
            Some(FakeFailure::Transport) => Err(TransportError::DeadObject),
            Some(FakeFailure::Status(status)) => Ok(status),
            None => Ok(HalStatus::success()),
        }
    }

    fn bool_call(&self, op: FakeOp, call: String) -> Result<bool, TransportError> {
        self.status_call(op, call).map(|s| s.is_success())
    }
}

fn death_list(state: &mut State, which: DeathList) -> &mut Vec<(u64, DeathRecipient)> {
    match which {
        DeathList::Registry => &mut state.registry_deaths,
        DeathList::Hostapd => &mut state.hostapd_deaths,
        DeathList::Iface => &mut state.iface_deaths,
        DeathList::Ap => &mut state.ap_deaths,
    }
}

#[derive(Clone, Copy)]
enum DeathList {
    Registry,
    Hostapd,
    Iface,
    Ap,
}

fn link(
    shared: &Arc<Shared>,
    op: FakeOp,
    which: DeathList,
    recipient: DeathRecipient,
) -> Result<Subscription, TransportError> {
    if shared.failure(op).is_some() {
        return Err(TransportError::DeadObject);
    }
    let id = shared.next_id();
    death_list(&mut shared.lock(), which).push((id, recipient));
    let weak: Weak<Shared> = Arc::downgrade(shared);
    Ok(Subscription::new(move || {
        if let Some(shared) = weak.upgrade() {
            death_list(&mut shared.lock(), which).retain(|(i, _)| *i != id);
        }
    }))
}

fn deliver_registration(notification: Arc<dyn ServiceNotification>, service: String) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move { notification.on_registration(&service) });
    } else {
        std::thread::spawn(move || notification.on_registration(&service));
    }
}

// ── FakeHal ─────────────────────────────────────────────────────────

/// Handle to the whole fake transport. Cheap to clone.
#[derive(Clone)]
pub struct FakeHal {
    shared: Arc<Shared>,
}

impl Default for FakeHal {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHal {
    /// A fake with the daemon stopped, one interface (`wlan0`) and the link
    /// following the daemon (up on start, down on stop).
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let conf_path = dir.path().join("hostapd.conf");
        let mut channels = HashMap::new();
        channels.insert(Band::TwoGhz, vec![2412, 2437, 2462]);
        channels.insert(Band::FiveGhz, vec![5180, 5200, 5745]);
        let state = State {
            interfaces: vec![FAKE_IFACE.to_owned()],
            channels,
            auto_link: true,
            ..State::default()
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                next_id: AtomicU64::new(1),
                _dir: dir,
                conf_path,
            }),
        }
    }

    pub fn registry(&self) -> Arc<dyn ServiceRegistry> {
        Arc::new(FakeRegistry {
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn ap_interface(&self) -> Arc<dyn ApInterface> {
        Arc::new(FakeApInterface {
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn network(&self) -> Arc<dyn NetworkService> {
        Arc::new(FakeNetwork {
            shared: Arc::clone(&self.shared),
        })
    }

    // ── Scripting ──

    pub fn fail(&self, op: FakeOp, failure: FakeFailure) {
        self.shared.lock().failures.insert(op, failure);
    }

    pub fn clear_failure(&self, op: FakeOp) {
        self.shared.lock().failures.remove(&op);
    }

    pub fn set_interfaces(&self, names: &[&str]) {
        self.shared.lock().interfaces = names.iter().map(|n| (*n).to_owned()).collect();
    }

    pub fn set_channels(&self, band: Band, frequencies: Vec<u32>) {
        self.shared.lock().channels.insert(band, frequencies);
    }

    /// When disabled, the link no longer follows daemon start/stop and must
    /// be driven with [`set_link`](Self::set_link).
    pub fn set_auto_link(&self, enabled: bool) {
        self.shared.lock().auto_link = enabled;
    }

    /// Bring the daemon up and notify every registered listener.
    pub fn start_daemon(&self) {
        let notify = {
            let mut state = self.shared.lock();
            if state.daemon_running {
                return;
            }
            state.daemon_running = true;
            state.notifications.clone()
        };
        for (service, n) in notify {
            n.on_registration(&service);
        }
    }

    /// Take the daemon down, killing the root and interface objects.
    pub fn stop_daemon(&self) {
        let deaths = {
            let mut state = self.shared.lock();
            if !state.daemon_running {
                return;
            }
            state.daemon_running = false;
            state.callbacks.clear();
            let mut deaths: Vec<_> = state.hostapd_deaths.drain(..).collect();
            deaths.extend(state.iface_deaths.drain(..));
            deaths
        };
        for (_, d) in deaths {
            d();
        }
    }

    /// Invalidate the interface object only; the daemon keeps running.
    pub fn kill_interface(&self) {
        let deaths: Vec<_> = {
            let mut state = self.shared.lock();
            state.callbacks.clear();
            state.iface_deaths.drain(..).collect()
        };
        for (_, d) in deaths {
            d();
        }
    }

    /// Kill the registry; its notification registrations are lost.
    pub fn kill_registry(&self) {
        let deaths: Vec<_> = {
            let mut state = self.shared.lock();
            state.notifications.clear();
            state.registry_deaths.drain(..).collect()
        };
        for (_, d) in deaths {
            d();
        }
    }

    /// Kill the AP control surface.
    pub fn kill_ap_interface(&self) {
        let deaths: Vec<_> = self.shared.lock().ap_deaths.drain(..).collect();
        for (_, d) in deaths {
            d();
        }
    }

    pub fn set_link(&self, up: bool) {
        let observers = {
            let mut state = self.shared.lock();
            state.link_up = up;
            state.observers.clone()
        };
        for (_, o) in observers {
            o.interface_link_state_changed(FAKE_IFACE, up);
        }
    }

    pub fn sta_connected(&self, mac: &str) {
        for cb in self.callbacks() {
            cb.on_sta_authorized(mac);
        }
    }

    pub fn sta_disconnected(&self, mac: &str) {
        for cb in self.callbacks() {
            cb.on_sta_deauthorized(mac);
        }
    }

    pub fn wps_overlap(&self) {
        for cb in self.callbacks() {
            cb.on_wps_pbc_overlap();
        }
    }

    fn callbacks(&self) -> Vec<Arc<dyn HostapdIfaceCallback>> {
        self.shared.lock().callbacks.clone()
    }

    // ── Inspection ──

    pub fn daemon_running(&self) -> bool {
        self.shared.lock().daemon_running
    }

    pub fn link_up(&self) -> bool {
        self.shared.lock().link_up
    }

    pub fn calls(&self) -> Vec<String> {
        self.shared.lock().calls.clone()
    }

    /// Number of recorded calls starting with `prefix`.
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.shared
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear_calls(&self) {
        self.shared.lock().calls.clear();
    }

    /// Contents of every update file pushed through `update_allowed_list`.
    pub fn allowed_list_updates(&self) -> Vec<String> {
        self.shared.lock().allowed_list_updates.clone()
    }

    pub fn country_code(&self) -> Option<String> {
        self.shared.lock().country_code.clone()
    }

    pub fn last_params(&self) -> Option<HostapdParams> {
        self.shared.lock().last_params.clone()
    }

    pub fn conf_path(&self) -> &Path {
        &self.shared.conf_path
    }

    pub fn registered_callbacks(&self) -> usize {
        self.shared.lock().callbacks.len()
    }

    pub fn observer_count(&self) -> usize {
        self.shared.lock().observers.len()
    }

    pub fn death_watch_counts(&self) -> (usize, usize, usize, usize) {
        let state = self.shared.lock();
        (
            state.registry_deaths.len(),
            state.hostapd_deaths.len(),
            state.iface_deaths.len(),
            state.ap_deaths.len(),
        )
    }
}

// ── Registry ────────────────────────────────────────────────────────

struct FakeRegistry {
    shared: Arc<Shared>,
}

impl ServiceRegistry for FakeRegistry {
    fn link_to_death(&self, recipient: DeathRecipient) -> Result<Subscription, TransportError> {
        link(&self.shared, FakeOp::RegistryLinkToDeath, DeathList::Registry, recipient)
    }

    fn register_for_notifications(
        &self,
        service: &str,
        notification: Arc<dyn ServiceNotification>,
    ) -> Result<bool, TransportError> {
        let accepted = self.shared.bool_call(
            FakeOp::RegisterForNotifications,
            format!("register_for_notifications {service}"),
        )?;
        if !accepted {
            return Ok(false);
        }
        let running = {
            let mut state = self.shared.lock();
            state
                .notifications
                .push((service.to_owned(), Arc::clone(&notification)));
            state.daemon_running
        };
        if running && service == HOSTAPD_SERVICE_NAME {
            deliver_registration(notification, service.to_owned());
        }
        Ok(true)
    }

    fn get_hostapd(&self) -> Result<Option<Arc<dyn Hostapd>>, TransportError> {
        self.shared.record("get_hostapd".to_owned());
        if let Some(failure) = self.shared.failure(FakeOp::GetHostapd) {
            return match failure {
                FakeFailure::Transport => Err(TransportError::DeadObject),
                FakeFailure::Status(_) => Ok(None),
            };
        }
        if !self.shared.lock().daemon_running {
            return Ok(None);
        }
        Ok(Some(Arc::new(FakeHostapd {
            shared: Arc::clone(&self.shared),
        })))
    }
}

// ── Daemon root ─────────────────────────────────────────────────────

struct FakeHostapd {
    shared: Arc<Shared>,
}

impl Hostapd for FakeHostapd {
    fn link_to_death(&self, recipient: DeathRecipient) -> Result<Subscription, TransportError> {
        link(&self.shared, FakeOp::HostapdLinkToDeath, DeathList::Hostapd, recipient)
    }

    fn list_interfaces(&self) -> Result<Reply<Vec<String>>, TransportError> {
        let status = self
            .shared
            .status_call(FakeOp::ListInterfaces, "list_interfaces".to_owned())?;
        if !status.is_success() {
            return Ok(Reply::failed(status, Vec::new()));
        }
        Ok(Reply::ok(self.shared.lock().interfaces.clone()))
    }

    fn get_interface(
        &self,
        name: &str,
    ) -> Result<Reply<Option<Arc<dyn HostapdIface>>>, TransportError> {
        let status = self
            .shared
            .status_call(FakeOp::GetInterface, format!("get_interface {name}"))?;
        if !status.is_success() {
            return Ok(Reply::failed(status, None));
        }
        if !self.shared.lock().interfaces.iter().any(|i| i == name) {
            return Ok(Reply::failed(
                HalStatus::failure(HalStatusCode::FailureIfaceUnknown, name),
                None,
            ));
        }
        let iface: Arc<dyn HostapdIface> = Arc::new(FakeIface {
            shared: Arc::clone(&self.shared),
            name: name.to_owned(),
        });
        Ok(Reply::ok(Some(iface)))
    }
}

// ── Interface ───────────────────────────────────────────────────────

struct FakeIface {
    shared: Arc<Shared>,
    name: String,
}

impl HostapdIface for FakeIface {
    fn name(&self) -> &str {
        &self.name
    }

    fn link_to_death(&self, recipient: DeathRecipient) -> Result<Subscription, TransportError> {
        link(&self.shared, FakeOp::IfaceLinkToDeath, DeathList::Iface, recipient)
    }

    fn register_callback(
        &self,
        callback: Arc<dyn HostapdIfaceCallback>,
    ) -> Result<HalStatus, TransportError> {
        let status = self
            .shared
            .status_call(FakeOp::RegisterCallback, "register_callback".to_owned())?;
        if status.is_success() {
            self.shared.lock().callbacks.push(callback);
        }
        Ok(status)
    }

    fn start_wps_push_button(&self) -> Result<HalStatus, TransportError> {
        self.shared
            .status_call(FakeOp::StartWpsPushButton, "start_wps_push_button".to_owned())
    }

    fn start_wps_pin_keypad(&self, pin: &str) -> Result<HalStatus, TransportError> {
        self.shared
            .status_call(FakeOp::StartWpsPinKeypad, format!("start_wps_pin_keypad {pin}"))
    }

    fn check_wps_pin(&self, pin: &str) -> Result<Reply<String>, TransportError> {
        let status = self
            .shared
            .status_call(FakeOp::CheckWpsPin, format!("check_wps_pin {pin}"))?;
        if !status.is_success() {
            return Ok(Reply::failed(status, String::new()));
        }
        Ok(Reply::ok(pin.to_owned()))
    }

    fn block_client(&self, mac: &str) -> Result<HalStatus, TransportError> {
        self.shared
            .status_call(FakeOp::BlockClient, format!("block_client {mac}"))
    }

    fn unblock_client(&self, mac: &str) -> Result<HalStatus, TransportError> {
        self.shared
            .status_call(FakeOp::UnblockClient, format!("unblock_client {mac}"))
    }

    fn update_allowed_list(&self, path: &Path) -> Result<HalStatus, TransportError> {
        let status = self.shared.status_call(
            FakeOp::UpdateAllowedList,
            format!("update_allowed_list {}", path.display()),
        )?;
        if status.is_success() {
            let contents = fs::read_to_string(path)?;
            self.shared.lock().allowed_list_updates.push(contents);
        }
        Ok(status)
    }

    fn set_all_devices_allowed(&self, enabled: bool) -> Result<HalStatus, TransportError> {
        self.shared.status_call(
            FakeOp::SetAllDevicesAllowed,
            format!("set_all_devices_allowed {enabled}"),
        )
    }
}

// ── AP control ──────────────────────────────────────────────────────

struct FakeApInterface {
    shared: Arc<Shared>,
}

impl ApInterface for FakeApInterface {
    fn interface_name(&self) -> &str {
        FAKE_IFACE
    }

    fn link_to_death(&self, recipient: DeathRecipient) -> Result<Subscription, TransportError> {
        link(&self.shared, FakeOp::ApLinkToDeath, DeathList::Ap, recipient)
    }

    fn write_hostapd_config(&self, params: &HostapdParams) -> Result<bool, TransportError> {
        if !self
            .shared
            .bool_call(FakeOp::WriteHostapdConfig, "write_hostapd_config".to_owned())?
        {
            return Ok(false);
        }
        let mut conf = format!(
            "interface={FAKE_IFACE}\nssid={}\nignore_broadcast_ssid={}\nchannel={}\n",
            params.ssid,
            u8::from(params.hidden),
            params.channel,
        );
        if let Some(psk) = &params.psk {
            conf.push_str(&format!(
                "wpa={}\nwpa_passphrase={}\n",
                params.encryption.code(),
                psk.expose_secret()
            ));
        }
        fs::write(&self.shared.conf_path, conf)?;
        self.shared.lock().last_params = Some(params.clone());
        Ok(true)
    }

    fn hostapd_config_path(&self) -> &Path {
        &self.shared.conf_path
    }

    fn start_hostapd(&self) -> Result<bool, TransportError> {
        if !self
            .shared
            .bool_call(FakeOp::StartHostapd, "start_hostapd".to_owned())?
        {
            return Ok(false);
        }
        let fake = FakeHal {
            shared: Arc::clone(&self.shared),
        };
        fake.start_daemon();
        if self.shared.lock().auto_link {
            fake.set_link(true);
        }
        Ok(true)
    }

    fn stop_hostapd(&self) -> Result<bool, TransportError> {
        let stopped = self
            .shared
            .bool_call(FakeOp::StopHostapd, "stop_hostapd".to_owned())?;
        if stopped {
            let fake = FakeHal {
                shared: Arc::clone(&self.shared),
            };
            fake.stop_daemon();
            if self.shared.lock().auto_link {
                fake.set_link(false);
            }
        }
        Ok(stopped)
    }

    fn set_country_code(&self, country_code: &str) -> Result<bool, TransportError> {
        let ok = self.shared.bool_call(
            FakeOp::SetCountryCode,
            format!("set_country_code {country_code}"),
        )?;
        if ok {
            self.shared.lock().country_code = Some(country_code.to_owned());
        }
        Ok(ok)
    }

    fn channels_for_band(&self, band: Band) -> Result<Vec<u32>, TransportError> {
        Ok(self
            .shared
            .lock()
            .channels
            .get(&band)
            .cloned()
            .unwrap_or_default())
    }
}

// ── Network ─────────────────────────────────────────────────────────

struct FakeNetwork {
    shared: Arc<Shared>,
}

impl NetworkService for FakeNetwork {
    fn register_observer(
        &self,
        observer: Arc<dyn InterfaceObserver>,
    ) -> Result<Subscription, TransportError> {
        if !self
            .shared
            .bool_call(FakeOp::RegisterObserver, "register_observer".to_owned())?
        {
            return Err(TransportError::DeadObject);
        }
        let id = self.shared.next_id();
        self.shared.lock().observers.push((id, observer));
        let weak = Arc::downgrade(&self.shared);
        Ok(Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.lock().observers.retain(|(i, _)| *i != id);
            }
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct CountingNotification(AtomicUsize);

    impl ServiceNotification for CountingNotification {
        fn on_registration(&self, _service: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn start_daemon_notifies_registered_listeners() {
        let hal = FakeHal::new();
        let n = Arc::new(CountingNotification(AtomicUsize::new(0)));
        let registry = hal.registry();
        assert!(
            registry
                .register_for_notifications(HOSTAPD_SERVICE_NAME, n.clone())
                .unwrap()
        );
        assert!(registry.get_hostapd().unwrap().is_none());

        hal.start_daemon();
        assert_eq!(n.0.load(Ordering::SeqCst), 1);
        assert!(registry.get_hostapd().unwrap().is_some());
    }

    #[test]
    fn stopping_daemon_fires_death_watches_once() {
        let hal = FakeHal::new();
        hal.start_daemon();
        let hostapd = hal.registry().get_hostapd().unwrap().unwrap();
        let deaths = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&deaths);
        let _sub = hostapd
            .link_to_death(Arc::new(move || {
                d.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        hal.stop_daemon();
        hal.stop_daemon();
        assert_eq!(deaths.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelled_subscription_is_not_notified() {
        let hal = FakeHal::new();
        let deaths = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&deaths);
        let sub = hal
            .ap_interface()
            .link_to_death(Arc::new(move || {
                d.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        sub.cancel();
        hal.kill_ap_interface();
        assert_eq!(deaths.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scripted_failures_surface_as_status_or_transport_errors() {
        let hal = FakeHal::new();
        hal.start_daemon();
        let hostapd = hal.registry().get_hostapd().unwrap().unwrap();
        let iface = hostapd.get_interface(FAKE_IFACE).unwrap().value.unwrap();

        hal.fail(FakeOp::BlockClient, FakeFailure::unknown());
        let status = iface.block_client("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(status.code, HalStatusCode::FailureUnknown);

        hal.fail(FakeOp::BlockClient, FakeFailure::Transport);
        assert!(iface.block_client("aa:bb:cc:dd:ee:ff").is_err());

        hal.clear_failure(FakeOp::BlockClient);
        assert!(iface.block_client("aa:bb:cc:dd:ee:ff").unwrap().is_success());
        assert_eq!(hal.count_calls("block_client"), 3);
    }

    #[test]
    fn unknown_interface_is_reported() {
        let hal = FakeHal::new();
        hal.start_daemon();
        let hostapd = hal.registry().get_hostapd().unwrap().unwrap();
        let reply = hostapd.get_interface("wlan9").unwrap();
        assert_eq!(reply.status.code, HalStatusCode::FailureIfaceUnknown);
        assert!(reply.value.is_none());
    }

    #[test]
    fn start_hostapd_raises_link_when_auto_link_enabled() {
        let hal = FakeHal::new();
        let ap = hal.ap_interface();
        assert!(ap.start_hostapd().unwrap());
        assert!(hal.daemon_running());
        assert!(hal.link_up());
        assert!(ap.stop_hostapd().unwrap());
        assert!(!hal.link_up());
    }
}
