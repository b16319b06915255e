// ── SoftAP state machine ──
//
// Single task that owns the AP session. Commands, monitor events, link
// notifications, lease polls and timer wake-ups all arrive on one queue
// and are handled strictly in order, so no handler ever runs concurrently
// with another.
//
//   Idle ──start──▶ Started ──stop / AP interface death──▶ Idle
//
// Asynchronous notifications are tagged with the session they belong to.
// Anything from an earlier session is dropped.

mod startup;
mod timer;

use std::sync::Arc;

use chrono::Utc;
use softap_hal::{InterfaceObserver, Subscription};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::command::{Command, CommandEnvelope, CommandResult, WpsConfig};
use crate::config::SoftApConfiguration;
use crate::controller::Shared;
use crate::error::CoreError;
use crate::hostapd_conf::{write_accept_file, AcceptListUpdate};
use crate::leases::find_lease;
use crate::model::{
    AccessControlEntry, ApStatus, HotspotClient, HotspotEvent, MacAddress, MachineState,
    SoftApStatus, StartFailure,
};
use crate::lifecycle::HostapdManager;
use crate::monitor::{ApEvent, EventListener, HostapdConnector};

use self::timer::AutoDisableTimer;

pub(crate) enum Message {
    Command(CommandEnvelope),
    Ap(ApEvent),
    LinkChanged { session: u64, up: bool },
    ApInterfaceDied { session: u64 },
    PollIp { session: u64, mac: MacAddress, attempt: u32 },
    AutoDisableFired { generation: u64 },
}

/// Posts monitor events onto the machine's queue.
pub(crate) struct QueueListener(pub(crate) mpsc::UnboundedSender<Message>);

impl EventListener for QueueListener {
    fn post(&self, event: ApEvent) {
        let _ = self.0.send(Message::Ap(event));
    }
}

struct LinkObserver {
    tx: mpsc::UnboundedSender<Message>,
    iface: String,
    session: u64,
}

impl InterfaceObserver for LinkObserver {
    fn interface_link_state_changed(&self, iface: &str, up: bool) {
        if iface == self.iface {
            let _ = self.tx.send(Message::LinkChanged {
                session: self.session,
                up,
            });
        }
    }
}

/// Run a daemon call on the blocking pool. Backends may wait on sockets,
/// and the manager holds its lock across the call.
async fn remote<T>(
    shared: &Arc<Shared>,
    call: impl FnOnce(&HostapdManager) -> T + Send + 'static,
) -> T
where
    T: Default + Send + 'static,
{
    let shared = Arc::clone(shared);
    match tokio::task::spawn_blocking(move || call(&shared.manager)).await {
        Ok(value) => value,
        Err(e) => {
            error!(error = %e, "daemon call panicked");
            T::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StopReason {
    Requested,
    InterfaceDied,
}

pub(crate) struct SoftApMachine {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
    /// Cancelled when the current session ends; parents lease polls.
    session_cancel: CancellationToken,
    iface: String,
    state: MachineState,
    ap_status: ApStatus,
    failure: Option<StartFailure>,
    session: u64,
    interface_up: bool,
    connected: usize,
    wps_in_progress: bool,
    ap_watch: Option<Subscription>,
    link_watch: Option<Subscription>,
    timer: AutoDisableTimer,
}

impl SoftApMachine {
    pub(crate) fn new(
        shared: Arc<Shared>,
        tx: mpsc::UnboundedSender<Message>,
        cancel: CancellationToken,
    ) -> Self {
        let iface = shared.backends.ap_interface.interface_name().to_owned();
        let session_cancel = cancel.child_token();
        Self {
            shared,
            tx,
            cancel,
            session_cancel,
            iface,
            state: MachineState::Idle,
            ap_status: ApStatus::Disabled,
            failure: None,
            session: 0,
            interface_up: false,
            connected: 0,
            wps_in_progress: false,
            ap_watch: None,
            link_watch: None,
            timer: AutoDisableTimer::default(),
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        self.publish_status();
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle(msg).await;
                    self.publish_status();
                }
            }
        }
        self.session_cancel.cancel();
        self.timer.cancel();
        debug!("soft AP state machine stopped");
    }

    async fn handle(&mut self, msg: Message) {
        match msg {
            Message::Command(envelope) => {
                let result = self.handle_command(envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
            Message::Ap(event) => self.handle_ap_event(event),
            Message::LinkChanged { session, up } => self.on_link_changed(session, up),
            Message::ApInterfaceDied { session } => {
                if self.is_current(session) {
                    error!(iface = %self.iface, "AP interface died");
                    self.stop_session(StopReason::InterfaceDied);
                }
            }
            Message::PollIp {
                session,
                mac,
                attempt,
            } => self.poll_ip(session, mac, attempt),
            Message::AutoDisableFired { generation } => self.on_auto_disable(generation),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    async fn handle_command(&mut self, command: Command) -> Result<CommandResult, CoreError> {
        match command {
            Command::Start(config) => self.start(*config).await,
            Command::Stop => {
                if self.state == MachineState::Started {
                    self.stop_session(StopReason::Requested);
                } else {
                    debug!("stop while idle");
                }
                Ok(CommandResult::Ok)
            }
            Command::BlockClient(mac) => {
                self.require_started()?;
                Ok(CommandResult::Remote(self.block_client(&mac).await))
            }
            Command::UnblockClient(mac) => {
                self.require_started()?;
                Ok(CommandResult::Remote(self.unblock_client(&mac).await))
            }
            Command::SetAllDevicesAllowed {
                enabled,
                allow_connected,
            } => Ok(self.set_all_devices_allowed(enabled, allow_connected).await),
            Command::AllowDevice { mac, name } => Ok(self.allow_device(mac, name).await),
            Command::DisallowDevice(mac) => Ok(self.disallow_device(mac).await),
            Command::GetAllowedDevices => {
                Ok(CommandResult::AllowedDevices(self.shared.acl.list_all()))
            }
            Command::StartWps(config) => {
                self.require_started()?;
                Ok(CommandResult::Remote(self.start_wps(config).await))
            }
            Command::SetAutoDisable(duration) => {
                if let Err(e) = self.shared.settings.set_auto_disable(duration) {
                    error!(error = %e, "cannot persist auto-disable setting");
                }
                if duration.is_zero() {
                    self.timer.cancel();
                } else if self.state == MachineState::Started && self.connected == 0 {
                    self.timer.arm(duration, &self.tx, &self.session_cancel);
                }
                Ok(CommandResult::Ok)
            }
        }
    }

    fn require_started(&self) -> Result<(), CoreError> {
        if self.state == MachineState::Started {
            Ok(())
        } else {
            Err(CoreError::NotStarted)
        }
    }

    async fn start(&mut self, config: SoftApConfiguration) -> Result<CommandResult, CoreError> {
        if self.state == MachineState::Started {
            return Err(CoreError::AlreadyStarted);
        }
        self.session += 1;
        self.session_cancel = self.cancel.child_token();
        self.announce(ApStatus::Enabling, None);

        let session = self.session;
        let tx = self.tx.clone();
        let ap_watch = match self
            .shared
            .backends
            .ap_interface
            .link_to_death(Arc::new(move || {
                let _ = tx.send(Message::ApInterfaceDied { session });
            })) {
            Ok(sub) => sub,
            Err(e) => {
                error!(error = %e, "cannot watch the AP interface");
                return self.fail_start(StartFailure::General);
            }
        };

        let observer = Arc::new(LinkObserver {
            tx: self.tx.clone(),
            iface: self.iface.clone(),
            session,
        });
        let link_watch = match self.shared.backends.network.register_observer(observer) {
            Ok(sub) => sub,
            Err(e) => {
                error!(error = %e, "cannot observe the AP interface link");
                drop(ap_watch);
                return self.fail_start(StartFailure::General);
            }
        };

        if let Err(reason) = startup::start_soft_ap(&self.shared, &config) {
            drop(link_watch);
            drop(ap_watch);
            return self.fail_start(reason);
        }

        self.ap_watch = Some(ap_watch);
        self.link_watch = Some(link_watch);
        self.state = MachineState::Started;
        self.interface_up = false;
        self.connected = 0;
        self.wps_in_progress = false;

        let shared = Arc::clone(&self.shared);
        let connector: Arc<dyn HostapdConnector> = Arc::new(shared.manager.clone());
        if !shared
            .monitor
            .start_monitoring(&self.iface, &connector)
            .await
        {
            warn!(iface = %self.iface, "AP started without hostapd events");
        }

        let auto_disable = shared.settings.auto_disable();
        if !auto_disable.is_zero() {
            self.timer.arm(auto_disable, &self.tx, &self.session_cancel);
        }
        info!(iface = %self.iface, ssid = %config.ssid, "soft AP started");
        Ok(CommandResult::Ok)
    }

    fn fail_start(&mut self, reason: StartFailure) -> Result<CommandResult, CoreError> {
        self.announce(ApStatus::Failed, Some(reason));
        Err(CoreError::StartFailed { reason })
    }

    fn stop_session(&mut self, reason: StopReason) {
        self.announce(ApStatus::Disabling, None);
        match self.shared.backends.ap_interface.stop_hostapd() {
            Ok(true) => {}
            Ok(false) => warn!("hostapd was not running"),
            Err(e) => warn!(error = %e, "stopping hostapd failed"),
        }
        self.shared.monitor.stop_monitoring(&self.iface);
        self.ap_watch = None;
        self.link_watch = None;
        self.session_cancel.cancel();
        self.timer.cancel();

        let had_clients = !self.shared.clients.is_empty();
        self.shared.clients.clear();
        self.connected = 0;
        self.wps_in_progress = false;
        self.interface_up = false;
        self.state = MachineState::Idle;

        match reason {
            StopReason::Requested => self.announce(ApStatus::Disabled, None),
            StopReason::InterfaceDied => {
                self.announce(ApStatus::Failed, Some(StartFailure::General));
            }
        }
        if had_clients {
            self.notify(HotspotEvent::ClientsChanged);
        }
        info!(?reason, "soft AP stopped");
    }

    async fn block_client(&mut self, mac: &MacAddress) -> bool {
        let target = mac.clone();
        let ok = remote(&self.shared, move |m| m.block_client(&target)).await;
        if ok {
            if !self.shared.clients.update(mac, |c| c.blocked = true) {
                error!(%mac, "blocked a client that is not tracked");
            }
            self.notify(HotspotEvent::ClientsChanged);
        }
        ok
    }

    async fn unblock_client(&mut self, mac: &MacAddress) -> bool {
        let target = mac.clone();
        let ok = remote(&self.shared, move |m| m.unblock_client(&target)).await;
        if ok {
            self.shared.clients.remove(mac);
            self.notify(HotspotEvent::ClientsChanged);
        }
        ok
    }

    async fn set_all_devices_allowed(
        &mut self,
        enabled: bool,
        allow_connected: bool,
    ) -> CommandResult {
        let mut update = AcceptListUpdate::default();
        if !enabled && allow_connected {
            let connected = self.shared.clients.snapshot();
            for client in connected
                .iter()
                .filter(|c| !c.blocked && c.connected_at.is_some())
            {
                let name = client.display_name().map(str::to_owned);
                match self
                    .shared
                    .acl
                    .add(AccessControlEntry::new(client.mac.clone(), name))
                {
                    Ok(true) => update.add.push(client.mac.clone()),
                    Ok(false) => {}
                    Err(e) => error!(mac = %client.mac, error = %e, "cannot persist allowed device"),
                }
            }
            self.refresh_accept_file();
        }
        if let Err(e) = self.shared.acl.set_all_allowed(enabled) {
            error!(error = %e, "cannot persist all-devices-allowed");
        }

        match self.push_accept_update(&update).await {
            None => CommandResult::Ok,
            Some(pushed) => {
                let set = remote(&self.shared, move |m| m.set_all_devices_allowed(enabled)).await;
                CommandResult::Remote(pushed && set)
            }
        }
    }

    async fn allow_device(&mut self, mac: MacAddress, name: Option<String>) -> CommandResult {
        if let Err(e) = self
            .shared
            .acl
            .add(AccessControlEntry::new(mac.clone(), name))
        {
            error!(%mac, error = %e, "cannot persist allowed device");
        }
        self.refresh_accept_file();
        self.push_accept_update(&AcceptListUpdate::adding(mac))
            .await
            .map_or(CommandResult::Ok, CommandResult::Remote)
    }

    async fn disallow_device(&mut self, mac: MacAddress) -> CommandResult {
        if let Err(e) = self.shared.acl.remove(&mac) {
            error!(%mac, error = %e, "cannot persist removed device");
        }
        self.refresh_accept_file();
        self.push_accept_update(&AcceptListUpdate::removing(mac))
            .await
            .map_or(CommandResult::Ok, CommandResult::Remote)
    }

    fn refresh_accept_file(&self) {
        let path = &self.shared.config.paths.accept_mac_file;
        if let Err(e) = write_accept_file(path, &self.shared.acl.list_all()) {
            error!(error = %e, "cannot write accept file");
        }
    }

    /// Hand `update` to the daemon. `None` while idle; the accept file
    /// written at the next start already carries the change.
    async fn push_accept_update(&mut self, update: &AcceptListUpdate) -> Option<bool> {
        if self.state != MachineState::Started {
            return None;
        }
        if update.is_empty() {
            return Some(true);
        }
        let path = &self.shared.config.paths.accept_mac_update_file;
        if let Err(e) = update.write(path) {
            error!(error = %e, "cannot write accept list update");
            return Some(false);
        }
        let path = path.clone();
        Some(remote(&self.shared, move |m| m.update_allowed_list(&path)).await)
    }

    async fn start_wps(&mut self, config: WpsConfig) -> bool {
        let ok = match config {
            WpsConfig::PushButton => {
                remote(&self.shared, HostapdManager::start_wps_push_button).await
            }
            WpsConfig::Pin(pin) => {
                if let Some(valid) = remote(&self.shared, move |m| m.check_wps_pin(&pin)).await {
                    remote(&self.shared, move |m| m.start_wps_pin_keypad(&valid)).await
                } else {
                    self.notify(HotspotEvent::WpsCheckPinFailed);
                    false
                }
            }
        };
        if ok {
            self.wps_in_progress = true;
        }
        ok
    }

    // ── Monitor events ───────────────────────────────────────────────

    fn handle_ap_event(&mut self, event: ApEvent) {
        if self.state != MachineState::Started {
            trace!(kind = %event.kind(), "ignoring AP event while idle");
            return;
        }
        match event {
            ApEvent::StaConnected { mac, .. } => self.on_sta_connected(mac),
            ApEvent::StaDisconnected { mac, .. } => self.on_sta_disconnected(&mac),
            ApEvent::WpsOverlap { .. } => {
                if self.wps_in_progress {
                    self.wps_in_progress = false;
                    self.notify(HotspotEvent::WpsOverlap);
                }
            }
            ApEvent::HostapdConnected { iface } => debug!(%iface, "hostapd connected"),
            ApEvent::HostapdDisconnected { iface } => warn!(%iface, "hostapd disconnected"),
        }
    }

    fn on_sta_connected(&mut self, mac: MacAddress) {
        self.connected += 1;
        let now = Utc::now();
        let mut client = HotspotClient::connected(mac.clone(), now);
        client.name = self.shared.acl.get(&mac).and_then(|e| e.name);
        if !self.shared.clients.insert_if_absent(client) {
            self.shared
                .clients
                .update(&mac, |c| c.connected_at = Some(now));
        }
        if self.connected == 1 {
            self.timer.cancel();
        }
        debug!(%mac, connected = self.connected, "station connected");
        self.schedule_ip_poll(mac, 1);
        self.notify(HotspotEvent::ClientsChanged);
    }

    fn on_sta_disconnected(&mut self, mac: &MacAddress) {
        self.connected = self.connected.saturating_sub(1);
        match self.shared.clients.get(mac) {
            Some(client) if client.blocked => {
                self.shared.clients.update(mac, |c| {
                    c.connected_at = None;
                    c.ip = None;
                });
            }
            Some(_) => {
                self.shared.clients.remove(mac);
            }
            None => debug!(%mac, "disconnect from an untracked station"),
        }
        if self.connected == 0 {
            let auto_disable = self.shared.settings.auto_disable();
            if !auto_disable.is_zero() {
                self.timer.arm(auto_disable, &self.tx, &self.session_cancel);
            }
        }
        debug!(%mac, connected = self.connected, "station disconnected");
        self.notify(HotspotEvent::ClientsChanged);
    }

    fn on_link_changed(&mut self, session: u64, up: bool) {
        if !self.is_current(session) || up == self.interface_up {
            return;
        }
        self.interface_up = up;
        if up {
            if self.ap_status != ApStatus::Enabled {
                self.announce(ApStatus::Enabled, None);
            }
        } else {
            warn!(iface = %self.iface, "AP interface went down");
        }
    }

    // ── Lease polling ────────────────────────────────────────────────

    fn schedule_ip_poll(&self, mac: MacAddress, attempt: u32) {
        let tx = self.tx.clone();
        let cancel = self.session_cancel.clone();
        let interval = self.shared.config.ip_poll.interval;
        let session = self.session;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(interval) => {
                    let _ = tx.send(Message::PollIp { session, mac, attempt });
                }
            }
        });
    }

    fn poll_ip(&mut self, session: u64, mac: MacAddress, attempt: u32) {
        if !self.is_current(session) || !self.shared.clients.contains(&mac) {
            trace!(%mac, "lease poll no longer needed");
            return;
        }
        match find_lease(&self.shared.config.paths.lease_file, &mac) {
            Ok(Some(lease)) => {
                let hostname = lease.hostname.clone();
                self.shared.clients.update(&mac, |c| {
                    c.ip = Some(lease.ip);
                    c.hostname = hostname;
                });
                let name = self
                    .shared
                    .clients
                    .get(&mac)
                    .and_then(|c| c.display_name().map(str::to_owned));
                info!(%mac, ip = %lease.ip, "client IP ready");
                self.notify(HotspotEvent::ClientIpReady {
                    mac,
                    ip: lease.ip,
                    name,
                });
                return;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "cannot read lease file"),
        }
        if attempt < self.shared.config.ip_poll.attempts {
            self.schedule_ip_poll(mac, attempt + 1);
        } else {
            debug!(%mac, attempt, "no lease found, giving up");
        }
    }

    // ── Auto-disable ─────────────────────────────────────────────────

    fn on_auto_disable(&mut self, generation: u64) {
        if !self.timer.take_fired(generation) {
            return;
        }
        if self.state == MachineState::Started && self.connected == 0 {
            info!("no clients for the auto-disable period, stopping tethering");
            self.shared.backends.tethering.request_stop();
        }
    }

    // ── Status ───────────────────────────────────────────────────────

    fn is_current(&self, session: u64) -> bool {
        self.state == MachineState::Started && session == self.session
    }

    fn announce(&mut self, status: ApStatus, failure: Option<StartFailure>) {
        let previous = self.ap_status;
        self.ap_status = status;
        self.failure = failure;
        debug!(%previous, %status, ?failure, "AP status");
        self.notify(HotspotEvent::StatusChanged {
            status,
            previous,
            failure,
        });
    }

    fn notify(&self, event: HotspotEvent) {
        let _ = self.shared.event_tx.send(event);
    }

    fn publish_status(&self) {
        self.shared.status_tx.send_replace(SoftApStatus {
            state: self.state,
            ap: self.ap_status,
            failure: self.failure,
            interface: Some(self.iface.clone()),
            connected: self.connected,
            interface_up: self.interface_up,
            auto_disable_deadline: self.timer.deadline(),
        });
    }
}
