use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ctrl::{parse_event, status_from_reply, value_from_reply, CtrlEvent, CtrlSocket};
use super::registry::is_socket;
use super::{spawn_watcher, LocalHalConfig};
use crate::binding::{Hostapd, HostapdIface, HostapdIfaceCallback};
use crate::error::TransportError;
use crate::status::{HalStatus, HalStatusCode, Reply};
use crate::subscription::{DeathRecipient, Subscription};

// ── Daemon root ──

pub(crate) struct LocalHostapd {
    config: Arc<LocalHalConfig>,
    cancel: CancellationToken,
}

impl LocalHostapd {
    pub(crate) fn new(config: Arc<LocalHalConfig>, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }
}

impl Hostapd for LocalHostapd {
    fn link_to_death(&self, recipient: DeathRecipient) -> Result<Subscription, TransportError> {
        let path = self.config.ctrl_dir.join(&self.config.interface);
        watch_liveness(&self.config, &self.cancel, path, recipient)
    }

    fn list_interfaces(&self) -> Result<Reply<Vec<String>>, TransportError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.config.ctrl_dir)? {
            let entry = entry?;
            if is_socket(&entry.path()) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        // The configured interface first, so "first enumerated" is ours.
        names.sort_by_key(|n| n != &self.config.interface);
        Ok(Reply::ok(names))
    }

    fn get_interface(
        &self,
        name: &str,
    ) -> Result<Reply<Option<Arc<dyn HostapdIface>>>, TransportError> {
        let path = self.config.ctrl_dir.join(name);
        if !is_socket(&path) {
            return Ok(Reply::failed(
                HalStatus::failure(HalStatusCode::FailureIfaceUnknown, name),
                None,
            ));
        }
        let sock = CtrlSocket::connect(&path, self.config.reply_timeout)?;
        let iface: Arc<dyn HostapdIface> = Arc::new(LocalIface {
            name: name.to_owned(),
            path,
            config: Arc::clone(&self.config),
            sock: Mutex::new(sock),
            cancel: self.cancel.child_token(),
        });
        Ok(Reply::ok(Some(iface)))
    }
}

/// Ping `path` every poll interval; fire `recipient` once when it stops answering.
fn watch_liveness(
    config: &LocalHalConfig,
    parent: &CancellationToken,
    path: PathBuf,
    recipient: DeathRecipient,
) -> Result<Subscription, TransportError> {
    let token = parent.child_token();
    let interval = config.poll_interval;
    let timeout = config.reply_timeout;
    spawn_watcher("death watch", token.clone(), async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let target = path.clone();
            let alive = tokio::task::spawn_blocking(move || ping(&target, timeout))
                .await
                .unwrap_or(false);
            if !alive {
                debug!(path = %path.display(), "hostapd stopped answering");
                let _ = tokio::task::spawn_blocking(move || recipient()).await;
                return;
            }
        }
    })?;
    Ok(Subscription::new(move || token.cancel()))
}

pub(crate) fn ping(path: &Path, timeout: Duration) -> bool {
    CtrlSocket::connect(path, timeout)
        .and_then(|s| s.request("PING"))
        .is_ok_and(|r| r == "PONG")
}

// ── Interface ──

pub(crate) struct LocalIface {
    name: String,
    path: PathBuf,
    config: Arc<LocalHalConfig>,
    sock: Mutex<CtrlSocket>,
    cancel: CancellationToken,
}

impl Drop for LocalIface {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl LocalIface {
    fn request(&self, cmd: &str) -> Result<String, TransportError> {
        let sock = self.sock.lock().unwrap_or_else(PoisonError::into_inner);
        let reply = sock.request(cmd)?;
        debug!(iface = %self.name, socket = %sock.remote().display(), cmd, reply, "ctrl request");
        Ok(reply)
    }

    fn command(&self, cmd: &str) -> Result<HalStatus, TransportError> {
        self.request(cmd).map(|r| status_from_reply(&r))
    }
}

impl HostapdIface for LocalIface {
    fn name(&self) -> &str {
        &self.name
    }

    fn link_to_death(&self, recipient: DeathRecipient) -> Result<Subscription, TransportError> {
        watch_liveness(&self.config, &self.cancel, self.path.clone(), recipient)
    }

    fn register_callback(
        &self,
        callback: Arc<dyn HostapdIfaceCallback>,
    ) -> Result<HalStatus, TransportError> {
        let events = CtrlSocket::connect(&self.path, self.config.reply_timeout)?.attach()?;
        let iface = self.name.clone();
        spawn_watcher("event reader", self.cancel.child_token(), async move {
            loop {
                let msg = match events.next_message().await {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(iface = %iface, error = %e, "event socket closed");
                        return;
                    }
                };
                match parse_event(&msg) {
                    Some(CtrlEvent::StaConnected(mac)) => callback.on_sta_authorized(&mac),
                    Some(CtrlEvent::StaDisconnected(mac)) => callback.on_sta_deauthorized(&mac),
                    Some(CtrlEvent::WpsOverlap) => callback.on_wps_pbc_overlap(),
                    Some(CtrlEvent::Terminating) => return,
                    None => {}
                }
            }
        })?;
        Ok(HalStatus::success())
    }

    fn start_wps_push_button(&self) -> Result<HalStatus, TransportError> {
        self.command("WPS_PBC")
    }

    fn start_wps_pin_keypad(&self, pin: &str) -> Result<HalStatus, TransportError> {
        let reply = self.request(&format!("WPS_PIN any {pin}"))?;
        Ok(value_from_reply(&reply).map_or_else(|s| s, |_| HalStatus::success()))
    }

    fn check_wps_pin(&self, pin: &str) -> Result<Reply<String>, TransportError> {
        let reply = self.request(&format!("WPS_CHECK_PIN {pin}"))?;
        Ok(match value_from_reply(&reply) {
            Ok(pin) => Reply::ok(pin),
            Err(status) => Reply::failed(status, String::new()),
        })
    }

    fn block_client(&self, mac: &str) -> Result<HalStatus, TransportError> {
        self.command(&format!("DENY_ACL ADD_MAC {mac}"))
    }

    fn unblock_client(&self, mac: &str) -> Result<HalStatus, TransportError> {
        self.command(&format!("DENY_ACL DEL_MAC {mac}"))
    }

    fn update_allowed_list(&self, path: &Path) -> Result<HalStatus, TransportError> {
        let contents = fs::read_to_string(path)?;
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let cmd = match line.strip_prefix('-') {
                Some(mac) => format!("ACCEPT_ACL DEL_MAC {mac}"),
                None => format!("ACCEPT_ACL ADD_MAC {line}"),
            };
            let status = self.command(&cmd)?;
            if !status.is_success() {
                return Ok(status);
            }
        }
        Ok(HalStatus::success())
    }

    fn set_all_devices_allowed(&self, enabled: bool) -> Result<HalStatus, TransportError> {
        // macaddr_acl=0 accepts unless denied, 1 denies unless accepted.
        self.command(&format!("SET macaddr_acl {}", u8::from(!enabled)))
    }
}
