use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::iface::ping;
use super::netdev::read_operstate;
use super::registry::is_socket;
use super::{spawn_watcher, LocalHalConfig};
use crate::binding::{ApInterface, Band, EncryptionType, HostapdParams};
use crate::error::TransportError;
use crate::subscription::{DeathRecipient, Subscription};

const CHANNELS_2G: &[u32] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
const CHANNELS_5G: &[u32] = &[36, 40, 44, 48, 149, 153, 157, 161, 165];

#[derive(Default)]
struct ApState {
    child: Option<Child>,
    country_code: Option<String>,
}

/// Writes the daemon configuration and owns the hostapd process.
pub struct LocalApInterface {
    config: Arc<LocalHalConfig>,
    cancel: CancellationToken,
    state: Mutex<ApState>,
}

impl LocalApInterface {
    pub(crate) fn new(config: Arc<LocalHalConfig>, cancel: CancellationToken) -> Self {
        Self {
            config,
            cancel,
            state: Mutex::new(ApState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ApState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unlink our interface's control socket unless a daemon answers on it.
    fn remove_stale_socket(&self) {
        let path = self.config.ctrl_dir.join(&self.config.interface);
        if !is_socket(&path) || ping(&path, self.config.reply_timeout) {
            return;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale control socket"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot remove stale control socket");
            }
        }
    }
}

/// Base hostapd configuration for `params`.
pub(crate) fn render_base_config(
    config: &LocalHalConfig,
    params: &HostapdParams,
    country_code: Option<&str>,
) -> String {
    let hw_mode = if params.channel > 14 { "a" } else { "g" };
    let mut out = String::new();
    let _ = writeln!(out, "interface={}", config.interface);
    let _ = writeln!(out, "driver=nl80211");
    let _ = writeln!(out, "ctrl_interface={}", config.ctrl_dir.display());
    let _ = writeln!(out, "ssid={}", params.ssid);
    let _ = writeln!(out, "ignore_broadcast_ssid={}", u8::from(params.hidden));
    let _ = writeln!(out, "hw_mode={hw_mode}");
    let _ = writeln!(out, "channel={}", params.channel);
    if params.channel > 14 {
        let _ = writeln!(out, "ieee80211n=1");
    }
    if let Some(cc) = country_code {
        let _ = writeln!(out, "country_code={cc}");
        let _ = writeln!(out, "ieee80211d=1");
    }
    if let (EncryptionType::Wpa | EncryptionType::Wpa2, Some(psk)) =
        (params.encryption, params.psk.as_ref())
    {
        let _ = writeln!(out, "wpa={}", params.encryption.code());
        let _ = writeln!(out, "wpa_key_mgmt=WPA-PSK");
        let _ = writeln!(out, "wpa_passphrase={}", psk.expose_secret());
        if params.encryption == EncryptionType::Wpa2 {
            let _ = writeln!(out, "rsn_pairwise=CCMP");
        } else {
            let _ = writeln!(out, "wpa_pairwise=TKIP");
        }
    }
    out
}

fn channel_to_frequency(channel: u32) -> u32 {
    match channel {
        14 => 2484,
        1..=13 => 2407 + channel * 5,
        _ => 5000 + channel * 5,
    }
}

fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl ApInterface for LocalApInterface {
    fn interface_name(&self) -> &str {
        &self.config.interface
    }

    /// The interface disappearing from sysfs is treated as death.
    fn link_to_death(&self, recipient: DeathRecipient) -> Result<Subscription, TransportError> {
        let token = self.cancel.child_token();
        let config = Arc::clone(&self.config);
        spawn_watcher("interface death watch", token.clone(), async move {
            let mut ticker = tokio::time::interval(config.poll_interval);
            loop {
                ticker.tick().await;
                if read_operstate(&config.sysfs_net, &config.interface).is_none() {
                    warn!(iface = %config.interface, "AP interface vanished");
                    recipient();
                    return;
                }
            }
        })?;
        Ok(Subscription::new(move || token.cancel()))
    }

    fn write_hostapd_config(&self, params: &HostapdParams) -> Result<bool, TransportError> {
        if let Some(psk) = &params.psk {
            let len = psk.expose_secret().len();
            if params.encryption != EncryptionType::None && !(8..=63).contains(&len) {
                warn!(len, "passphrase must be 8..63 characters");
                return Ok(false);
            }
        }
        let country = self.lock().country_code.clone();
        let conf = render_base_config(&self.config, params, country.as_deref());
        write_atomically(&self.config.conf_path, &conf)?;
        debug!(path = %self.config.conf_path.display(), "wrote hostapd configuration");
        Ok(true)
    }

    fn hostapd_config_path(&self) -> &Path {
        &self.config.conf_path
    }

    fn start_hostapd(&self) -> Result<bool, TransportError> {
        let mut state = self.lock();
        if let Some(child) = state.child.as_mut() {
            if child.try_wait()?.is_none() {
                debug!("hostapd already running");
                return Ok(true);
            }
        }
        self.remove_stale_socket();
        let child = Command::new(&self.config.hostapd_binary)
            .arg(&self.config.conf_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        info!(pid = child.id(), "started hostapd");
        state.child = Some(child);
        Ok(true)
    }

    fn stop_hostapd(&self) -> Result<bool, TransportError> {
        let Some(mut child) = self.lock().child.take() else {
            return Ok(false);
        };
        if child.try_wait()?.is_none() {
            child.kill()?;
        }
        let status = child.wait()?;
        info!(%status, "stopped hostapd");
        // A killed daemon cannot unlink its control socket.
        self.remove_stale_socket();
        Ok(true)
    }

    fn set_country_code(&self, country_code: &str) -> Result<bool, TransportError> {
        let valid = country_code.len() == 2 && country_code.chars().all(|c| c.is_ascii_uppercase());
        if !valid {
            return Ok(false);
        }
        self.lock().country_code = Some(country_code.to_owned());
        Ok(true)
    }

    fn channels_for_band(&self, band: Band) -> Result<Vec<u32>, TransportError> {
        let channels: &[u32] = match band {
            Band::TwoGhz => CHANNELS_2G,
            // Regulatory data is unknown without a country code.
            Band::FiveGhz if self.lock().country_code.is_none() => &[],
            Band::FiveGhz => CHANNELS_5G,
        };
        Ok(channels.iter().copied().map(channel_to_frequency).collect())
    }
}

impl Drop for LocalApInterface {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut child) = state.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
