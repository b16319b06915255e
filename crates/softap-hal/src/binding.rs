// ── Transport binding traits ──
//
// The remote objects the soft AP core talks to. All calls are synchronous
// and short; notifications (service ready, death, station events) arrive on
// whatever thread or task the implementation uses for them.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::TransportError;
use crate::status::{HalStatus, Reply};
use crate::subscription::{DeathRecipient, Subscription};

/// Name the hostapd daemon registers under in the [`ServiceRegistry`].
pub const HOSTAPD_SERVICE_NAME: &str = "hostapd";

// ── Service registry ────────────────────────────────────────────────

/// Notification sink for "service became available" events.
pub trait ServiceNotification: Send + Sync {
    /// Called every time `service` (re)registers, including once right away
    /// if it is already running when the notification is registered.
    fn on_registration(&self, service: &str);
}

/// Discovery of the hostapd service.
pub trait ServiceRegistry: Send + Sync {
    fn link_to_death(&self, recipient: DeathRecipient) -> Result<Subscription, TransportError>;

    /// Returns `Ok(false)` if the registry refused the registration.
    fn register_for_notifications(
        &self,
        service: &str,
        notification: Arc<dyn ServiceNotification>,
    ) -> Result<bool, TransportError>;

    /// The daemon root, or `None` if the service is not running.
    fn get_hostapd(&self) -> Result<Option<Arc<dyn Hostapd>>, TransportError>;
}

// ── Daemon root ─────────────────────────────────────────────────────

pub trait Hostapd: Send + Sync {
    fn link_to_death(&self, recipient: DeathRecipient) -> Result<Subscription, TransportError>;

    fn list_interfaces(&self) -> Result<Reply<Vec<String>>, TransportError>;

    fn get_interface(
        &self,
        name: &str,
    ) -> Result<Reply<Option<Arc<dyn HostapdIface>>>, TransportError>;
}

// ── AP interface inside the daemon ──────────────────────────────────

/// Events hostapd raises for one interface.
pub trait HostapdIfaceCallback: Send + Sync {
    fn on_wps_pbc_overlap(&self);
    fn on_sta_authorized(&self, mac: &str);
    fn on_sta_deauthorized(&self, mac: &str);
}

pub trait HostapdIface: Send + Sync {
    fn name(&self) -> &str;

    fn link_to_death(&self, recipient: DeathRecipient) -> Result<Subscription, TransportError>;

    fn register_callback(
        &self,
        callback: Arc<dyn HostapdIfaceCallback>,
    ) -> Result<HalStatus, TransportError>;

    fn start_wps_push_button(&self) -> Result<HalStatus, TransportError>;

    fn start_wps_pin_keypad(&self, pin: &str) -> Result<HalStatus, TransportError>;

    /// Validates a WPS PIN. On success `value` is the normalized PIN.
    fn check_wps_pin(&self, pin: &str) -> Result<Reply<String>, TransportError>;

    fn block_client(&self, mac: &str) -> Result<HalStatus, TransportError>;

    fn unblock_client(&self, mac: &str) -> Result<HalStatus, TransportError>;

    /// Push an incremental accept-list update file (`MAC` / `-MAC` lines).
    fn update_allowed_list(&self, path: &Path) -> Result<HalStatus, TransportError>;

    fn set_all_devices_allowed(&self, enabled: bool) -> Result<HalStatus, TransportError>;
}

// ── AP control surface ──────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Band {
    #[default]
    #[serde(rename = "2.4ghz", alias = "2g")]
    #[strum(to_string = "2.4ghz", serialize = "2g")]
    TwoGhz,
    #[serde(rename = "5ghz", alias = "5g")]
    #[strum(to_string = "5ghz", serialize = "5g")]
    FiveGhz,
}

/// Encryption code written into the daemon configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum EncryptionType {
    None = 0,
    Wpa = 1,
    Wpa2 = 2,
}

impl EncryptionType {
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Wpa => 1,
            Self::Wpa2 => 2,
        }
    }
}

/// Parameters of the remote "write configuration" call.
#[derive(Clone)]
pub struct HostapdParams {
    pub ssid: String,
    pub hidden: bool,
    pub channel: u32,
    pub encryption: EncryptionType,
    pub psk: Option<SecretString>,
}

impl fmt::Debug for HostapdParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostapdParams")
            .field("ssid", &self.ssid)
            .field("hidden", &self.hidden)
            .field("channel", &self.channel)
            .field("encryption", &self.encryption)
            .field("psk", &self.psk.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Control of the AP network interface and the daemon process behind it.
pub trait ApInterface: Send + Sync {
    fn interface_name(&self) -> &str;

    fn link_to_death(&self, recipient: DeathRecipient) -> Result<Subscription, TransportError>;

    /// Writes the base daemon configuration. Returns `Ok(false)` if the
    /// configuration was rejected.
    fn write_hostapd_config(&self, params: &HostapdParams) -> Result<bool, TransportError>;

    /// Path of the daemon configuration written by [`write_hostapd_config`].
    ///
    /// [`write_hostapd_config`]: ApInterface::write_hostapd_config
    fn hostapd_config_path(&self) -> &Path;

    fn start_hostapd(&self) -> Result<bool, TransportError>;

    fn stop_hostapd(&self) -> Result<bool, TransportError>;

    fn set_country_code(&self, country_code: &str) -> Result<bool, TransportError>;

    /// Usable frequencies (MHz) for a band, given the current country code.
    fn channels_for_band(&self, band: Band) -> Result<Vec<u32>, TransportError>;
}

// ── Network link observation ────────────────────────────────────────

pub trait InterfaceObserver: Send + Sync {
    fn interface_link_state_changed(&self, iface: &str, up: bool);
}

pub trait NetworkService: Send + Sync {
    fn register_observer(
        &self,
        observer: Arc<dyn InterfaceObserver>,
    ) -> Result<Subscription, TransportError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn band_parses_short_and_long_names() {
        assert_eq!("2g".parse::<Band>().unwrap(), Band::TwoGhz);
        assert_eq!("5ghz".parse::<Band>().unwrap(), Band::FiveGhz);
        assert_eq!(Band::FiveGhz.to_string(), "5ghz");
    }

    #[test]
    fn encryption_codes() {
        assert_eq!(EncryptionType::None.code(), 0);
        assert_eq!(EncryptionType::Wpa2.code(), 2);
        assert_eq!(EncryptionType::Wpa2.to_string(), "WPA2");
    }

    #[test]
    fn params_debug_redacts_psk() {
        let params = HostapdParams {
            ssid: "Test".into(),
            hidden: false,
            channel: 6,
            encryption: EncryptionType::Wpa2,
            psk: Some(SecretString::from("password123")),
        };
        let rendered = format!("{params:?}");
        assert!(!rendered.contains("password123"));
        assert!(rendered.contains("REDACTED"));
    }
}
