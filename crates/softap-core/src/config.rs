// ── Runtime configuration ──
//
// These types describe the hotspot to bring up and where the manager keeps
// its state. They never touch disk: the CLI loads a profile and hands these
// in.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use softap_hal::{Band, EncryptionType};

/// Authentication method of the hotspot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Security {
    #[default]
    Open,
    WpaPsk,
    Wpa2Psk,
    /// Anything the daemon configuration cannot express; treated as open.
    #[serde(other)]
    Unsupported,
}

impl Security {
    pub fn encryption_type(self) -> EncryptionType {
        match self {
            Self::WpaPsk => EncryptionType::Wpa,
            Self::Wpa2Psk => EncryptionType::Wpa2,
            Self::Open | Self::Unsupported => EncryptionType::None,
        }
    }
}

/// Target configuration of one soft AP session.
#[derive(Clone, Default)]
pub struct SoftApConfiguration {
    pub ssid: String,
    pub hidden: bool,
    pub band: Band,
    /// 0 selects a channel automatically.
    pub channel: u32,
    pub security: Security,
    pub psk: Option<SecretString>,
}

impl fmt::Debug for SoftApConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftApConfiguration")
            .field("ssid", &self.ssid)
            .field("hidden", &self.hidden)
            .field("band", &self.band)
            .field("channel", &self.channel)
            .field("security", &self.security)
            .field("psk", &self.psk.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Files owned by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    /// Tab-delimited allow-list store.
    pub acl_file: PathBuf,
    /// Accept file named in the daemon configuration (`accept_mac_file`).
    pub accept_mac_file: PathBuf,
    /// Incremental accept-list update handed to the daemon.
    pub accept_mac_update_file: PathBuf,
    /// Persisted settings (all-devices-allowed, auto-disable).
    pub settings_file: PathBuf,
    /// dnsmasq lease file, read only.
    pub lease_file: PathBuf,
}

impl StatePaths {
    /// Standard file names under `dir`, with the lease file in its usual place.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            acl_file: dir.join("hostapd.allow.conf"),
            accept_mac_file: dir.join("hostapd.accept"),
            accept_mac_update_file: dir.join("hostapd.accept.update"),
            settings_file: dir.join("settings.toml"),
            lease_file: PathBuf::from("/var/lib/misc/dnsmasq.leases"),
        }
    }
}

/// Bounded retry: `attempts` tries spaced by `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

/// WPS identity advertised by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WpsDeviceInfo {
    pub device_name: String,
    pub manufacturer: String,
    pub model_name: String,
    pub model_number: String,
    pub serial_number: String,
    pub device_type: String,
    pub config_methods: String,
}

impl Default for WpsDeviceInfo {
    fn default() -> Self {
        Self {
            device_name: "softap".into(),
            manufacturer: "softap".into(),
            model_name: "softap".into(),
            model_number: "1".into(),
            serial_number: "0".into(),
            device_type: "10-0050F204-5".into(),
            config_methods: "display push_button keypad".into(),
        }
    }
}

/// Manager-wide settings, fixed for the lifetime of a controller.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub paths: StatePaths,
    /// `max_num_sta` in the daemon configuration.
    pub max_num_sta: u32,
    /// Required for 5 GHz.
    pub country_code: Option<String>,
    /// Candidates for automatic 2.4 GHz channel selection, in preference order.
    pub allowed_channels_2g: Vec<u32>,
    /// DHCP lease lookups after a station connects.
    pub ip_poll: RetryPolicy,
    /// Event monitor connection handshake.
    pub handshake: RetryPolicy,
    pub wps: WpsDeviceInfo,
    /// Auto-disable duration used until one is persisted. Zero disables.
    pub default_auto_disable: Duration,
}

impl ManagerConfig {
    pub fn new(paths: StatePaths) -> Self {
        Self {
            paths,
            max_num_sta: 10,
            country_code: None,
            allowed_channels_2g: Vec::new(),
            ip_poll: RetryPolicy {
                attempts: 15,
                interval: Duration::from_secs(2),
            },
            handshake: RetryPolicy {
                attempts: 5,
                interval: Duration::from_secs(1),
            },
            wps: WpsDeviceInfo::default(),
            default_auto_disable: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_maps_to_encryption_codes() {
        assert_eq!(Security::Open.encryption_type(), EncryptionType::None);
        assert_eq!(Security::WpaPsk.encryption_type(), EncryptionType::Wpa);
        assert_eq!(Security::Wpa2Psk.encryption_type(), EncryptionType::Wpa2);
        assert_eq!(Security::Unsupported.encryption_type(), EncryptionType::None);
    }

    #[test]
    fn unknown_security_names_deserialize_as_unsupported() {
        #[derive(Deserialize)]
        struct W {
            security: Security,
        }
        let w: W = toml::from_str("security = \"wpa3-sae\"").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(w.security, Security::Unsupported);
        let w: W = toml::from_str("security = \"wpa2-psk\"").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(w.security, Security::Wpa2Psk);
    }
}
