//! Configuration for the softap binary.
//!
//! TOML profiles, PSK resolution (env + keyring + plaintext), and
//! translation into the runtime types of `softap_core` and the local
//! transport. `softap_core` itself never reads configuration files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use softap_core::{Band, ManagerConfig, RetryPolicy, Security, SoftApConfiguration, StatePaths};
use softap_hal::local::LocalHalConfig;
use thiserror::Error;

const KEYRING_SERVICE: &str = "softap";

/// Consulted when a profile names no `psk_env`.
pub const DEFAULT_PSK_ENV: &str = "SOFTAP_PSK";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("no passphrase configured for profile '{profile}'")]
    NoPsk { profile: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named hotspot profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The named profile, or the default one.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Directory for the allow-list, accept files and settings.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            state_dir: default_state_dir(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/softap")
}

/// A named hotspot profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// AP network interface.
    #[serde(default = "default_interface")]
    pub interface: String,

    pub ssid: String,

    #[serde(default)]
    pub hidden: bool,

    /// "2.4ghz" (or "2g") / "5ghz" (or "5g").
    #[serde(default)]
    pub band: Band,

    /// 0 picks a channel automatically.
    #[serde(default)]
    pub channel: u32,

    /// "open", "wpa-psk" or "wpa2-psk".
    #[serde(default)]
    pub security: Security,

    /// Passphrase (plaintext; prefer keyring or env var).
    pub psk: Option<String>,

    /// Environment variable holding the passphrase.
    pub psk_env: Option<String>,

    /// ISO 3166 alpha-2; required for 5 GHz.
    pub country_code: Option<String>,

    pub max_stations: Option<u32>,

    /// Automatic 2.4 GHz channel candidates, in preference order.
    #[serde(default)]
    pub allowed_channels_2g: Vec<u32>,

    /// Overrides `defaults.state_dir`.
    pub state_dir: Option<PathBuf>,

    /// dnsmasq lease file.
    pub lease_file: Option<PathBuf>,

    /// Stop after this long without clients ("10m"); "0s" or absent disables.
    pub auto_disable: Option<String>,

    /// Delay between lease lookups ("2s").
    pub ip_poll_interval: Option<String>,

    pub ip_poll_attempts: Option<u32>,

    #[serde(default)]
    pub hostapd: HostapdSection,

    #[serde(default)]
    pub wps: WpsSection,
}

fn default_interface() -> String {
    "wlan0".into()
}

/// Where the local backend finds and places hostapd files.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HostapdSection {
    pub binary: Option<PathBuf>,
    pub ctrl_dir: Option<PathBuf>,
    /// Generated configuration; defaults to `<state_dir>/hostapd.conf`.
    pub conf_path: Option<PathBuf>,
}

/// WPS identity overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WpsSection {
    pub device_name: Option<String>,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "softap", "softap").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("softap");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. Nested keys use a double underscore:
/// `SOFTAP_DEFAULTS__OUTPUT=json`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SOFTAP_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── PSK resolution ──────────────────────────────────────────────────

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/psk")
}

fn keyring_psk(profile_name: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .ok()?
        .get_password()
        .ok()
}

/// Resolve the passphrase: env var, then system keyring, then plaintext.
pub fn resolve_psk(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_psk_with(profile, profile_name, keyring_psk)
}

/// [`resolve_psk`] with an explicit keyring lookup.
pub fn resolve_psk_with(
    profile: &Profile,
    profile_name: &str,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Env var
    let env_name = profile.psk_env.as_deref().unwrap_or(DEFAULT_PSK_ENV);
    if let Ok(val) = std::env::var(env_name) {
        return Ok(SecretString::from(val));
    }

    // 2. Keyring
    if let Some(secret) = keyring(profile_name) {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(ref psk) = profile.psk {
        return Ok(SecretString::from(psk.clone()));
    }

    Err(ConfigError::NoPsk {
        profile: profile_name.into(),
    })
}

/// Save a passphrase in the system keyring.
pub fn store_psk(profile_name: &str, psk: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .and_then(|entry| entry.set_password(psk))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{value}': {e}"),
    })
}

/// Build the hotspot configuration, resolving the passphrase when the
/// profile is secured.
pub fn profile_to_soft_ap_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<SoftApConfiguration, ConfigError> {
    let psk = match profile.security {
        Security::Open | Security::Unsupported => None,
        Security::WpaPsk | Security::Wpa2Psk => Some(resolve_psk(profile, profile_name)?),
    };
    soft_ap_config_with_psk(profile, psk)
}

/// Build the hotspot configuration with an already-resolved passphrase.
pub fn soft_ap_config_with_psk(
    profile: &Profile,
    psk: Option<SecretString>,
) -> Result<SoftApConfiguration, ConfigError> {
    if profile.ssid.is_empty() {
        return Err(ConfigError::Validation {
            field: "ssid".into(),
            reason: "must not be empty".into(),
        });
    }
    Ok(SoftApConfiguration {
        ssid: profile.ssid.clone(),
        hidden: profile.hidden,
        band: profile.band,
        channel: profile.channel,
        security: profile.security,
        psk,
    })
}

/// State directory of `profile`.
pub fn state_dir(profile: &Profile, defaults: &Defaults) -> PathBuf {
    profile
        .state_dir
        .clone()
        .unwrap_or_else(|| defaults.state_dir.clone())
}

/// Files owned by the manager for `profile`.
pub fn state_paths(profile: &Profile, defaults: &Defaults) -> StatePaths {
    let mut paths = StatePaths::in_dir(&state_dir(profile, defaults));
    if let Some(ref lease_file) = profile.lease_file {
        paths.lease_file.clone_from(lease_file);
    }
    paths
}

pub fn profile_to_manager_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ManagerConfig, ConfigError> {
    let mut config = ManagerConfig::new(state_paths(profile, defaults));

    if let Some(ref cc) = profile.country_code {
        let valid = cc.len() == 2 && cc.chars().all(|c| c.is_ascii_alphabetic());
        if !valid {
            return Err(ConfigError::Validation {
                field: "country_code".into(),
                reason: format!("expected two letters, got '{cc}'"),
            });
        }
        config.country_code = Some(cc.to_ascii_uppercase());
    }
    if let Some(max) = profile.max_stations {
        config.max_num_sta = max;
    }
    config.allowed_channels_2g.clone_from(&profile.allowed_channels_2g);
    if let Some(ref value) = profile.auto_disable {
        config.default_auto_disable = parse_duration("auto_disable", value)?;
    }
    if let Some(ref value) = profile.ip_poll_interval {
        config.ip_poll.interval = parse_duration("ip_poll_interval", value)?;
    }
    if let Some(attempts) = profile.ip_poll_attempts {
        config.ip_poll = RetryPolicy {
            attempts,
            ..config.ip_poll
        };
    }

    let wps = &mut config.wps;
    let overrides = [
        (&mut wps.device_name, &profile.wps.device_name),
        (&mut wps.manufacturer, &profile.wps.manufacturer),
        (&mut wps.model_name, &profile.wps.model_name),
        (&mut wps.model_number, &profile.wps.model_number),
        (&mut wps.serial_number, &profile.wps.serial_number),
    ];
    for (field, value) in overrides {
        if let Some(v) = value {
            field.clone_from(v);
        }
    }
    Ok(config)
}

/// Local transport settings for `profile`.
pub fn profile_to_local_hal_config(profile: &Profile, defaults: &Defaults) -> LocalHalConfig {
    let conf_path = profile
        .hostapd
        .conf_path
        .clone()
        .unwrap_or_else(|| state_dir(profile, defaults).join("hostapd.conf"));
    let mut config = LocalHalConfig::new(profile.interface.clone(), conf_path);
    if let Some(ref binary) = profile.hostapd.binary {
        config.hostapd_binary.clone_from(binary);
    }
    if let Some(ref dir) = profile.hostapd.ctrl_dir {
        config.ctrl_dir.clone_from(dir);
    }
    config
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "home"

[defaults]
state_dir = "/tmp/softap-state"

[profiles.home]
ssid = "Home Hotspot"
security = "wpa2-psk"
psk = "plaintext-pass"
psk_env = "SOFTAP_TEST_HOME_PSK"
band = "5g"
country_code = "de"
max_stations = 4
auto_disable = "10m"
ip_poll_interval = "500ms"

[profiles.home.wps]
device_name = "Living Room"

[profiles.guest]
interface = "wlan1"
ssid = "Guest"
allowed_channels_2g = [11, 1]
lease_file = "/tmp/leases"

[profiles.guest.hostapd]
binary = "/usr/sbin/hostapd"
"#;

    fn sample() -> Config {
        toml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn default_profile_is_selected() {
        let cfg = sample();
        let (name, profile) = cfg.profile(None).unwrap();
        assert_eq!(name, "home");
        assert_eq!(profile.band, Band::FiveGhz);
        assert_eq!(profile.security, Security::Wpa2Psk);
        assert!(matches!(
            cfg.profile(Some("office")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn manager_config_applies_overrides() {
        let cfg = sample();
        let (_, home) = cfg.profile(Some("home")).unwrap();
        let mc = profile_to_manager_config(home, &cfg.defaults).unwrap();
        assert_eq!(mc.country_code.as_deref(), Some("DE"));
        assert_eq!(mc.max_num_sta, 4);
        assert_eq!(mc.default_auto_disable, Duration::from_secs(600));
        assert_eq!(mc.ip_poll.interval, Duration::from_millis(500));
        assert_eq!(mc.ip_poll.attempts, 15);
        assert_eq!(mc.wps.device_name, "Living Room");
        assert_eq!(mc.wps.manufacturer, "softap");
        assert_eq!(
            mc.paths.acl_file,
            PathBuf::from("/tmp/softap-state/hostapd.allow.conf")
        );

        let (_, guest) = cfg.profile(Some("guest")).unwrap();
        let mc = profile_to_manager_config(guest, &cfg.defaults).unwrap();
        assert_eq!(mc.allowed_channels_2g, vec![11, 1]);
        assert_eq!(mc.paths.lease_file, PathBuf::from("/tmp/leases"));
        assert_eq!(mc.default_auto_disable, Duration::ZERO);
    }

    #[test]
    fn local_hal_config_follows_profile() {
        let cfg = sample();
        let (_, guest) = cfg.profile(Some("guest")).unwrap();
        let hal = profile_to_local_hal_config(guest, &cfg.defaults);
        assert_eq!(hal.interface, "wlan1");
        assert_eq!(hal.hostapd_binary, PathBuf::from("/usr/sbin/hostapd"));
        assert_eq!(hal.conf_path, PathBuf::from("/tmp/softap-state/hostapd.conf"));
    }

    #[test]
    fn bad_values_are_validation_errors() {
        let mut cfg = sample();
        let home = cfg.profiles.get_mut("home").unwrap();
        home.auto_disable = Some("soon".into());
        assert!(matches!(
            profile_to_manager_config(home, &cfg.defaults),
            Err(ConfigError::Validation { ref field, .. }) if field == "auto_disable"
        ));
        home.auto_disable = None;
        home.country_code = Some("DEU".into());
        assert!(matches!(
            profile_to_manager_config(home, &cfg.defaults),
            Err(ConfigError::Validation { ref field, .. }) if field == "country_code"
        ));
    }

    #[test]
    fn psk_chain_prefers_keyring_over_plaintext() {
        let cfg = sample();
        let mut home = cfg.profiles["home"].clone();
        home.psk_env = Some("SOFTAP_TEST_NEVER_SET".into());
        let psk = resolve_psk_with(&home, "home", |_| Some("from-keyring".into())).unwrap();
        assert_eq!(psk.expose_secret(), "from-keyring");
        let psk = resolve_psk_with(&home, "home", |_| None).unwrap();
        assert_eq!(psk.expose_secret(), "plaintext-pass");

        home.psk = None;
        assert!(matches!(
            resolve_psk_with(&home, "home", |_| None),
            Err(ConfigError::NoPsk { .. })
        ));
    }

    #[test]
    fn open_profile_needs_no_psk() {
        let cfg = sample();
        let (_, guest) = cfg.profile(Some("guest")).unwrap();
        let ap = soft_ap_config_with_psk(guest, None).unwrap();
        assert_eq!(ap.ssid, "Guest");
        assert!(ap.psk.is_none());
    }

    #[test]
    fn env_overrides_file_and_supplies_psk() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("SOFTAP_DEFAULTS__OUTPUT", "json");
            jail.set_env("SOFTAP_TEST_HOME_PSK", "from-env");
            let cfg = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(cfg.defaults.output, "json");
            let (name, home) = cfg.profile(None).unwrap();
            let psk = resolve_psk_with(home, name, |_| None).unwrap();
            assert_eq!(psk.expose_secret(), "from-env");
            Ok(())
        });
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        save_config_to(&sample(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.profiles.len(), 2);
        assert_eq!(back.profiles["guest"].interface, "wlan1");
    }
}
