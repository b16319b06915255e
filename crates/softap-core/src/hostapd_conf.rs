// ── hostapd configuration additions ──
//
// The transport writes the base configuration (interface, SSID, channel,
// security). The manager appends station limits, the WPS identity and MAC
// access control, and owns the accept file the daemon reads:
//
//     max_num_sta=10
//     eap_server=1
//     wps_state=2
//     ...
//     macaddr_acl=1
//     accept_mac_file=/var/lib/softap/hostapd.accept
//
// The accept file holds one MAC per line. The update file handed to the
// daemon at runtime uses `MAC` to add and `-MAC` to remove.

use std::fmt::Write as _;
use std::path::Path;

use tracing::debug;

use crate::config::WpsDeviceInfo;
use crate::error::CoreError;
use crate::model::{AccessControlEntry, MacAddress};
use crate::store::fsutil::{atomic_write, read_optional};

/// World-readable so the daemon can read it after dropping privileges.
pub const ACCEPT_FILE_MODE: u32 = 0o604;

/// Directives appended to the base configuration.
#[derive(Debug, Clone, Copy)]
pub struct ManagedDirectives<'a> {
    pub max_num_sta: u32,
    pub all_devices_allowed: bool,
    pub accept_mac_file: &'a Path,
    pub wps: &'a WpsDeviceInfo,
}

impl ManagedDirectives<'_> {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "max_num_sta={}", self.max_num_sta);
        let _ = writeln!(out, "eap_server=1");
        let _ = writeln!(out, "wps_state=2");
        let _ = writeln!(out, "config_methods={}", self.wps.config_methods);
        let _ = writeln!(out, "device_name={}", self.wps.device_name);
        let _ = writeln!(out, "manufacturer={}", self.wps.manufacturer);
        let _ = writeln!(out, "model_name={}", self.wps.model_name);
        let _ = writeln!(out, "model_number={}", self.wps.model_number);
        let _ = writeln!(out, "serial_number={}", self.wps.serial_number);
        let _ = writeln!(out, "device_type={}", self.wps.device_type);
        // 0: accept unless denied; 1: deny unless in accept_mac_file.
        let _ = writeln!(out, "macaddr_acl={}", u8::from(!self.all_devices_allowed));
        let _ = writeln!(out, "accept_mac_file={}", self.accept_mac_file.display());
        out
    }
}

/// Append `directives` to the configuration at `conf`.
pub fn append_directives(conf: &Path, directives: &ManagedDirectives<'_>) -> Result<(), CoreError> {
    let mut text = read_optional(conf)?;
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&directives.render());
    atomic_write(conf, text.as_bytes(), None)?;
    debug!(path = %conf.display(), "appended managed directives");
    Ok(())
}

/// Accept-file contents: every entry that is not blocked.
pub fn render_accept_file(entries: &[AccessControlEntry]) -> String {
    let mut out = String::new();
    for entry in entries.iter().filter(|e| !e.blocked) {
        let _ = writeln!(out, "{}", entry.mac);
    }
    out
}

pub fn write_accept_file(path: &Path, entries: &[AccessControlEntry]) -> Result<(), CoreError> {
    atomic_write(path, render_accept_file(entries).as_bytes(), Some(ACCEPT_FILE_MODE))
}

/// A batch of accept-list changes for the running daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptListUpdate {
    pub add: Vec<MacAddress>,
    pub remove: Vec<MacAddress>,
}

impl AcceptListUpdate {
    pub fn adding(mac: MacAddress) -> Self {
        Self {
            add: vec![mac],
            remove: Vec::new(),
        }
    }

    pub fn removing(mac: MacAddress) -> Self {
        Self {
            add: Vec::new(),
            remove: vec![mac],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for mac in &self.add {
            let _ = writeln!(out, "{mac}");
        }
        for mac in &self.remove {
            let _ = writeln!(out, "-{mac}");
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<(), CoreError> {
        atomic_write(path, self.render().as_bytes(), Some(ACCEPT_FILE_MODE))
    }
}
