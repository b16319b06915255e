// ── Access control store ──
//
// Ordered MAC -> entry map persisted as one tab-delimited line per entry:
//
//     aa:bb:cc:dd:ee:ff<TAB>0<TAB>Living room TV
//     11:22:33:44:55:66<TAB>1
//
// Backslash, tab, CR and LF inside a name are written as `\\`, `\t`,
// `\r` and `\n`.
//
// The file is loaded once, on first use, and rewritten wholesale after
// every mutation. On a failed write the in-memory map keeps the change.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::fsutil::{atomic_write, read_optional};
use super::settings::SettingsStore;
use crate::error::CoreError;
use crate::model::{AccessControlEntry, MacAddress};

type EntryMap = IndexMap<MacAddress, AccessControlEntry>;

pub struct AccessControlStore {
    path: PathBuf,
    settings: Arc<SettingsStore>,
    entries: Mutex<Option<EntryMap>>,
}

impl AccessControlStore {
    pub fn new(path: impl Into<PathBuf>, settings: Arc<SettingsStore>) -> Self {
        Self {
            path: path.into(),
            settings,
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file if it has not been loaded yet. Idempotent.
    pub fn init_if_necessary(&self) {
        drop(self.loaded());
    }

    fn loaded(&self) -> MutexGuard<'_, Option<EntryMap>> {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(self.load());
        }
        guard
    }

    fn load(&self) -> EntryMap {
        let text = match read_optional(&self.path) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "cannot read access control file");
                return EntryMap::new();
            }
        };
        let map: EntryMap = text
            .lines()
            .filter_map(parse_line)
            .map(|e| (e.mac.clone(), e))
            .collect();
        debug!(path = %self.path.display(), entries = map.len(), "loaded access control list");
        map
    }

    /// Add an entry. Returns `false` if the MAC was already present. The file
    /// is rewritten either way.
    pub fn add(&self, entry: AccessControlEntry) -> Result<bool, CoreError> {
        let mut guard = self.loaded();
        let map = guard.get_or_insert_with(EntryMap::new);
        let added = if map.contains_key(&entry.mac) {
            false
        } else {
            map.insert(entry.mac.clone(), entry);
            true
        };
        self.write(map)?;
        Ok(added)
    }

    /// Remove an entry. The file is rewritten even if `mac` was absent.
    pub fn remove(&self, mac: &MacAddress) -> Result<bool, CoreError> {
        let mut guard = self.loaded();
        let map = guard.get_or_insert_with(EntryMap::new);
        let removed = map.shift_remove(mac).is_some();
        self.write(map)?;
        Ok(removed)
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.loaded().as_ref().is_some_and(|m| m.contains_key(mac))
    }

    pub fn get(&self, mac: &MacAddress) -> Option<AccessControlEntry> {
        self.loaded().as_ref().and_then(|m| m.get(mac).cloned())
    }

    /// Snapshot of every entry in insertion order.
    pub fn list_all(&self) -> Vec<AccessControlEntry> {
        self.loaded()
            .as_ref()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_all_allowed(&self) -> bool {
        self.settings.all_devices_allowed()
    }

    pub fn set_all_allowed(&self, enabled: bool) -> Result<(), CoreError> {
        self.settings.set_all_devices_allowed(enabled)
    }

    fn write(&self, map: &EntryMap) -> Result<(), CoreError> {
        atomic_write(&self.path, render(map.values()).as_bytes(), None)
    }
}

fn parse_line(line: &str) -> Option<AccessControlEntry> {
    let mut fields = line.splitn(3, '\t');
    let raw_mac = fields.next().filter(|s| !s.trim().is_empty())?;
    let mac = match MacAddress::parse(raw_mac) {
        Ok(mac) => mac,
        Err(e) => {
            warn!(line, error = %e, "skipping access control line");
            return None;
        }
    };
    let blocked = fields.next().is_some_and(|b| b.trim() == "1");
    let name = fields.next().map(unescape_name);
    Some(AccessControlEntry { mac, blocked, name })
}

fn render<'a>(entries: impl Iterator<Item = &'a AccessControlEntry>) -> String {
    let mut out = String::new();
    for e in entries {
        let _ = write!(out, "{}\t{}", e.mac, u8::from(e.blocked));
        if let Some(name) = &e.name {
            out.push('\t');
            escape_name(name, &mut out);
        }
        out.push('\n');
    }
    out
}

fn escape_name(name: &str, out: &mut String) {
    for c in name.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

fn unescape_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
