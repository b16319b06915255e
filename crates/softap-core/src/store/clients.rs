// ── Tracked client table ──
//
// Concurrent map of stations keyed by MAC, with a `watch` snapshot rebuilt
// on every mutation so status queries never touch the state machine.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{HotspotClient, MacAddress};

pub struct ClientTable {
    by_mac: DashMap<MacAddress, Arc<HotspotClient>>,
    snapshot: watch::Sender<Arc<Vec<Arc<HotspotClient>>>>,
}

impl Default for ClientTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientTable {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_mac: DashMap::new(),
            snapshot,
        }
    }

    /// Insert `client` unless its MAC is already tracked. Returns `true` if inserted.
    pub fn insert_if_absent(&self, client: HotspotClient) -> bool {
        let inserted = match self.by_mac.entry(client.mac.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(Arc::new(client));
                true
            }
        };
        if inserted {
            self.rebuild_snapshot();
        }
        inserted
    }

    /// Apply `f` to a tracked client. Returns `false` if `mac` is untracked.
    pub fn update(&self, mac: &MacAddress, f: impl FnOnce(&mut HotspotClient)) -> bool {
        let updated = match self.by_mac.get_mut(mac) {
            Some(mut entry) => {
                f(Arc::make_mut(entry.value_mut()));
                true
            }
            None => false,
        };
        if updated {
            self.rebuild_snapshot();
        }
        updated
    }

    pub fn remove(&self, mac: &MacAddress) -> Option<Arc<HotspotClient>> {
        let removed = self.by_mac.remove(mac).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
        }
        removed
    }

    pub fn get(&self, mac: &MacAddress) -> Option<Arc<HotspotClient>> {
        self.by_mac.get(mac).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.by_mac.contains_key(mac)
    }

    pub fn len(&self) -> usize {
        self.by_mac.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mac.is_empty()
    }

    pub fn clear(&self) {
        self.by_mac.clear();
        self.rebuild_snapshot();
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<HotspotClient>>> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<HotspotClient>>>> {
        self.snapshot.subscribe()
    }

    fn rebuild_snapshot(&self) {
        let mut all: Vec<Arc<HotspotClient>> =
            self.by_mac.iter().map(|r| Arc::clone(r.value())).collect();
        all.sort_by(|a, b| a.mac.cmp(&b.mac));
        self.snapshot.send_replace(Arc::new(all));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn client(mac: &str) -> HotspotClient {
        HotspotClient::connected(MacAddress::parse(mac).unwrap(), Utc::now())
    }

    #[test]
    fn insert_if_absent_keeps_existing_record() {
        let table = ClientTable::new();
        assert!(table.insert_if_absent(client("aa:bb:cc:dd:ee:ff")));
        let mac = MacAddress::parse("aa:bb:cc:dd:ee:ff").unwrap();
        table.update(&mac, |c| c.blocked = true);
        assert!(!table.insert_if_absent(client("aa:bb:cc:dd:ee:ff")));
        assert!(table.get(&mac).unwrap().blocked);
    }

    #[test]
    fn snapshot_follows_mutations() {
        let table = ClientTable::new();
        let mut rx = table.subscribe();
        table.insert_if_absent(client("aa:bb:cc:dd:ee:02"));
        table.insert_if_absent(client("aa:bb:cc:dd:ee:01"));
        assert!(rx.has_changed().unwrap());
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].mac.as_str(), "aa:bb:cc:dd:ee:01");

        table.remove(&MacAddress::parse("aa:bb:cc:dd:ee:01").unwrap());
        assert_eq!(table.snapshot().len(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn update_of_untracked_client_reports_false() {
        let table = ClientTable::new();
        let mac = MacAddress::parse("aa:bb:cc:dd:ee:ff").unwrap();
        assert!(!table.update(&mac, |c| c.blocked = true));
        assert!(table.is_empty());
    }
}
