// ── Reactive client stream ──
//
// Subscription to the tracked client table: snapshot access plus change
// notification, either awaited directly or consumed as a `Stream`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::HotspotClient;

pub type ClientSnapshot = Arc<Vec<Arc<HotspotClient>>>;

/// Which tracked clients to keep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientFilter {
    #[default]
    All,
    Connected,
    Blocked,
}

impl ClientFilter {
    pub fn matches(self, client: &HotspotClient) -> bool {
        match self {
            Self::All => true,
            Self::Connected => client.connected_at.is_some(),
            Self::Blocked => client.blocked,
        }
    }

    pub fn apply(self, snapshot: &ClientSnapshot) -> Vec<Arc<HotspotClient>> {
        snapshot
            .iter()
            .filter(|c| self.matches(c))
            .cloned()
            .collect()
    }
}

pub struct ClientStream {
    current: ClientSnapshot,
    receiver: watch::Receiver<ClientSnapshot>,
}

impl ClientStream {
    pub(crate) fn new(receiver: watch::Receiver<ClientSnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot as of creation or the last `changed()`.
    pub fn current(&self) -> &ClientSnapshot {
        &self.current
    }

    pub fn latest(&self) -> ClientSnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the controller is gone.
    pub async fn changed(&mut self) -> Option<ClientSnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    pub fn into_stream(self) -> ClientWatchStream {
        ClientWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// Yields a snapshot each time the client table changes.
pub struct ClientWatchStream {
    inner: WatchStream<ClientSnapshot>,
}

impl Stream for ClientWatchStream {
    type Item = ClientSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use futures_util::StreamExt;

    use super::*;
    use crate::model::MacAddress;
    use crate::store::ClientTable;

    fn client(mac: &str) -> HotspotClient {
        HotspotClient::connected(MacAddress::parse(mac).unwrap(), Utc::now())
    }

    #[tokio::test]
    async fn changed_tracks_table_mutations() {
        let table = ClientTable::new();
        let mut stream = ClientStream::new(table.subscribe());
        assert!(stream.current().is_empty());

        table.insert_if_absent(client("aa:bb:cc:dd:ee:01"));
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(stream.current().len(), 1);
    }

    #[tokio::test]
    async fn into_stream_yields_current_then_updates() {
        let table = ClientTable::new();
        let mut stream = ClientStream::new(table.subscribe()).into_stream();
        assert_eq!(stream.next().await.unwrap().len(), 0);
        table.insert_if_absent(client("aa:bb:cc:dd:ee:01"));
        assert_eq!(stream.next().await.unwrap().len(), 1);
    }

    #[test]
    fn filter_selects_blocked_and_connected() {
        let table = ClientTable::new();
        table.insert_if_absent(client("aa:bb:cc:dd:ee:01"));
        let mut away = client("aa:bb:cc:dd:ee:02");
        away.blocked = true;
        away.connected_at = None;
        table.insert_if_absent(away);
        let snap = table.snapshot();
        assert_eq!(ClientFilter::All.apply(&snap).len(), 2);
        assert_eq!(ClientFilter::Connected.apply(&snap).len(), 1);
        assert_eq!(ClientFilter::Blocked.apply(&snap)[0].mac.as_str(), "aa:bb:cc:dd:ee:02");
    }
}
