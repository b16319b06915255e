// ── Persistent and reactive stores ──
//
// `AccessControlStore` and `SettingsStore` own files on disk; `ClientTable`
// is the in-memory set of tracked stations with a watch snapshot.

mod acl_store;
mod clients;
pub(crate) mod fsutil;
mod settings;

pub use acl_store::AccessControlStore;
pub use clients::ClientTable;
pub use settings::{Settings, SettingsStore};
