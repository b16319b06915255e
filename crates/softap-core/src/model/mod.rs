// ── Domain model ──
//
// Types shared by the lifecycle manager, the state machine, the stores and
// consumers of the controller (CLI).

pub mod acl;
pub mod client;
pub mod event;
pub mod mac;

// ── Re-exports ──────────────────────────────────────────────────────

pub use acl::AccessControlEntry;
pub use client::HotspotClient;
pub use event::{ApStatus, HotspotEvent, MachineState, SoftApStatus, StartFailure};
pub use mac::MacAddress;
