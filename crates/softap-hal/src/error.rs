use thiserror::Error;

/// Transport-level failure: the call never produced a status from the daemon.
///
/// Callers treat every variant the same way as a dead remote object. A
/// non-success answer that did reach the daemon is a [`HalStatus`] instead.
///
/// [`HalStatus`]: crate::HalStatus
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote object is gone (daemon exited, socket vanished).
    #[error("Remote object is dead")]
    DeadObject,

    /// Socket or filesystem failure while talking to the daemon.
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The daemon answered with something we could not interpret.
    #[error("Malformed reply to {command}: {reply:?}")]
    MalformedReply { command: String, reply: String },

    /// A watcher needed a tokio runtime and none was entered.
    #[error("No async runtime available to drive {what}")]
    NoRuntime { what: &'static str },

    /// The named service is not registered.
    #[error("Service {0} is not available")]
    ServiceUnavailable(String),
}

impl TransportError {
    /// Returns `true` if the remote end is known to be gone.
    pub fn is_dead_object(&self) -> bool {
        match self {
            Self::DeadObject | Self::ServiceUnavailable(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
