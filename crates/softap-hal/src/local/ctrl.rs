// ── hostapd control socket ──
//
// hostapd listens on a UNIX datagram socket per interface
// (`<ctrl_dir>/<iface>`). Clients bind their own socket, send a command and
// read one reply. Unsolicited messages start with `<level>` and only reach
// sockets that sent `ATTACH`.

use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::TransportError;
use crate::status::{HalStatus, HalStatusCode};

const REPLY_BUF: usize = 4096;

/// One bound client socket connected to a hostapd control socket.
pub(crate) struct CtrlSocket {
    sock: UnixDatagram,
    remote: PathBuf,
    // Holds the bound client path; removed on drop.
    local_dir: tempfile::TempDir,
}

impl CtrlSocket {
    pub(crate) fn connect(remote: &Path, timeout: Duration) -> Result<Self, TransportError> {
        let local = tempfile::Builder::new().prefix("softap-ctrl-").tempdir()?;
        let sock = UnixDatagram::bind(local.path().join("client"))?;
        sock.connect(remote)?;
        sock.set_read_timeout(Some(timeout))?;
        sock.set_write_timeout(Some(timeout))?;
        Ok(Self {
            sock,
            remote: remote.to_path_buf(),
            local_dir: local,
        })
    }

    pub(crate) fn remote(&self) -> &Path {
        &self.remote
    }

    /// Send `cmd` and return the trimmed reply, skipping unsolicited events.
    pub(crate) fn request(&self, cmd: &str) -> Result<String, TransportError> {
        self.sock.send(cmd.as_bytes())?;
        let mut buf = [0u8; REPLY_BUF];
        loop {
            let n = self.sock.recv(&mut buf)?;
            let reply = String::from_utf8_lossy(buf.get(..n).unwrap_or_default());
            if reply.starts_with('<') {
                continue;
            }
            return Ok(reply.trim_end().to_owned());
        }
    }

    /// Send `ATTACH` and hand the socket over for event reading.
    pub(crate) fn attach(self) -> Result<AttachedSocket, TransportError> {
        let reply = self.request("ATTACH")?;
        if reply != "OK" {
            return Err(TransportError::MalformedReply {
                command: "ATTACH".to_owned(),
                reply,
            });
        }
        self.sock.set_nonblocking(true)?;
        let sock = tokio::net::UnixDatagram::from_std(self.sock)?;
        Ok(AttachedSocket {
            sock,
            local_dir: self.local_dir,
        })
    }
}

/// Socket registered for unsolicited events.
pub(crate) struct AttachedSocket {
    sock: tokio::net::UnixDatagram,
    #[allow(dead_code)]
    local_dir: tempfile::TempDir,
}

impl AttachedSocket {
    pub(crate) async fn next_message(&self) -> Result<String, TransportError> {
        let mut buf = [0u8; REPLY_BUF];
        let n = self.sock.recv(&mut buf).await?;
        Ok(String::from_utf8_lossy(buf.get(..n).unwrap_or_default())
            .trim_end()
            .to_owned())
    }
}

/// Map a plain command reply to a status.
pub(crate) fn status_from_reply(reply: &str) -> HalStatus {
    match reply {
        "OK" | "PONG" => HalStatus::success(),
        "UNKNOWN COMMAND" => HalStatus::failure(HalStatusCode::FailureArgsInvalid, reply),
        r if r.starts_with("FAIL") => HalStatus::failure(HalStatusCode::FailureUnknown, r),
        r => HalStatus::failure(HalStatusCode::FailureUnknown, format!("unexpected reply {r:?}")),
    }
}

/// Map a reply that carries a value on success (e.g. a PIN).
pub(crate) fn value_from_reply(reply: &str) -> Result<String, HalStatus> {
    if reply.is_empty() || reply.starts_with("FAIL") || reply == "UNKNOWN COMMAND" {
        Err(status_from_reply(if reply.is_empty() { "FAIL" } else { reply }))
    } else {
        Ok(reply.to_owned())
    }
}

// ── Unsolicited events ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CtrlEvent {
    StaConnected(String),
    StaDisconnected(String),
    WpsOverlap,
    Terminating,
}

/// Parse `<3>AP-STA-CONNECTED aa:bb:cc:dd:ee:ff` style messages.
pub(crate) fn parse_event(msg: &str) -> Option<CtrlEvent> {
    let body = match msg.strip_prefix('<') {
        Some(rest) => rest.split_once('>').map(|(_, b)| b)?,
        None => msg,
    };
    let mut parts = body.split_whitespace();
    match parts.next()? {
        "AP-STA-CONNECTED" => parts.next().map(|m| CtrlEvent::StaConnected(m.to_owned())),
        "AP-STA-DISCONNECTED" => parts.next().map(|m| CtrlEvent::StaDisconnected(m.to_owned())),
        "WPS-OVERLAP-DETECTED" => Some(CtrlEvent::WpsOverlap),
        "CTRL-EVENT-TERMINATING" => Some(CtrlEvent::Terminating),
        _ => None,
    }
}
