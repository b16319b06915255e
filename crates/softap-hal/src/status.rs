// ── Remote status codes ──
//
// Every call that reaches the daemon answers with a status code plus an
// optional debug message. Payload-carrying calls wrap both in `Reply<T>`.

use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

/// Status code reported by hostapd for a completed call.
///
/// `Display` renders the SCREAMING_SNAKE_CASE name used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HalStatusCode {
    Success,
    FailureUnknown,
    FailureArgsInvalid,
    FailureIfaceInvalid,
    FailureIfaceExists,
    FailureIfaceUnknown,
}

/// Status of a call that reached the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalStatus {
    pub code: HalStatusCode,
    pub debug_message: String,
}

impl HalStatus {
    pub fn success() -> Self {
        Self {
            code: HalStatusCode::Success,
            debug_message: String::new(),
        }
    }

    pub fn failure(code: HalStatusCode, debug_message: impl Into<String>) -> Self {
        Self {
            code,
            debug_message: debug_message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == HalStatusCode::Success
    }
}

impl fmt::Display for HalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.debug_message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}, {}", self.code, self.debug_message)
        }
    }
}

/// Status plus payload, as returned by calls that also produce a value.
///
/// `value` is only meaningful when `status` is a success.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub status: HalStatus,
    pub value: T,
}

impl<T> Reply<T> {
    pub fn ok(value: T) -> Self {
        Self {
            status: HalStatus::success(),
            value,
        }
    }

    pub fn failed(status: HalStatus, value: T) -> Self {
        Self { status, value }
    }

    /// The payload if the call succeeded.
    pub fn into_value(self) -> Option<T> {
        self.status.is_success().then_some(self.value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_code_display_is_screaming_snake() {
        assert_eq!(HalStatusCode::FailureArgsInvalid.to_string(), "FAILURE_ARGS_INVALID");
        assert_eq!(HalStatusCode::Success.to_string(), "SUCCESS");
    }

    #[test]
    fn status_code_parses_from_name() {
        let code: HalStatusCode = "FAILURE_IFACE_UNKNOWN".parse().unwrap();
        assert_eq!(code, HalStatusCode::FailureIfaceUnknown);
    }

    #[test]
    fn status_display_includes_debug_message() {
        let status = HalStatus::failure(HalStatusCode::FailureUnknown, "FAIL-CHECKSUM");
        assert_eq!(status.to_string(), "FAILURE_UNKNOWN, FAIL-CHECKSUM");
        assert_eq!(HalStatus::success().to_string(), "SUCCESS");
    }

    #[test]
    fn reply_value_only_on_success() {
        assert_eq!(Reply::ok(3).into_value(), Some(3));
        let failed = Reply::failed(HalStatus::failure(HalStatusCode::FailureUnknown, ""), 3);
        assert_eq!(failed.into_value(), None);
    }
}
