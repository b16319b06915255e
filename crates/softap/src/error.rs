//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use softap_config::ConfigError;
use softap_core::{CoreError, StartFailure};

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CREDENTIALS: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const DAEMON: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found")]
    #[diagnostic(
        code(softap::no_config),
        help(
            "Create one with a [profiles.<name>] table.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(softap::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Could not load configuration: {message}")]
    #[diagnostic(code(softap::config))]
    Config { message: String },

    // ── Credentials ──────────────────────────────────────────────────
    #[error("No passphrase configured for profile '{profile}'")]
    #[diagnostic(
        code(softap::no_psk),
        help(
            "Store one with: softap config set-psk --profile {profile}\n\
             Or set the SOFTAP_PSK environment variable."
        )
    )]
    NoPsk { profile: String },

    #[error("System keyring unavailable: {message}")]
    #[diagnostic(
        code(softap::keyring),
        help("Use `softap config set-psk --plaintext` or an environment variable instead.")
    )]
    Keyring { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(softap::not_found))]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    // ── Daemon ───────────────────────────────────────────────────────
    #[error("Hotspot failed to start ({reason})")]
    #[diagnostic(
        code(softap::start_failed),
        help(
            "no_channel: no usable channel in the selected band; check country_code.\n\
             general: see the log above; rerun with -vv for details."
        )
    )]
    StartFailed { reason: StartFailure },

    #[error("hostapd: {message}")]
    #[diagnostic(
        code(softap::daemon),
        help("Check that hostapd is installed and the interface supports AP mode.")
    )]
    Daemon { message: String },

    #[error("Hotspot did not come up within {seconds}s")]
    #[diagnostic(
        code(softap::timeout),
        help("Increase --start-timeout or check the interface with `ip link`.")
    )]
    Timeout { seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(softap::validation))]
    Validation { field: String, reason: String },

    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(softap::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    #[diagnostic(code(softap::internal))]
    Internal(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoPsk { .. } | Self::Keyring { .. } => exit_code::CREDENTIALS,
            Self::ProfileNotFound { .. } | Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::StartFailed { .. } | Self::Daemon { .. } => exit_code::DAEMON,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::StartFailed { reason } => Self::StartFailed { reason },
            CoreError::NotStarted
            | CoreError::AlreadyStarted
            | CoreError::ControllerStopped
            | CoreError::RemoteRejected { .. }
            | CoreError::Transport(_) => Self::Daemon {
                message: err.to_string(),
            },
            CoreError::InvalidMac { value } => Self::Validation {
                field: "mac".into(),
                reason: format!("'{value}' is not a MAC address"),
            },
            CoreError::ClientNotFound { mac } => Self::NotFound {
                resource_type: "client".into(),
                identifier: mac,
            },
            CoreError::ValidationFailed { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Io { path, source } => Self::Io(std::io::Error::new(
                source.kind(),
                format!("{}: {source}", path.display()),
            )),
            CoreError::Settings { message } | CoreError::Internal(message) => {
                Self::Internal(message)
            }
        }
    }
}

impl From<softap_hal::TransportError> for CliError {
    fn from(err: softap_hal::TransportError) -> Self {
        Self::Daemon {
            message: err.to_string(),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::NoPsk { profile } => Self::NoPsk { profile },
            ConfigError::Keyring(message) => Self::Keyring { message },
            ConfigError::Io(e) => Self::Io(e),
            ConfigError::Serialization(_) | ConfigError::Figment(_) => Self::Config {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(
            CliError::from(CoreError::StartFailed {
                reason: StartFailure::NoChannel
            })
            .exit_code(),
            exit_code::DAEMON
        );
        assert_eq!(
            CliError::from(CoreError::InvalidMac { value: "x".into() }).exit_code(),
            exit_code::USAGE
        );
        assert_eq!(
            CliError::from(ConfigError::NoPsk {
                profile: "home".into()
            })
            .exit_code(),
            exit_code::CREDENTIALS
        );
        assert_eq!(CliError::Timeout { seconds: 30 }.exit_code(), exit_code::TIMEOUT);
        assert_eq!(
            CliError::Internal("boom".into()).exit_code(),
            exit_code::GENERAL
        );
    }
}
