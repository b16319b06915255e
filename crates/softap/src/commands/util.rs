//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use softap_core::{AccessControlStore, MacAddress, SettingsStore};

use crate::config::ActiveProfile;
use crate::error::CliError;

pub fn parse_mac(raw: &str) -> Result<MacAddress, CliError> {
    Ok(MacAddress::parse(raw)?)
}

pub fn parse_duration(field: &str, raw: &str) -> Result<Duration, CliError> {
    humantime::parse_duration(raw).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("'{raw}': {e}"),
    })
}

/// The persisted allow-list and settings of `active`, as `softap run` uses them.
pub fn open_acl(active: &ActiveProfile) -> AccessControlStore {
    let paths = softap_config::state_paths(&active.profile, &active.defaults);
    let settings = Arc::new(SettingsStore::new(&paths.settings_file));
    let acl = AccessControlStore::new(&paths.acl_file, settings);
    acl.init_if_necessary();
    acl
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mac_errors_are_usage_errors() {
        assert_eq!(parse_mac("AA-BB-CC-DD-EE-FF").unwrap().as_str(), "aa:bb:cc:dd:ee:ff");
        assert!(matches!(parse_mac("nope"), Err(CliError::Validation { .. })));
    }

    #[test]
    fn durations_use_humantime() {
        assert_eq!(parse_duration("d", "1m 30s").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("d", "later").is_err());
    }
}
