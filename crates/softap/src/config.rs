//! Profile selection for the CLI.
//!
//! Loading, PSK resolution and translation into runtime types live in
//! `softap_config`; this module only applies the global flags.

use std::path::PathBuf;

use softap_config::{Config, Defaults, Profile};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The profile a command operates on.
pub struct ActiveProfile {
    pub name: String,
    pub profile: Profile,
    pub defaults: Defaults,
}

/// `--config` if given, otherwise the platform path.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(softap_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(softap_config::load_config_from(&config_path(global))?)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

pub fn resolve(global: &GlobalOpts) -> Result<ActiveProfile, CliError> {
    let path = config_path(global);
    let mut cfg = load(global)?;
    if cfg.profiles.is_empty() {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }

    let name = active_profile_name(global, &cfg);
    let Some(profile) = cfg.profiles.remove(&name) else {
        let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name,
            available: available.join(", "),
        });
    };
    Ok(ActiveProfile {
        name,
        profile,
        defaults: cfg.defaults,
    })
}
