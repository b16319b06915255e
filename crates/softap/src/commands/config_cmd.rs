//! Config subcommand handlers.

use softap_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

const MASK: &str = "********";

/// Copy of `cfg` with plaintext passphrases replaced.
fn masked(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.psk.is_some() {
            profile.psk = Some(MASK.into());
        }
    }
    cfg
}

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_psk() -> Result<String, CliError> {
    let psk = rpassword::prompt_password("Passphrase: ").map_err(prompt_err)?;
    if !(8..=63).contains(&psk.chars().count()) {
        return Err(CliError::Validation {
            field: "psk".into(),
            reason: "must be 8 to 63 characters".into(),
        });
    }
    let again = rpassword::prompt_password("Repeat passphrase: ").map_err(prompt_err)?;
    if psk != again {
        return Err(CliError::Validation {
            field: "psk".into(),
            reason: "passphrases do not match".into(),
        });
    }
    Ok(psk)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = masked(config::load(global)?);
            let toml_text = toml::to_string_pretty(&cfg).map_err(|e| CliError::Config {
                message: e.to_string(),
            })?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |_| toml_text.trim_end().to_owned(),
                |c| {
                    let mut names: Vec<&str> = c.profiles.keys().map(String::as_str).collect();
                    names.sort_unstable();
                    names.join("\n")
                },
            )?;
            output::print_output(&out, global.quiet);
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path(global).display().to_string(), false);
        }

        ConfigCommand::Profiles => {
            let cfg = config::load(global)?;
            let default = config::active_profile_name(global, &cfg);
            let mut names: Vec<&String> = cfg.profiles.keys().collect();
            names.sort_unstable();
            let lines: Vec<String> = names
                .into_iter()
                .map(|n| {
                    if *n == default {
                        format!("{n} (active)")
                    } else {
                        n.clone()
                    }
                })
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
        }

        ConfigCommand::SetPsk { plaintext } => {
            let active = config::resolve(global)?;
            let psk = prompt_psk()?;

            if plaintext {
                let path = config::config_path(global);
                let prompt = format!("Store the passphrase unencrypted in {}?", path.display());
                if !util::confirm(&prompt, global.yes)? {
                    return Ok(());
                }
                let mut cfg = config::load(global)?;
                if let Some(profile) = cfg.profiles.get_mut(&active.name) {
                    profile.psk = Some(psk);
                }
                softap_config::save_config_to(&cfg, &path)?;
                eprintln!("✓ Passphrase saved to {}", path.display());
            } else {
                softap_config::store_psk(&active.name, &psk)?;
                eprintln!("✓ Passphrase stored in system keyring");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_plaintext_passphrases() {
        let cfg: Config = toml::from_str(
            "[profiles.home]\nssid = \"Home\"\npsk = \"secret-pass\"\n\n\
             [profiles.open]\nssid = \"Open\"\n",
        )
        .unwrap();
        let cfg = masked(cfg);
        assert_eq!(cfg.profiles["home"].psk.as_deref(), Some(MASK));
        assert_eq!(cfg.profiles["open"].psk, None);
    }
}
