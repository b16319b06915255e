//! Render the hostapd configuration of a profile without starting anything.
//!
//! Goes through the same steps as a real start: country code, channel
//! selection, base configuration from the local backend, then the managed
//! directives appended by the core.

use std::path::Path;

use softap_core::channel::select_channel;
use softap_core::hostapd_conf::{ManagedDirectives, append_directives};
use softap_core::Band;
use softap_hal::HostapdParams;
use softap_hal::local::LocalHal;

use crate::cli::{GlobalOpts, RenderConfArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

const PASSPHRASE_KEY: &str = "wpa_passphrase=";

pub fn handle(args: &RenderConfArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let active = config::resolve(global)?;
    let ap_config = softap_config::profile_to_soft_ap_config(&active.profile, &active.name)?;
    let manager = softap_config::profile_to_manager_config(&active.profile, &active.defaults)?;

    let scratch = tempfile::tempdir()?;
    let target = args
        .out
        .clone()
        .unwrap_or_else(|| scratch.path().join("hostapd.conf"));
    let mut hal_config =
        softap_config::profile_to_local_hal_config(&active.profile, &active.defaults);
    hal_config.conf_path.clone_from(&target);
    let ap = LocalHal::new(hal_config).ap_interface();

    match manager.country_code {
        Some(ref cc) => {
            if !ap.set_country_code(cc)? {
                return Err(CliError::Validation {
                    field: "country_code".into(),
                    reason: format!("'{cc}' was rejected"),
                });
            }
        }
        None if ap_config.band == Band::FiveGhz => {
            return Err(CliError::Validation {
                field: "country_code".into(),
                reason: "required for the 5 GHz band".into(),
            });
        }
        None => {}
    }

    let channel = select_channel(
        ap.as_ref(),
        ap_config.band,
        ap_config.channel,
        &manager.allowed_channels_2g,
    )
    .map_err(|reason| CliError::StartFailed { reason })?;

    let params = HostapdParams {
        ssid: ap_config.ssid.clone(),
        hidden: ap_config.hidden,
        channel,
        encryption: ap_config.security.encryption_type(),
        psk: ap_config.psk.clone(),
    };
    if !ap.write_hostapd_config(&params)? {
        return Err(CliError::Validation {
            field: "psk".into(),
            reason: "passphrase must be 8 to 63 characters".into(),
        });
    }

    let all_devices_allowed = util::open_acl(&active).is_all_allowed();
    append_directives(
        &target,
        &ManagedDirectives {
            max_num_sta: manager.max_num_sta,
            all_devices_allowed,
            accept_mac_file: &manager.paths.accept_mac_file,
            wps: &manager.wps,
        },
    )?;

    if args.out.is_some() {
        if !global.quiet {
            eprintln!("Wrote {}", target.display());
        }
        return Ok(());
    }
    let text = read_masked(&target, args.show_psk)?;
    output::print_output(text.trim_end(), global.quiet);
    Ok(())
}

fn read_masked(path: &Path, show_psk: bool) -> Result<String, CliError> {
    let text = std::fs::read_to_string(path)?;
    if show_psk {
        return Ok(text);
    }
    Ok(mask_passphrase(&text))
}

fn mask_passphrase(conf: &str) -> String {
    conf.lines()
        .map(|line| {
            if line.starts_with(PASSPHRASE_KEY) {
                format!("{PASSPHRASE_KEY}********")
            } else {
                line.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passphrase_line_is_masked() {
        assert_eq!(
            mask_passphrase("ssid=Home\nwpa_passphrase=hunter22\nwpa=2\n"),
            "ssid=Home\nwpa_passphrase=********\nwpa=2"
        );
    }
}
