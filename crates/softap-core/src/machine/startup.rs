// ── Soft AP startup sequence ──
//
// validate -> country code -> channel -> base config -> managed directives
// -> accept file -> start daemon. Only the base configuration and the
// daemon start are fatal once validation passes; local file errors are
// logged and the AP comes up with whatever the daemon can read.

use secrecy::ExposeSecret;
use softap_hal::{Band, EncryptionType, HostapdParams};
use tracing::{debug, error, info, warn};

use crate::channel::select_channel;
use crate::config::SoftApConfiguration;
use crate::controller::Shared;
use crate::hostapd_conf::{append_directives, write_accept_file, ManagedDirectives};
use crate::model::StartFailure;

/// WPA passphrases are 8 to 63 characters.
const PSK_LEN: std::ops::RangeInclusive<usize> = 8..=63;

pub(crate) fn start_soft_ap(
    shared: &Shared,
    config: &SoftApConfiguration,
) -> Result<(), StartFailure> {
    let cfg = &shared.config;
    let ap = &shared.backends.ap_interface;

    if config.ssid.is_empty() || config.ssid.len() > 32 {
        error!(ssid = %config.ssid, "SSID must be 1 to 32 bytes");
        return Err(StartFailure::General);
    }
    let encryption = config.security.encryption_type();
    let psk = match (encryption, &config.psk) {
        (EncryptionType::None, _) => None,
        (_, Some(psk)) if PSK_LEN.contains(&psk.expose_secret().len()) => Some(psk.clone()),
        (_, _) => {
            error!("secured hotspot needs an 8 to 63 character passphrase");
            return Err(StartFailure::General);
        }
    };

    match (&cfg.country_code, config.band) {
        (None, Band::FiveGhz) => {
            error!("5 GHz requires a country code");
            return Err(StartFailure::General);
        }
        (None, Band::TwoGhz) => {}
        (Some(cc), band) => match ap.set_country_code(cc) {
            Ok(true) => debug!(country_code = %cc, "country code set"),
            Ok(false) | Err(_) if band == Band::FiveGhz => {
                error!(country_code = %cc, "cannot set country code required for 5 GHz");
                return Err(StartFailure::General);
            }
            Ok(false) | Err(_) => warn!(country_code = %cc, "cannot set country code"),
        },
    }

    let channel = select_channel(&**ap, config.band, config.channel, &cfg.allowed_channels_2g)?;

    let params = HostapdParams {
        ssid: config.ssid.clone(),
        hidden: config.hidden,
        channel,
        encryption,
        psk,
    };
    match ap.write_hostapd_config(&params) {
        Ok(true) => {}
        Ok(false) => {
            error!("hostapd configuration rejected");
            return Err(StartFailure::General);
        }
        Err(e) => {
            error!(error = %e, "writing hostapd configuration failed");
            return Err(StartFailure::General);
        }
    }

    let directives = ManagedDirectives {
        max_num_sta: cfg.max_num_sta,
        all_devices_allowed: shared.acl.is_all_allowed(),
        accept_mac_file: &cfg.paths.accept_mac_file,
        wps: &cfg.wps,
    };
    if let Err(e) = append_directives(ap.hostapd_config_path(), &directives) {
        error!(error = %e, "cannot append managed directives");
    }

    shared.acl.init_if_necessary();
    if let Err(e) = write_accept_file(&cfg.paths.accept_mac_file, &shared.acl.list_all()) {
        error!(error = %e, "cannot write accept file");
    }

    match ap.start_hostapd() {
        Ok(true) => {
            info!(ssid = %params.ssid, channel, %encryption, "hostapd started");
            Ok(())
        }
        Ok(false) => {
            error!("hostapd failed to start");
            Err(StartFailure::General)
        }
        Err(e) => {
            error!(error = %e, "starting hostapd failed");
            Err(StartFailure::General)
        }
    }
}
