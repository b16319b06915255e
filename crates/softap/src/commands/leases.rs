//! DHCP lease listing.

use softap_core::leases::{self, Lease};
use tabled::Tabled;

use crate::cli::{GlobalOpts, LeasesArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct LeaseRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Expires")]
    expires: String,
}

impl From<&Lease> for LeaseRow {
    fn from(l: &Lease) -> Self {
        Self {
            mac: l.mac.to_string(),
            ip: l.ip.to_string(),
            hostname: l.hostname.clone().unwrap_or_else(|| "-".into()),
            expires: l
                .expires
                .map_or_else(|| "never".into(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

pub fn handle(args: &LeasesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = match args.file {
        Some(ref file) => file.clone(),
        None => {
            let active = config::resolve(global)?;
            softap_config::state_paths(&active.profile, &active.defaults).lease_file
        }
    };

    let mut all = leases::read_leases(&path)?;
    if let Some(ref raw) = args.mac {
        let mac = util::parse_mac(raw)?;
        all.retain(|l| l.mac == mac);
        if all.is_empty() {
            return Err(CliError::NotFound {
                resource_type: "lease".into(),
                identifier: mac.to_string(),
            });
        }
    }

    let out = output::render_list(
        &global.output,
        &all,
        |l| LeaseRow::from(l),
        |l| format!("{} {}", l.mac, l.ip),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
