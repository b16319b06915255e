//! Allow-list command handlers.
//!
//! These edit the persisted store directly. A running `softap run` picks
//! the changes up on its next start; use its `allow`/`disallow` line
//! commands to change a live hotspot.

use softap_core::AccessControlEntry;
use tabled::Tabled;

use crate::cli::{AclArgs, AclCommand, AclPolicy, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct AclRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Blocked")]
    blocked: String,
}

impl AclRow {
    pub(crate) fn new(e: &AccessControlEntry, color: bool) -> Self {
        Self {
            mac: e.mac.to_string(),
            name: e.name.clone().unwrap_or_else(|| "-".into()),
            blocked: output::yes_no(e.blocked, color),
        }
    }
}

fn policy_name(all_allowed: bool) -> &'static str {
    if all_allowed { "allow-all" } else { "allow-list" }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: AclArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let active = config::resolve(global)?;
    let acl = util::open_acl(&active);
    let color = output::should_color(&global.color);

    match args.command {
        AclCommand::List => {
            let out = output::render_list(
                &global.output,
                &acl.list_all(),
                |e| AclRow::new(e, color),
                |e| e.mac.to_string(),
            )?;
            output::print_output(&out, global.quiet);
        }

        AclCommand::Allow { mac, name } => {
            let mac = util::parse_mac(&mac)?;
            if acl.add(AccessControlEntry::new(mac.clone(), name))? {
                tracing::info!(%mac, "added to allow-list");
            } else if !global.quiet {
                eprintln!("{mac} is already on the allow-list");
            }
        }

        AclCommand::Disallow { mac } => {
            let mac = util::parse_mac(&mac)?;
            if !acl.remove(&mac)? {
                return Err(CliError::NotFound {
                    resource_type: "allow-list entry".into(),
                    identifier: mac.to_string(),
                });
            }
            tracing::info!(%mac, "removed from allow-list");
        }

        AclCommand::Policy { policy: None } => {
            let current = policy_name(acl.is_all_allowed());
            let out = output::render_single(
                &global.output,
                current,
                ToString::to_string,
                ToString::to_string,
            )?;
            output::print_output(&out, global.quiet);
        }

        AclCommand::Policy {
            policy: Some(policy),
        } => {
            let all_allowed = policy == AclPolicy::AllowAll;
            if !all_allowed
                && acl.list_all().iter().all(|e| e.blocked)
                && !util::confirm(
                    "The allow-list is empty, so no device will be able to join. Continue?",
                    global.yes,
                )?
            {
                return Ok(());
            }
            acl.set_all_allowed(all_allowed)?;
            tracing::info!(policy = policy_name(all_allowed), "access policy updated");
        }
    }
    Ok(())
}
