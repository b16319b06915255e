//! Command handlers: bridge CLI args -> softap_core -> output formatting.

pub mod acl;
pub mod config_cmd;
pub mod leases;
pub mod render_conf;
pub mod run;
pub mod util;
