// ── dnsmasq lease file ──
//
// One lease per line: `<expiry> <mac> <ip> <hostname> <client-id>`, where
// expiry is a UNIX timestamp (0 for infinite) and `*` means "no hostname".

use std::net::IpAddr;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::trace;

use crate::error::CoreError;
use crate::model::MacAddress;
use crate::store::fsutil::read_optional;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lease {
    /// `None` for an infinite lease.
    pub expires: Option<DateTime<Utc>>,
    pub mac: MacAddress,
    pub ip: IpAddr,
    pub hostname: Option<String>,
}

pub fn parse_leases(text: &str) -> Vec<Lease> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Lease> {
    let mut fields = line.split_whitespace();
    let expiry: i64 = fields.next()?.parse().ok()?;
    let mac = MacAddress::parse(fields.next()?).ok()?;
    let ip: IpAddr = fields.next()?.parse().ok()?;
    let hostname = fields
        .next()
        .filter(|h| *h != "*")
        .map(str::to_owned);
    let expires = if expiry == 0 {
        None
    } else {
        DateTime::from_timestamp(expiry, 0)
    };
    Some(Lease {
        expires,
        mac,
        ip,
        hostname,
    })
}

/// Read `path` and return every parseable lease. A missing file has none.
pub fn read_leases(path: &Path) -> Result<Vec<Lease>, CoreError> {
    Ok(parse_leases(&read_optional(path)?))
}

/// Latest lease for `mac`, if any.
pub fn find_lease(path: &Path, mac: &MacAddress) -> Result<Option<Lease>, CoreError> {
    let found = read_leases(path)?.into_iter().rev().find(|l| &l.mac == mac);
    trace!(%mac, found = found.is_some(), "lease lookup");
    Ok(found)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = "\
1700000000 aa:bb:cc:dd:ee:ff 192.168.43.23 pixel 01:aa:bb:cc:dd:ee:ff
0 11:22:33:44:55:66 192.168.43.40 * *
garbage line
1700000100 AA:BB:CC:DD:EE:FF 192.168.43.24 pixel-2 *
";

    #[test]
    fn parses_hostnames_and_infinite_leases() {
        let leases = parse_leases(SAMPLE);
        assert_eq!(leases.len(), 3);
        assert_eq!(leases[0].hostname.as_deref(), Some("pixel"));
        assert!(leases[0].expires.is_some());
        assert_eq!(leases[1].hostname, None);
        assert_eq!(leases[1].expires, None);
    }

    #[test]
    fn find_returns_the_latest_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dnsmasq.leases");
        std::fs::write(&path, SAMPLE).unwrap();
        let mac = MacAddress::parse("aa:bb:cc:dd:ee:ff").unwrap();
        let lease = find_lease(&path, &mac).unwrap().unwrap();
        assert_eq!(lease.ip.to_string(), "192.168.43.24");
    }

    #[test]
    fn missing_file_has_no_leases() {
        let dir = tempfile::tempdir().unwrap();
        let mac = MacAddress::parse("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(find_lease(&dir.path().join("nope"), &mac).unwrap(), None);
    }
}
