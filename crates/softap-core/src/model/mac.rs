// ── MacAddress ──
//
// Station addresses arrive from hostapd events, user commands and the
// persisted allow-list. All of them are normalized to the same form so the
// client table and the store agree on keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Normalize without validating. Accepts colon- or dash-separated input.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw.as_ref().trim().to_lowercase().replace('-', ":");
        Self(normalized)
    }

    /// Normalize and validate: six hex octets, or twelve bare hex digits.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidMac {
            value: raw.to_owned(),
        };
        let trimmed = raw.trim();
        let hex: String = if trimmed.len() == 12 {
            trimmed.to_owned()
        } else {
            let parts: Vec<&str> = trimmed.split([':', '-']).collect();
            if parts.len() != 6 || parts.iter().any(|p| p.len() != 2) {
                return Err(invalid());
            }
            parts.concat()
        };
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let lower = hex.to_lowercase();
        let octets: Vec<&str> = (0..6).filter_map(|i| lower.get(i * 2..i * 2 + 2)).collect();
        Ok(Self(octets.join(":")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dashes_and_case() {
        let mac = MacAddress::new("AA-BB-CC-DD-EE-FF");
        assert_eq!(mac.as_str(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn parse_accepts_bare_hex() {
        let mac: MacAddress = "AABBCCDDEEFF".parse().unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("aa:bb:cc:dd:ee".parse::<MacAddress>().is_err());
        assert!("zz:bb:cc:dd:ee:ff".parse::<MacAddress>().is_err());
        assert!("aaa:bb:cc:dd:ee:f".parse::<MacAddress>().is_err());
        assert!("".parse::<MacAddress>().is_err());
    }

    #[test]
    fn serde_validates() {
        let ok: MacAddress = from_toml("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(ok.as_str(), "aa:bb:cc:dd:ee:ff");
        assert!(from_toml("nope").is_err());
    }

    fn from_toml(value: &str) -> Result<MacAddress, toml::de::Error> {
        #[derive(Deserialize)]
        struct Wrapper {
            mac: MacAddress,
        }
        toml::from_str::<Wrapper>(&format!("mac = \"{value}\"")).map(|w| w.mac)
    }
}
