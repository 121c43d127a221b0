//! Destination - the logical endpoint a session is dispatched to
//!
//! Router ONLY depends on Destination, never on Stream or IO.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Address;
use crate::error::{Error, Result};

/// Network type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Tcp,
    Udp,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
            Network::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Network::Tcp),
            "udp" => Ok(Network::Udp),
            _ => Err(Error::InvalidAddress(format!("unknown network: {}", s))),
        }
    }
}

/// A logical network endpoint: transport network plus address.
///
/// Immutable once built; the dispatcher only ever borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    network: Network,
    address: Address,
}

impl Destination {
    pub fn new(network: Network, address: Address) -> Self {
        Self { network, address }
    }

    pub fn tcp(address: impl Into<Address>) -> Self {
        Self::new(Network::Tcp, address.into())
    }

    pub fn udp(address: impl Into<Address>) -> Self {
        Self::new(Network::Udp, address.into())
    }

    /// Parse `[tcp:|udp:]host:port`. Without a prefix the network is TCP.
    pub fn parse(s: &str) -> Result<Self> {
        let (network, rest) = match s.split_once(':') {
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case("tcp") => (Network::Tcp, rest),
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case("udp") => (Network::Udp, rest),
            _ => (Network::Tcp, s),
        };
        Ok(Self::new(network, rest.parse()?))
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.network, self.address)
    }
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Destination::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_network_prefix() {
        let dest = Destination::parse("udp:8.8.8.8:53").unwrap();
        assert_eq!(dest.network(), Network::Udp);
        assert_eq!(dest.port(), 53);
        assert_eq!(dest.to_string(), "udp:8.8.8.8:53");
    }

    #[test]
    fn test_parse_defaults_to_tcp() {
        let dest: Destination = "example.com:443".parse().unwrap();
        assert_eq!(dest, Destination::tcp(("example.com", 443)));
        assert_eq!(dest.to_string(), "tcp:example.com:443");
    }

    #[test]
    fn test_parse_ipv6() {
        let dest = Destination::parse("tcp:[2001:db8::1]:8443").unwrap();
        assert_eq!(dest.address().host(), "2001:db8::1");
        assert_eq!(dest.port(), 8443);
    }
}
