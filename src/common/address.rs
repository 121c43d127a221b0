//! Address type for logical endpoints

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::error::Error;

/// Network address representation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// IP socket address (IP + port)
    Socket(SocketAddr),
    /// Domain name with port
    Domain(String, u16),
}

impl Address {
    /// Create from domain and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        Address::Domain(domain.into(), port)
    }

    /// Create from IP and port
    pub fn ip_port(ip: IpAddr, port: u16) -> Self {
        Address::Socket(SocketAddr::new(ip, port))
    }

    pub fn port(&self) -> u16 {
        match self {
            Address::Socket(addr) => addr.port(),
            Address::Domain(_, port) => *port,
        }
    }

    /// Get the host part as string
    pub fn host(&self) -> String {
        match self {
            Address::Socket(addr) => addr.ip().to_string(),
            Address::Domain(domain, _) => domain.clone(),
        }
    }

    /// IP of a socket address; domains are never resolved here
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Address::Socket(addr) => Some(addr.ip()),
            Address::Domain(_, _) => None,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Socket(addr) => write!(f, "{}", addr),
            Address::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Parse `host:port`, where host is an IPv4 address, a bracketed IPv6
    /// address or a domain name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Address::Socket(addr));
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidAddress(format!("missing port: {}", s)))?;
        let port: u16 = port
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid port: {}", s)))?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(Error::InvalidAddress(format!("missing host: {}", s)));
        }
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(Address::ip_port(ip, port));
        }

        Ok(Address::Domain(host.to_lowercase(), port))
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Address::Socket(addr)
    }
}

impl From<(&str, u16)> for Address {
    /// IP literals become socket addresses, anything else a domain
    fn from((host, port): (&str, u16)) -> Self {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        match host.parse::<IpAddr>() {
            Ok(ip) => Address::ip_port(ip, port),
            Err(_) => Address::Domain(host.to_lowercase(), port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_socket_and_domain() {
        let addr: Address = "127.0.0.1:8080".parse().unwrap();
        assert_eq!(addr, Address::Socket("127.0.0.1:8080".parse().unwrap()));

        let addr: Address = "Example.COM:443".parse().unwrap();
        assert_eq!(addr, Address::domain("example.com", 443));
        assert_eq!(addr.ip(), None);

        let addr: Address = "[::1]:53".parse().unwrap();
        assert_eq!(addr.port(), 53);
        assert_eq!(addr.host(), "::1");
    }

    #[test]
    fn test_tuple_matches_parse() {
        let addr = Address::from(("10.1.2.3", 22));
        assert_eq!(addr, "10.1.2.3:22".parse::<Address>().unwrap());
        assert!(addr.ip().is_some());

        assert_eq!(Address::from(("::1", 53)), "[::1]:53".parse::<Address>().unwrap());
        assert_eq!(Address::from(("Example.COM", 443)), Address::domain("example.com", 443));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("example.com".parse::<Address>().is_err());
        assert!("example.com:http".parse::<Address>().is_err());
        assert!(":80".parse::<Address>().is_err());
    }
}
