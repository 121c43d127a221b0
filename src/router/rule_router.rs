//! Rule-based Router implementation

use std::net::IpAddr;

use ipnet::IpNet;
use regex::Regex;
use tracing::warn;

use crate::common::{Address, Destination, Network};
use crate::config::{RoutingConfig, RoutingRule};
use crate::error::{Error, Result};

use super::Router;

/// Rule type - determines how the rule is evaluated
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RuleType {
    /// Match based on specified fields (domain, ip, port, network)
    #[default]
    Field,
    /// Match private/LAN IPs (10.x, 172.16.x, 192.168.x, etc.)
    PrivateIp,
    /// Match all traffic (catch-all rule)
    All,
}

impl RuleType {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "field" => RuleType::Field,
            "privateip" | "private_ip" | "private-ip" | "private" => RuleType::PrivateIp,
            "all" | "any" | "*" => RuleType::All,
            _ => RuleType::Field,
        }
    }
}

/// Compiled domain pattern
#[derive(Debug, Clone)]
enum DomainMatcher {
    /// `full:` exact match
    Full(String),
    /// `domain:` the domain itself or any subdomain
    Suffix(String),
    /// `keyword:` or plain pattern, substring match
    Keyword(String),
    /// `regexp:`
    Regex(Regex),
}

impl DomainMatcher {
    fn parse(pattern: &str) -> Result<Self> {
        let matcher = if let Some(target) = pattern.strip_prefix("full:") {
            DomainMatcher::Full(target.to_lowercase())
        } else if let Some(target) = pattern.strip_prefix("domain:") {
            DomainMatcher::Suffix(target.to_lowercase())
        } else if let Some(target) = pattern.strip_prefix("keyword:") {
            DomainMatcher::Keyword(target.to_lowercase())
        } else if let Some(expr) = pattern.strip_prefix("regexp:") {
            let re = Regex::new(expr)
                .map_err(|e| Error::Config(format!("Invalid domain regexp '{}': {}", expr, e)))?;
            DomainMatcher::Regex(re)
        } else {
            DomainMatcher::Keyword(pattern.to_lowercase())
        };
        Ok(matcher)
    }

    fn matches(&self, domain: &str) -> bool {
        match self {
            DomainMatcher::Full(target) => domain == target,
            DomainMatcher::Suffix(target) => {
                domain == target
                    || (domain.ends_with(target.as_str())
                        && domain[..domain.len() - target.len()].ends_with('.'))
            }
            DomainMatcher::Keyword(keyword) => domain.contains(keyword.as_str()),
            DomainMatcher::Regex(re) => re.is_match(domain),
        }
    }
}

/// Routing rule
#[derive(Debug, Clone, Default)]
pub struct Rule {
    /// Rule type
    pub rule_type: RuleType,
    /// Match networks
    pub network: Vec<Network>,
    /// Match domain patterns
    pub domain: Vec<String>,
    /// Match IP patterns (exact or CIDR)
    pub ip: Vec<String>,
    /// Match port patterns
    pub port: Option<String>,
    /// Target outbound tag
    pub outbound_tag: String,
}

impl Rule {
    fn from_config(config: &RoutingRule) -> Self {
        Self {
            rule_type: RuleType::from_str(&config.rule_type),
            network: config.network.clone(),
            domain: config.domain.clone(),
            ip: config.ip.clone(),
            port: config.port.clone(),
            outbound_tag: config.outbound_tag.clone(),
        }
    }
}

/// A rule with its patterns parsed once up front
struct CompiledRule {
    rule: Rule,
    domains: Vec<DomainMatcher>,
    nets: Vec<IpNet>,
}

impl CompiledRule {
    fn compile(rule: Rule) -> Result<Self> {
        let domains = rule
            .domain
            .iter()
            .map(|p| DomainMatcher::parse(p))
            .collect::<Result<Vec<_>>>()?;

        let mut nets = Vec::with_capacity(rule.ip.len());
        for pattern in &rule.ip {
            let net = if pattern.contains('/') {
                pattern.parse::<IpNet>().ok()
            } else {
                pattern.parse::<IpAddr>().ok().map(IpNet::from)
            };
            match net {
                Some(net) => nets.push(net),
                None => {
                    return Err(Error::Config(format!("Invalid IP pattern: {}", pattern)));
                }
            }
        }

        Ok(Self { rule, domains, nets })
    }
}

/// Rule-based router: first matching rule wins
pub struct RuleRouter {
    rules: Vec<CompiledRule>,
    default_outbound: String,
}

impl RuleRouter {
    pub fn new(rules: Vec<Rule>, default_outbound: impl Into<String>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            default_outbound: default_outbound.into(),
        })
    }

    /// Build from the routing section of the configuration
    pub fn from_config(config: &RoutingConfig, default_outbound: impl Into<String>) -> Result<Self> {
        let rules = config.rules.iter().map(Rule::from_config).collect();
        Self::new(rules, default_outbound)
    }

    /// Check if a rule matches the destination
    fn match_rule(&self, compiled: &CompiledRule, destination: &Destination) -> bool {
        let rule = &compiled.rule;

        // Check network
        if !rule.network.is_empty() && !rule.network.contains(&destination.network()) {
            return false;
        }

        // Check port
        if let Some(port_pattern) = &rule.port {
            if !match_port(port_pattern, destination.port()) {
                return false;
            }
        }

        // Handle special rule types
        match rule.rule_type {
            RuleType::All => return true,
            RuleType::PrivateIp => {
                return destination.address().ip().is_some_and(is_private_ip);
            }
            RuleType::Field => {
                // Continue with field-based matching below
            }
        }

        let has_domain_rules = !compiled.domains.is_empty();
        let has_ip_rules = !compiled.nets.is_empty();

        if !has_domain_rules && !has_ip_rules {
            return true;
        }

        match destination.address() {
            Address::Domain(domain, _) => {
                let domain = domain.to_lowercase();
                compiled.domains.iter().any(|m| m.matches(&domain))
            }
            Address::Socket(addr) => compiled.nets.iter().any(|net| net.contains(&addr.ip())),
        }
    }
}

impl Router for RuleRouter {
    fn select(&self, destination: &Destination) -> &str {
        for compiled in &self.rules {
            if self.match_rule(compiled, destination) {
                return &compiled.rule.outbound_tag;
            }
        }

        &self.default_outbound
    }
}

/// Check if IP is private/LAN address
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()           // 10.x, 172.16-31.x, 192.168.x
                || ipv4.is_loopback()   // 127.x
                || ipv4.is_link_local() // 169.254.x
                || ipv4.is_broadcast()  // 255.255.255.255
                || ipv4.octets()[0] == 0 // 0.x (current network)
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback()          // ::1
                || ipv6.is_unspecified() // ::
                // Check for link-local (fe80::/10)
                || (ipv6.segments()[0] & 0xffc0) == 0xfe80
                // Check for unique local (fc00::/7)
                || (ipv6.segments()[0] & 0xfe00) == 0xfc00
        }
    }
}

/// Match port pattern (e.g., "80", "80,443", "1000-2000")
fn match_port(pattern: &str, port: u16) -> bool {
    for part in pattern.split(',') {
        let part = part.trim();
        if let Some((start, end)) = part.split_once('-') {
            match (start.trim().parse::<u16>(), end.trim().parse::<u16>()) {
                (Ok(start), Ok(end)) if (start..=end).contains(&port) => return true,
                (Ok(_), Ok(_)) => {}
                _ => warn!("Ignoring malformed port range: {}", part),
            }
        } else if part.parse::<u16>() == Ok(port) {
            return true;
        }
    }
    false
}
