// Network access control list
// Rules are `[+|-]a.b.c.d[/bits]`, evaluated in order with the last
// matching rule winning. An empty list admits everyone; a non-empty
// list denies anyone no rule admits.

use std::net::{IpAddr, Ipv4Addr};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy)]
struct AclRule {
    allow: bool,
    net: u32,
    mask: u32,
}

#[derive(Debug, Clone, Default)]
pub struct AccessList {
    rules: Vec<AclRule>,
}

impl AccessList {
    /// Parse a comma-separated rule list. Any malformed rule is fatal.
    pub fn parse(spec: &str) -> Result<AccessList, ConfigError> {
        let mut rules = Vec::new();
        for entry in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            rules.push(
                parse_rule(entry).ok_or_else(|| ConfigError::InvalidAclRule(entry.to_string()))?,
            );
        }
        Ok(AccessList { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decide whether a client at `ip` may connect.
    pub fn permits(&self, ip: IpAddr) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        let ip = match ip {
            IpAddr::V4(v4) => u32::from(v4),
            // Rules are IPv4 networks; v4-mapped v6 clients still match.
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => u32::from(v4),
                None => return false,
            },
        };
        let mut allowed = false;
        for rule in &self.rules {
            if ip & rule.mask == rule.net & rule.mask {
                allowed = rule.allow;
            }
        }
        allowed
    }
}

fn parse_rule(entry: &str) -> Option<AclRule> {
    let allow = match entry.as_bytes().first()? {
        b'+' => true,
        b'-' => false,
        _ => return None,
    };
    let (addr_str, bits) = match entry[1..].split_once('/') {
        Some((a, b)) => {
            let bits = b.parse::<u8>().ok()?;
            if bits > 32 {
                return None;
            }
            (a, bits)
        }
        None => (&entry[1..], 32),
    };
    let net = u32::from(addr_str.parse::<Ipv4Addr>().ok()?);
    let mask = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
    Some(AclRule { allow, net, mask })
}
