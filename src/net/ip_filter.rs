use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// One octet position of an IPv4 pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Octet {
    Any,
    Range(u8, u8),
}

impl Octet {
    fn matches(self, value: u8) -> bool {
        match self {
            Octet::Any => true,
            Octet::Range(lo, hi) => (lo..=hi).contains(&value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Exact(IpAddr),
    Pattern([Octet; 4]),
    Span(Ipv4Addr, Ipv4Addr),
}

impl Rule {
    fn parse(raw: &str) -> Option<Rule> {
        if let Ok(ip) = raw.parse::<IpAddr>() {
            return Some(Rule::Exact(ip));
        }
        if let Some((lo, hi)) = raw.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.trim().parse::<Ipv4Addr>(), hi.trim().parse::<Ipv4Addr>()) {
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                return Some(Rule::Span(lo, hi));
            }
        }
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 4 {
            return None;
        }
        let mut octets = [Octet::Any; 4];
        for (slot, part) in octets.iter_mut().zip(parts) {
            *slot = parse_octet(part.trim())?;
        }
        Some(Rule::Pattern(octets))
    }

    fn matches(&self, ip: IpAddr) -> bool {
        match (self, ip) {
            (Rule::Exact(rule), ip) => *rule == ip,
            (Rule::Pattern(octets), IpAddr::V4(v4)) => {
                octets.iter().zip(v4.octets()).all(|(o, v)| o.matches(v))
            }
            (Rule::Span(lo, hi), IpAddr::V4(v4)) => (*lo..=*hi).contains(&v4),
            _ => false,
        }
    }
}

fn parse_octet(part: &str) -> Option<Octet> {
    if part == "*" {
        return Some(Octet::Any);
    }
    match part.split_once('-') {
        Some((lo, hi)) => {
            let (lo, hi) = (lo.parse::<u8>().ok()?, hi.parse::<u8>().ok()?);
            Some(Octet::Range(lo.min(hi), lo.max(hi)))
        }
        None => part.parse::<u8>().ok().map(|v| Octet::Range(v, v)),
    }
}

/// IP allow-list.
///
/// Parsed from a comma-separated rule string. Each rule is an exact address
/// (`192.168.1.5`, `::1`), an IPv4 pattern with `*` or `lo-hi` octets
/// (`192.168.1.*`, `10.0.0-3.*`), or a full IPv4 span (`10.0.0.1-10.0.0.50`).
/// An empty filter admits everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpFilter {
    raw: String,
    rules: Vec<Rule>,
}

impl IpFilter {
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse `spec`, logging and skipping rules that cannot be understood.
    pub fn parse(spec: &str) -> Self {
        let rules = spec
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .filter_map(|r| {
                let rule = Rule::parse(r);
                if rule.is_none() {
                    tracing::warn!("Ignoring unparsable IP filter rule: {}", r);
                }
                rule
            })
            .collect();
        Self { raw: spec.trim().to_string(), rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn allowed(&self, ip: IpAddr) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
            v4 => v4,
        };
        let allowed = self.rules.iter().any(|r| r.matches(ip));
        tracing::trace!("IP filter: {} {}", ip, if allowed { "allowed" } else { "denied" });
        allowed
    }
}

impl fmt::Display for IpFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            f.write_str("<allow all>")
        } else {
            f.write_str(&self.raw)
        }
    }
}
