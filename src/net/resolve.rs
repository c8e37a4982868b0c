use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

use crate::config::ServerConfig;
use crate::net::interfaces::{InterfaceAssociation, NetworkConfiguration};

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("cannot resolve hostname {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("hostname {0} resolved to no addresses")]
    NoAddress(String),
}

/// What the listening socket is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindTarget {
    /// A concrete IP address.
    Address(SocketAddr),
    /// A hostname, resolved again at bind time so dynamic DNS names keep working.
    Named { host: String, port: u16 },
    /// All IPv4 addresses.
    Wildcard(u16),
}

impl BindTarget {
    pub fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        match self {
            BindTarget::Address(addr) => Ok(vec![*addr]),
            BindTarget::Named { host, port } => Ok((host.as_str(), *port).to_socket_addrs()?.collect()),
            BindTarget::Wildcard(port) => Ok(vec![SocketAddr::from((Ipv4Addr::UNSPECIFIED, *port))]),
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            BindTarget::Address(addr) => addr.port(),
            BindTarget::Named { port, .. } | BindTarget::Wildcard(port) => *port,
        }
    }
}

impl fmt::Display for BindTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindTarget::Address(addr) => write!(f, "{addr}"),
            BindTarget::Named { host, port } => write!(f, "{host}:{port}"),
            BindTarget::Wildcard(port) => write!(f, "0.0.0.0:{port}"),
        }
    }
}

/// Outcome of address resolution: where to bind and what to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub target: BindTarget,
    /// Hostname or address advertised to clients. Never empty.
    pub host: String,
    pub interface: Option<InterfaceAssociation>,
}

impl ResolvedAddress {
    /// Bind every address on `port`, reporting the local machine's address.
    pub fn wildcard(port: u16) -> Self {
        Self {
            target: BindTarget::Wildcard(port),
            host: local_machine_address(),
            interface: None,
        }
    }

    pub fn url(&self, port: u16) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("http://[{v6}]:{port}"),
            _ => format!("http://{}:{}", self.host, port),
        }
    }
}

/// Pick the bind address for `config`.
///
/// Priority: a non-blank configured hostname, then the configured (or default)
/// interface address, then the wildcard address. `previous` is the interface
/// the server was bound to on its last start; a hostname that resolves onto it
/// binds its IP directly.
pub fn resolve(
    config: &ServerConfig,
    network: &NetworkConfiguration,
    previous: Option<&InterfaceAssociation>,
) -> Result<ResolvedAddress, AddressError> {
    let port = config.port;

    if let Some(host) = config.hostname.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
        tracing::info!("Using forced address {}", host);
        let ip = lookup(host)?;
        let same_iface = previous.and_then(|prev| {
            network
                .interface_for_address(ip)
                .filter(|found| found.name == prev.name)
        });
        let (target, interface) = match same_iface {
            Some(found) => (BindTarget::Address(SocketAddr::new(ip, port)), Some(found)),
            None => (BindTarget::Named { host: host.to_string(), port }, None),
        };
        return Ok(ResolvedAddress { target, host: host.to_string(), interface });
    }

    let named = config
        .network_interface
        .as_deref()
        .filter(|n| !n.is_empty())
        .and_then(|n| network.address_for_interface(n));
    if let Some(ia) = named.or_else(|| network.default_interface_address()) {
        tracing::info!("Using address {} found on network interface: {}", ia.addr, ia.name);
        return Ok(ResolvedAddress {
            target: BindTarget::Address(SocketAddr::new(ia.addr, port)),
            host: ia.addr.to_string(),
            interface: Some(ia),
        });
    }

    tracing::info!("Using localhost address");
    Ok(ResolvedAddress::wildcard(port))
}

fn lookup(host: &str) -> Result<IpAddr, AddressError> {
    let mut addrs = (host, 0)
        .to_socket_addrs()
        .map_err(|source| AddressError::Lookup { host: host.to_string(), source })?;
    addrs
        .next()
        .map(|a| a.ip())
        .ok_or_else(|| AddressError::NoAddress(host.to_string()))
}

/// Address of this machine as seen through its own hostname, or loopback.
pub fn local_machine_address() -> String {
    hostname::get()
        .ok()
        .and_then(|os| os.into_string().ok())
        .filter(|s| !s.is_empty())
        .and_then(|name| (name.as_str(), 0).to_socket_addrs().ok())
        .and_then(|mut addrs| addrs.find(|a| a.is_ipv4()))
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|| Ipv4Addr::LOCALHOST.to_string())
}
