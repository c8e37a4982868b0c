use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};

/// An address bound to a named network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAssociation {
    pub name: String,
    pub addr: IpAddr,
    pub index: u32,
    pub loopback: bool,
}

impl InterfaceAssociation {
    fn usable(&self) -> bool {
        !self.loopback && !self.addr.is_unspecified()
    }
}

/// Where interface associations come from.
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> Vec<InterfaceAssociation>;
}

/// Enumerates the host's interfaces using the `getifaddrs` crate.
#[derive(Debug, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> Vec<InterfaceAssociation> {
        use getifaddrs::{Address, InterfaceFlags};

        let Ok(ifaces) = getifaddrs::getifaddrs() else {
            tracing::debug!("interface enumeration failed");
            return vec![];
        };
        ifaces
            .filter(|i| i.flags.contains(InterfaceFlags::UP))
            .filter_map(|i| {
                let addr = match &i.address {
                    Address::V4(net_addr) => IpAddr::V4(net_addr.address),
                    Address::V6(net_addr) => IpAddr::V6(net_addr.address),
                    _ => return None,
                };
                Some(InterfaceAssociation {
                    loopback: i.flags.contains(InterfaceFlags::LOOPBACK),
                    name: i.name.clone(),
                    addr,
                    index: i.index.unwrap_or(0),
                })
            })
            .collect()
    }
}

/// A fixed list of interfaces, for hosts with a known layout and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces(pub Vec<InterfaceAssociation>);

impl InterfaceSource for StaticInterfaces {
    fn interfaces(&self) -> Vec<InterfaceAssociation> {
        self.0.clone()
    }
}

/// Process-wide network configuration snapshot.
///
/// The interface list is enumerated on first use and cached until
/// [`forget`](Self::forget) is called. The server forgets it on every stop
/// so the next start sees the current interfaces.
pub struct NetworkConfiguration {
    source: Box<dyn InterfaceSource>,
    snapshot: Mutex<Option<Arc<Vec<InterfaceAssociation>>>>,
}

impl NetworkConfiguration {
    pub fn new(source: impl InterfaceSource + 'static) -> Self {
        Self { source: Box::new(source), snapshot: Mutex::new(None) }
    }

    pub fn system() -> Self {
        Self::new(SystemInterfaces)
    }

    pub fn snapshot(&self) -> Arc<Vec<InterfaceAssociation>> {
        let mut guard = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(guard.get_or_insert_with(|| {
            let ifaces = self.source.interfaces();
            tracing::debug!("network configuration: {} interface addresses", ifaces.len());
            Arc::new(ifaces)
        }))
    }

    pub fn is_cached(&self) -> bool {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn forget(&self) {
        if self.snapshot.lock().unwrap_or_else(PoisonError::into_inner).take().is_some() {
            tracing::debug!("network configuration forgotten");
        }
    }

    /// Address associated with the interface called `name`. IPv4 is preferred.
    pub fn address_for_interface(&self, name: &str) -> Option<InterfaceAssociation> {
        let snapshot = self.snapshot();
        let named: Vec<&InterfaceAssociation> = snapshot
            .iter()
            .filter(|i| i.name == name && !i.addr.is_unspecified())
            .collect();
        named
            .iter()
            .find(|i| i.addr.is_ipv4())
            .or(named.first())
            .map(|i| (*i).clone())
    }

    /// First non-loopback IPv4 address on any interface.
    pub fn default_interface_address(&self) -> Option<InterfaceAssociation> {
        self.snapshot()
            .iter()
            .find(|i| i.usable() && i.addr.is_ipv4())
            .cloned()
    }

    pub fn interface_for_address(&self, addr: IpAddr) -> Option<InterfaceAssociation> {
        self.snapshot().iter().find(|i| i.addr == addr).cloned()
    }
}

impl std::fmt::Debug for NetworkConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConfiguration")
            .field("cached", &self.is_cached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn assoc(name: &str, addr: IpAddr, loopback: bool) -> InterfaceAssociation {
        InterfaceAssociation { name: name.into(), addr, index: 1, loopback }
    }

    fn sample() -> NetworkConfiguration {
        NetworkConfiguration::new(StaticInterfaces(vec![
            assoc("lo", IpAddr::V4(Ipv4Addr::LOCALHOST), true),
            assoc("eth0", IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)), false),
            assoc("eth0", IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)), false),
        ]))
    }

    #[test]
    fn named_interface_prefers_ipv4() {
        let ia = sample().address_for_interface("eth0").unwrap();
        assert_eq!(ia.addr, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)));
    }

    #[test]
    fn unknown_interface_is_none() {
        assert!(sample().address_for_interface("wlan9").is_none());
    }

    #[test]
    fn default_skips_loopback() {
        let ia = sample().default_interface_address().unwrap();
        assert_eq!(ia.name, "eth0");
    }

    #[test]
    fn forget_drops_snapshot() {
        let net = sample();
        assert!(!net.is_cached());
        net.snapshot();
        assert!(net.is_cached());
        net.forget();
        assert!(!net.is_cached());
        net.forget();
        assert!(!net.is_cached());
    }

    #[test]
    fn system_interfaces_include_loopback() {
        let ifaces = SystemInterfaces.interfaces();
        assert!(ifaces.iter().any(|i| i.loopback && i.addr.is_loopback()), "got {ifaces:?}");
    }
}
