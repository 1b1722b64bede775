use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;

use crate::error::ConfigError;

/// An IPv4 network to sweep, kept as base address + prefix length.
///
/// Host bits in the base address are dropped on construction, so
/// `192.168.1.77/24` and `192.168.1.0/24` describe the same range.
/// Network and broadcast addresses are not probed unless the prefix is
/// `/31` or `/32`, where every address is a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkRange {
    network: Ipv4Network,
}

impl NetworkRange {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, ConfigError> {
        let input = format!("{addr}/{prefix}");
        let with_host_bits = Ipv4Network::new(addr, prefix)
            .map_err(|e| ConfigError::network(&input, e.to_string()))?;
        let network = Ipv4Network::new(with_host_bits.network(), prefix)
            .map_err(|e| ConfigError::network(&input, e.to_string()))?;
        Ok(Self { network })
    }

    /// Builds a range from a dotted netmask such as `255.255.255.0`.
    pub fn with_mask(addr: Ipv4Addr, mask: Ipv4Addr) -> Result<Self, ConfigError> {
        let prefix = mask_to_prefix(mask).ok_or_else(|| {
            ConfigError::network(&format!("{addr} {mask}"), "netmask is not contiguous")
        })?;
        Self::new(addr, prefix)
    }

    pub fn single(addr: Ipv4Addr) -> Self {
        Self {
            network: Ipv4Network::from(addr),
        }
    }

    /// Parses the two-argument form `<network> [mask]`, where the mask may be
    /// a prefix length (`24`) or a dotted netmask (`255.255.255.0`).
    pub fn from_parts(network: &str, mask: Option<&str>) -> Result<Self, ConfigError> {
        match mask {
            None => network.parse(),
            Some(mask) => {
                let addr = parse_addr(network, network)?;
                build(addr, mask, &format!("{network} {mask}"))
            }
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network.network()
    }

    pub fn prefix(&self) -> u8 {
        self.network.prefix()
    }

    /// Number of addresses that will be probed. Always at least one.
    pub fn len(&self) -> usize {
        let (first, last) = self.bounds();
        (last - first) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let (first, last) = self.bounds();
        (first..=last).contains(&u32::from(addr))
    }

    /// Usable host addresses in ascending order.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + Send + 'static {
        let (first, last) = self.bounds();
        (first..=last).map(Ipv4Addr::from)
    }

    fn bounds(&self) -> (u32, u32) {
        let start: u32 = self.network.network().into();
        let end: u32 = self.network.broadcast().into();
        if self.network.prefix() >= 31 {
            (start, end)
        } else {
            (start + 1, end - 1)
        }
    }
}

impl FromStr for NetworkRange {
    type Err = ConfigError;

    /// Accepts `a.b.c.d`, `a.b.c.d/24` and `a.b.c.d/255.255.255.0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('/') {
            None => Ok(Self::single(parse_addr(s, s)?)),
            Some((addr_str, mask_str)) => build(parse_addr(addr_str, s)?, mask_str, s),
        }
    }
}

impl fmt::Display for NetworkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network.network(), self.network.prefix())
    }
}

fn build(addr: Ipv4Addr, mask: &str, input: &str) -> Result<NetworkRange, ConfigError> {
    let mask = mask.trim();
    if let Ok(prefix) = mask.parse::<u8>() {
        return NetworkRange::new(addr, prefix)
            .map_err(|_| ConfigError::network(input, format!("prefix {prefix} is out of range")));
    }
    let dotted = mask
        .parse::<Ipv4Addr>()
        .map_err(|_| ConfigError::network(input, format!("'{mask}' is neither a prefix nor a netmask")))?;
    NetworkRange::with_mask(addr, dotted)
}

fn parse_addr(s: &str, input: &str) -> Result<Ipv4Addr, ConfigError> {
    s.trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| ConfigError::network(input, e.to_string()))
}

fn mask_to_prefix(mask: Ipv4Addr) -> Option<u8> {
    let bits: u32 = mask.into();
    let prefix = bits.leading_ones();
    let rest = bits.checked_shl(prefix).unwrap_or(0);
    (rest == 0).then_some(prefix as u8)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_30_has_two_usable_hosts() {
        let range: NetworkRange = "192.0.2.0/30".parse().unwrap();
        let hosts: Vec<Ipv4Addr> = range.hosts().collect();
        assert_eq!(
            hosts,
            vec![Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2)]
        );
        assert_eq!(range.len(), 2);
    }

    #[test]
    fn slash_24_excludes_network_and_broadcast() {
        let range: NetworkRange = "10.0.0.0/24".parse().unwrap();
        assert_eq!(range.len(), 254);
        assert!(!range.contains(Ipv4Addr::new(10, 0, 0, 0)));
        assert!(!range.contains(Ipv4Addr::new(10, 0, 0, 255)));
        assert!(range.contains(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(range.contains(Ipv4Addr::new(10, 0, 0, 254)));
        assert!(!range.contains(Ipv4Addr::new(10, 0, 1, 1)));
    }

    #[test]
    fn point_to_point_and_single_host_ranges_keep_every_address() {
        let p2p: NetworkRange = "10.0.0.0/31".parse().unwrap();
        assert_eq!(p2p.len(), 2);

        let single: NetworkRange = "10.0.0.9".parse().unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.hosts().next(), Some(Ipv4Addr::new(10, 0, 0, 9)));
        assert_eq!(single.prefix(), 32);
    }

    #[test]
    fn host_bits_are_masked_off() {
        let range: NetworkRange = "192.168.1.77/24".parse().unwrap();
        assert_eq!(range.network(), Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(range.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn dotted_masks_and_two_part_form() {
        let a = NetworkRange::from_parts("192.168.1.0", Some("255.255.255.0")).unwrap();
        let b = NetworkRange::from_parts("192.168.1.0", Some("24")).unwrap();
        let c: NetworkRange = "192.168.1.0/255.255.255.0".parse().unwrap();
        let d = NetworkRange::from_parts("192.168.1.0/24", None).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, d);
    }

    #[test]
    fn rejects_bad_input() {
        assert!("10.0.0.0/33".parse::<NetworkRange>().is_err());
        assert!("10.0.0.256/24".parse::<NetworkRange>().is_err());
        assert!("not-an-ip".parse::<NetworkRange>().is_err());
        assert!(NetworkRange::from_parts("10.0.0.0", Some("255.0.255.0")).is_err());
        assert!(NetworkRange::from_parts("10.0.0.0", Some("banana")).is_err());
    }

    #[test]
    fn mask_to_prefix_handles_edges() {
        assert_eq!(mask_to_prefix(Ipv4Addr::new(0, 0, 0, 0)), Some(0));
        assert_eq!(mask_to_prefix(Ipv4Addr::new(255, 255, 255, 255)), Some(32));
        assert_eq!(mask_to_prefix(Ipv4Addr::new(255, 255, 255, 252)), Some(30));
        assert_eq!(mask_to_prefix(Ipv4Addr::new(255, 255, 0, 255)), None);
    }
}
