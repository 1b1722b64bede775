use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

/// Final product of a scan: every live host and the ports found open on it.
///
/// A host with an empty port set answered the sweep but exposed nothing in
/// the scanned range. Hosts that never answered are not keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    hosts: BTreeMap<Ipv4Addr, BTreeSet<u16>>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_host(&mut self, host: Ipv4Addr, open_ports: BTreeSet<u16>) {
        self.hosts.entry(host).or_default().extend(open_ports);
    }

    pub fn open_ports(&self, host: &Ipv4Addr) -> Option<&BTreeSet<u16>> {
        self.hosts.get(host)
    }

    pub fn contains_host(&self, host: &Ipv4Addr) -> bool {
        self.hosts.contains_key(host)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Ipv4Addr> {
        self.hosts.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ipv4Addr, &BTreeSet<u16>)> {
        self.hosts.iter()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Sum of open ports across all hosts.
    pub fn open_port_count(&self) -> usize {
        self.hosts.values().map(BTreeSet::len).sum()
    }

    pub fn into_inner(self) -> BTreeMap<Ipv4Addr, BTreeSet<u16>> {
        self.hosts
    }
}

impl From<BTreeMap<Ipv4Addr, BTreeSet<u16>>> for ScanResult {
    fn from(hosts: BTreeMap<Ipv4Addr, BTreeSet<u16>>) -> Self {
        Self { hosts }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
