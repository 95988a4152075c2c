//! Device records and the accumulated topology graph.

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

use indexmap::IndexMap;
use serde::Serialize;

/// Network address of a device; the identity key for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create an address, trimming surrounding whitespace.
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(address.as_ref().trim().to_string())
    }

    /// Parse a neighbor-reported address, rejecting anything that is not a
    /// dotted-quad IPv4 address.
    pub fn parse_ipv4(text: &str) -> Option<Self> {
        let text = text.trim();
        text.parse::<Ipv4Addr>().ok().map(|_| Self(text.to_string()))
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the address is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Descriptive facts reported by a device about itself.
///
/// Every field is optional; vendors expose different subsets and a field
/// that fails to parse is simply left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SystemInfo {
    /// Whether no field was populated.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One LLDP-equivalent adjacency entry reported by a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NeighborRecord {
    /// Management address of the neighbor, if advertised.
    pub address: Option<DeviceAddress>,
    /// Chassis id, normally a MAC address.
    pub hardware_id: Option<String>,
    /// Vendor guessed from the neighbor's system description.
    pub vendor_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<String>,
}

impl NeighborRecord {
    /// A neighbor known only by its management address.
    pub fn with_address(address: impl Into<DeviceAddress>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }

    /// Whether the entry carries any identifying information at all.
    pub fn is_empty(&self) -> bool {
        self.address.is_none() && self.hardware_id.is_none()
    }
}

/// Everything learned about one successfully probed device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub address: DeviceAddress,
    pub hardware_id: Option<String>,
    pub vendor: Option<String>,
    /// Login that was accepted by the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "SystemInfo::is_empty")]
    pub system: SystemInfo,
    pub neighbors: Vec<NeighborRecord>,
}

impl DeviceRecord {
    /// A record with no hardware id, system facts or neighbors.
    pub fn new(address: DeviceAddress, vendor: impl Into<String>) -> Self {
        Self {
            address,
            hardware_id: None,
            vendor: Some(vendor.into()),
            username: None,
            system: SystemInfo::default(),
            neighbors: Vec::new(),
        }
    }

    /// Neighbor addresses in report order, duplicates removed.
    pub fn neighbor_addresses(&self) -> Vec<&DeviceAddress> {
        let mut seen = HashSet::new();
        self.neighbors
            .iter()
            .filter_map(|n| n.address.as_ref())
            .filter(|a| !a.is_empty() && seen.insert(*a))
            .collect()
    }
}

/// An undirected connection between two discovered or reported devices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Link {
    pub a: DeviceAddress,
    pub b: DeviceAddress,
}

impl Link {
    /// Build a link with its endpoints in canonical order.
    pub fn new(x: DeviceAddress, y: DeviceAddress) -> Self {
        if x <= y { Self { a: x, b: y } } else { Self { a: y, b: x } }
    }
}

/// The accumulated discovery graph: address to device record.
///
/// Grows monotonically during a run. Iteration follows discovery order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Topology {
    devices: IndexMap<DeviceAddress, DeviceRecord>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, replacing any earlier record for the same address.
    pub fn insert(&mut self, record: DeviceRecord) {
        self.devices.insert(record.address.clone(), record);
    }

    /// Look up a device by address.
    pub fn get(&self, address: &DeviceAddress) -> Option<&DeviceRecord> {
        self.devices.get(address)
    }

    /// Whether a device has been recorded for the address.
    pub fn contains(&self, address: &DeviceAddress) -> bool {
        self.devices.contains_key(address)
    }

    /// Addresses of all recorded devices, in discovery order.
    pub fn addresses(&self) -> impl Iterator<Item = &DeviceAddress> {
        self.devices.keys()
    }

    /// All recorded devices, in discovery order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    /// Number of recorded devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Deduplicated undirected adjacency.
    ///
    /// A connection reported by both ends appears once. Links to neighbors
    /// that were never resolved are included; self-loops are not.
    pub fn links(&self) -> Vec<Link> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for device in self.devices.values() {
            for neighbor in device.neighbor_addresses() {
                if *neighbor == device.address {
                    continue;
                }
                let link = Link::new(device.address.clone(), neighbor.clone());
                if seen.insert(link.clone()) {
                    links.push(link);
                }
            }
        }
        links
    }
}
