use std::fmt::{Display, Formatter, Result as FmtResult};

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};

/// Serial number recorded for a device that has only been seen as a neighbor.
pub const UNKNOWN_SERIAL: &str = "unknown";

/// Interface name under which a device's preferred reachability address is
/// stored in the inventory.
pub const PRIMARY_MANAGEMENT: &str = "Primary Management";

/// Platform variant detected from first-contact banner output.
///
/// The variants form a closed set; anything unrecognized is `Unknown` and
/// gets no profile-driven fact collection beyond the banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString, EnumIter)]
pub enum Platform {
    #[strum(serialize = "IOS")]
    Ios,
    #[strum(serialize = "IOS-XE")]
    IosXe,
    #[strum(serialize = "IOS-XR")]
    IosXr,
    #[strum(serialize = "NX-OS")]
    NxOs,
    #[strum(serialize = "EOS")]
    Eos,
    #[strum(serialize = "JunOS")]
    Junos,
    #[strum(serialize = "PAN-OS")]
    PanOs,
    #[strum(serialize = "ASA")]
    Asa,
    #[strum(serialize = "Unknown")]
    Unknown,
}

/// Coarse role advertised by a device in CDP/LLDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
pub enum Capability {
    Router,
    Switch,
    Host,
    Phone,
    Camera,
    #[strum(serialize = "AccessPoint", serialize = "Access Point")]
    AccessPoint,
    Server,
}

impl Capability {
    /// Map a capability word, as CDP and LLDP spell them out, to the coarse
    /// capability set. Single-letter codes are protocol-specific (CDP `S` is
    /// Switch, LLDP `S` is Station) and are mapped by the respective parser,
    /// not here. Unrecognized tokens yield `None` and are dropped.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "router" => Some(Capability::Router),
            "switch" | "bridge" => Some(Capability::Switch),
            "host" | "station" | "station only" => Some(Capability::Host),
            "phone" | "telephone" => Some(Capability::Phone),
            "camera" => Some(Capability::Camera),
            "trans-bridge" | "wlan" | "access point" | "wlan access point" => {
                Some(Capability::AccessPoint)
            }
            "server" => Some(Capability::Server),
            _ => None,
        }
    }
}

/// Neighbor-discovery protocol that produced a link record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
pub enum DiscoveryProtocol {
    #[strum(serialize = "CDP")]
    Cdp,
    #[strum(serialize = "LLDP")]
    Lldp,
}

/// One of the enumerated data categories collected per device, in the order
/// the collector executes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumIter)]
pub enum FactKind {
    #[strum(serialize = "identity")]
    Identity,
    #[strum(serialize = "version")]
    Version,
    #[strum(serialize = "interfaces")]
    Interfaces,
    #[strum(serialize = "vlans")]
    Vlans,
    #[strum(serialize = "stack_members")]
    StackMembers,
    #[strum(serialize = "cdp_neighbors")]
    CdpNeighbors,
    #[strum(serialize = "lldp_neighbors")]
    LldpNeighbors,
}

/// Hostname, serial, and hardware model from the identity commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityInfo {
    pub hostname: String,
    pub serial_number: String,
    pub hardware_model: String,
}

/// Coarse classification of an interface row in the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumString)]
pub enum InterfaceType {
    #[strum(serialize = "management")]
    Management,
    #[strum(serialize = "loopback")]
    Loopback,
    #[strum(serialize = "vlan")]
    Vlan,
    #[strum(serialize = "physical")]
    Physical,
}

impl InterfaceType {
    /// Classify a canonical interface name.
    pub fn classify(interface_name: &str) -> Self {
        let lower = interface_name.to_ascii_lowercase();
        if lower.starts_with("management") || lower.starts_with("mgmt") {
            InterfaceType::Management
        } else if lower.starts_with("loopback") {
            InterfaceType::Loopback
        } else if lower.starts_with("vlan") {
            InterfaceType::Vlan
        } else {
            InterfaceType::Physical
        }
    }
}

/// An interface with an IP address, as parsed from the interface commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub ip_address: String,
    pub subnet_mask: String,
    pub interface_type: InterfaceType,
}

/// A VLAN observed on a device, with the number of ports assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanInfo {
    pub number: u16,
    pub name: String,
    pub port_count: u32,
}

/// A directed neighbor sighting from CDP or LLDP. Interface names are in
/// canonical long form by the time this struct leaves a parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborInfo {
    pub local_interface: String,
    pub remote_name: String,
    pub remote_interface: String,
    pub remote_ip: Option<String>,
    pub platform: String,
    pub capabilities: Vec<Capability>,
    pub protocol: DiscoveryProtocol,
}

/// Role of a member switch within a stack or VSS pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumString)]
pub enum StackRole {
    Active,
    Standby,
    Member,
}

/// One physical switch in a stack or VSS chassis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMemberInfo {
    pub switch_number: u32,
    pub role: StackRole,
    pub priority: Option<u32>,
    pub hardware_model: String,
    pub serial_number: String,
    pub mac_address: Option<String>,
    pub software_version: Option<String>,
    pub state: String,
}

/// Everything collected from one device visit.
///
/// Individual fact failures do not abort collection; they are recorded in
/// `failures` and the remaining facts are still gathered. A visit that
/// produced at least `identity` counts as successful.
#[derive(Debug, Clone, Default)]
pub struct DeviceFacts {
    pub identity: Option<IdentityInfo>,
    pub software_version: Option<String>,
    pub interfaces: Vec<InterfaceInfo>,
    pub vlans: Vec<VlanInfo>,
    pub stack_members: Vec<StackMemberInfo>,
    pub neighbors: Vec<NeighborInfo>,
    pub failures: Vec<FactFailure>,
}

impl DeviceFacts {
    pub fn is_successful_visit(&self) -> bool {
        self.identity.is_some()
    }
}

/// A single fact-kind that failed during collection.
#[derive(Debug, Clone)]
pub struct FactFailure {
    pub kind: FactKind,
    pub detail: String,
}

/// Normalized identity used by the visited set: serial+name when the serial
/// is known, otherwise name, otherwise IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    pub fn new(hostname: &str, serial_number: &str, ip_address: &str) -> Self {
        let hostname = hostname.trim().to_ascii_lowercase();
        let serial = serial_number.trim().to_ascii_lowercase();
        if !hostname.is_empty() && !serial.is_empty() && serial != UNKNOWN_SERIAL {
            DeviceIdentity(format!("{serial}/{hostname}"))
        } else if !hostname.is_empty() {
            DeviceIdentity(hostname)
        } else {
            DeviceIdentity(ip_address.trim().to_ascii_lowercase())
        }
    }
}

impl Display for DeviceIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trip() {
        assert_eq!(Platform::IosXe.to_string(), "IOS-XE");
        assert_eq!("NX-OS".parse::<Platform>().unwrap(), Platform::NxOs);
        assert_eq!("IOS".parse::<Platform>().unwrap(), Platform::Ios);
        assert!("ios".parse::<Platform>().is_err());
    }

    #[test]
    fn test_capability_tokens() {
        assert_eq!(Capability::from_token("Router"), Some(Capability::Router));
        assert_eq!(Capability::from_token("Trans-Bridge"), Some(Capability::AccessPoint));
        assert_eq!(Capability::from_token("Station only"), Some(Capability::Host));
        assert_eq!(Capability::from_token("IGMP"), None);
    }

    #[test]
    fn test_interface_type_classify() {
        assert_eq!(InterfaceType::classify("Management0"), InterfaceType::Management);
        assert_eq!(InterfaceType::classify("Loopback0"), InterfaceType::Loopback);
        assert_eq!(InterfaceType::classify("Vlan100"), InterfaceType::Vlan);
        assert_eq!(
            InterfaceType::classify("GigabitEthernet1/0/1"),
            InterfaceType::Physical
        );
    }

    #[test]
    fn test_device_identity_prefers_serial() {
        let a = DeviceIdentity::new("CORE-A", "FOC123456789", "10.0.0.1");
        let b = DeviceIdentity::new("core-a", "foc123456789", "10.9.9.9");
        assert_eq!(a, b);

        // Placeholder serials fall back to the hostname.
        let c = DeviceIdentity::new("CORE-A", UNKNOWN_SERIAL, "10.0.0.1");
        let d = DeviceIdentity::new("CORE-A", "", "");
        assert_eq!(c, d);

        // No name at all: the address is all we have.
        let e = DeviceIdentity::new("", "", "10.0.0.1");
        assert_eq!(e.to_string(), "10.0.0.1");
    }
}
