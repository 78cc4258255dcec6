//! CDP and LLDP neighbor tables, from the `detail` variants of the show
//! commands. Both parsers emit [`NeighborInfo`] with canonical interface
//! names on both ends, so edges deduplicate no matter which side reported
//! them.

use lazy_static::lazy_static;
use regex::Regex;

use netwalker_api::model::{Capability, DiscoveryProtocol, NeighborInfo};

use crate::ifnames::normalize;

lazy_static! {
    static ref CDP_DEVICE_ID: Regex = Regex::new(r"(?m)^Device ID:\s*(\S+)").unwrap();
    static ref CDP_ADDRESS: Regex =
        Regex::new(r"(?m)^\s+IP(?:v4)? [Aa]ddress:\s*(\d+\.\d+\.\d+\.\d+)").unwrap();
    static ref CDP_PLATFORM: Regex =
        Regex::new(r"(?m)^Platform:\s*([^,]+),\s*Capabilities:\s*(.+)$").unwrap();
    static ref CDP_INTERFACES: Regex =
        Regex::new(r"(?m)^Interface:\s*([^,]+),\s*Port ID \(outgoing port\):\s*(\S+)").unwrap();

    static ref LLDP_LOCAL_INTF: Regex = Regex::new(r"(?m)^Local Intf:\s*(\S+)").unwrap();
    static ref LLDP_PORT_ID: Regex = Regex::new(r"(?m)^Port id:\s*(\S+)").unwrap();
    static ref LLDP_PORT_DESC: Regex = Regex::new(r"(?m)^Port Description:\s*(\S+)").unwrap();
    static ref LLDP_SYSTEM_NAME: Regex = Regex::new(r"(?m)^System Name:\s*(\S+)").unwrap();
    static ref LLDP_CAPABILITIES: Regex =
        Regex::new(r"(?m)^Enabled Capabilities:\s*(.+)$").unwrap();
    static ref LLDP_MGMT_IP: Regex =
        Regex::new(r"(?m)^\s+IP:\s*(\d+\.\d+\.\d+\.\d+)").unwrap();
    static ref LLDP_SYSTEM_DESC: Regex =
        Regex::new(r"(?m)^System Description:\s*\n?(.+)$").unwrap();

    // MAC-like port ids (LLDP without port descriptions) are useless as an
    // interface name.
    static ref MAC_LIKE: Regex =
        Regex::new(r"(?i)^[0-9a-f]{4}\.[0-9a-f]{4}\.[0-9a-f]{4}$").unwrap();
}

/// Parse `show cdp neighbors detail`.
pub fn parse_cdp_neighbors(output: &str) -> Vec<NeighborInfo> {
    split_blocks(output, "Device ID:")
        .filter_map(|block| {
            let name = clean_device_name(CDP_DEVICE_ID.captures(block)?.get(1)?.as_str());
            if name.is_empty() {
                return None;
            }

            let (local, remote) = CDP_INTERFACES
                .captures(block)
                .map(|c| {
                    (
                        normalize(c[1].trim()),
                        normalize(c[2].trim()),
                    )
                })
                .unwrap_or_default();
            if local.is_empty() {
                return None;
            }

            let (platform, capabilities) = CDP_PLATFORM
                .captures(block)
                .map(|c| {
                    let platform = c[1].trim().to_string();
                    let capabilities = c[2]
                        .split_whitespace()
                        .filter_map(cdp_capability)
                        .collect();
                    (platform, capabilities)
                })
                .unwrap_or_default();

            Some(NeighborInfo {
                local_interface: local,
                remote_name: name,
                remote_interface: remote,
                remote_ip: CDP_ADDRESS
                    .captures(block)
                    .map(|c| c[1].to_string()),
                platform,
                capabilities,
                protocol: DiscoveryProtocol::Cdp,
            })
        })
        .collect()
}

/// Parse `show lldp neighbors detail`.
pub fn parse_lldp_neighbors(output: &str) -> Vec<NeighborInfo> {
    split_blocks(output, "Local Intf:")
        .filter_map(|block| {
            let local = normalize(LLDP_LOCAL_INTF.captures(block)?.get(1)?.as_str());

            let name = LLDP_SYSTEM_NAME
                .captures(block)
                .map(|c| clean_device_name(&c[1]))
                .unwrap_or_default();
            if name.is_empty() {
                return None;
            }

            // Prefer the port description when the port id is just a MAC.
            let port_id = LLDP_PORT_ID
                .captures(block)
                .map(|c| c[1].to_string())
                .unwrap_or_default();
            let remote = if MAC_LIKE.is_match(&port_id) {
                LLDP_PORT_DESC
                    .captures(block)
                    .map(|c| normalize(&c[1]))
                    .unwrap_or_else(|| normalize(&port_id))
            } else {
                normalize(&port_id)
            };

            let capabilities = LLDP_CAPABILITIES
                .captures(block)
                .map(|c| {
                    c[1].split([',', ' '])
                        .filter_map(lldp_capability)
                        .collect()
                })
                .unwrap_or_default();

            let platform = LLDP_SYSTEM_DESC
                .captures(block)
                .map(|c| c[1].trim().to_string())
                .unwrap_or_default();

            Some(NeighborInfo {
                local_interface: local,
                remote_name: name,
                remote_interface: remote,
                remote_ip: LLDP_MGMT_IP.captures(block).map(|c| c[1].to_string()),
                platform,
                capabilities,
                protocol: DiscoveryProtocol::Lldp,
            })
        })
        .collect()
}

/// Split detail output into per-neighbor blocks, each starting with
/// `marker`. Text before the first marker (headers, separators) is dropped.
fn split_blocks<'a>(output: &'a str, marker: &'a str) -> impl Iterator<Item = &'a str> {
    let mut starts: Vec<usize> = output
        .match_indices(marker)
        // Markers mid-line (e.g. quoted in a system description) don't open
        // a block.
        .filter(|(i, _)| *i == 0 || output.as_bytes()[i - 1] == b'\n')
        .map(|(i, _)| i)
        .collect();
    starts.push(output.len());

    (0..starts.len().saturating_sub(1)).map(move |i| &output[starts[i]..starts[i + 1]])
}

/// Strip a `(serial)` suffix and a DNS domain from an advertised device id.
/// Dotted names that are actually IPv4 addresses are kept whole.
fn clean_device_name(raw: &str) -> String {
    let mut name = raw.trim();
    if let Some(open) = name.find('(') {
        name = name[..open].trim_end();
    }
    if name.parse::<std::net::Ipv4Addr>().is_ok() {
        return name.to_string();
    }
    match name.split_once('.') {
        Some((host, _)) if !host.is_empty() => host.to_string(),
        _ => name.to_string(),
    }
}

/// CDP spells capabilities as words ("Switch IGMP") in detail output.
fn cdp_capability(token: &str) -> Option<Capability> {
    Capability::from_token(token)
}

/// LLDP enabled-capability codes per the standard: B)ridge, R)outer,
/// T)elephone, W)LAN access point, S)tation. Codes outside the coarse set
/// are dropped.
fn lldp_capability(token: &str) -> Option<Capability> {
    let token = token.trim();
    match token.to_ascii_uppercase().as_str() {
        "B" => Some(Capability::Switch),
        "R" => Some(Capability::Router),
        "T" => Some(Capability::Phone),
        "W" => Some(Capability::AccessPoint),
        "S" => Some(Capability::Host),
        _ => Capability::from_token(token),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const CDP_DETAIL: &str = indoc! {"
        -------------------------
        Device ID: KGW-DIST-A.corp.example.com
        Entry address(es):
          IP address: 10.0.0.2
        Platform: cisco WS-C3750X-48P,  Capabilities: Switch IGMP
        Interface: GigabitEthernet1/0/1,  Port ID (outgoing port): GigabitEthernet1/0/24
        Holdtime : 133 sec

        -------------------------
        Device ID: KGW-RTR-B(FOC2231L0AB)
        Entry address(es):
          IP address: 10.0.0.6
        Platform: cisco ISR4451,  Capabilities: Router Switch IGMP
        Interface: Gi1/0/2,  Port ID (outgoing port): Gi0/0/1
        Holdtime : 151 sec
    "};

    #[test]
    fn test_parse_cdp_detail() {
        let neighbors = parse_cdp_neighbors(CDP_DETAIL);
        assert_eq!(neighbors.len(), 2);

        let first = &neighbors[0];
        assert_eq!(first.remote_name, "KGW-DIST-A");
        assert_eq!(first.local_interface, "GigabitEthernet1/0/1");
        assert_eq!(first.remote_interface, "GigabitEthernet1/0/24");
        assert_eq!(first.remote_ip.as_deref(), Some("10.0.0.2"));
        assert_eq!(first.platform, "cisco WS-C3750X-48P");
        assert_eq!(first.capabilities, vec![Capability::Switch]);
        assert_eq!(first.protocol, DiscoveryProtocol::Cdp);

        let second = &neighbors[1];
        assert_eq!(second.remote_name, "KGW-RTR-B", "serial suffix must be stripped");
        assert_eq!(second.local_interface, "GigabitEthernet1/0/2");
        assert_eq!(second.remote_interface, "GigabitEthernet0/0/1");
        assert_eq!(
            second.capabilities,
            vec![Capability::Router, Capability::Switch]
        );
    }

    #[test]
    fn test_parse_lldp_detail() {
        let output = indoc! {"
            ------------------------------------------------
            Local Intf: Gi1/0/3
            Chassis id: 0062.ec9d.7800
            Port id: Gi1/0/48
            Port Description: GigabitEthernet1/0/48
            System Name: KGW-ACC-3.corp.example.com

            System Description:
            Cisco IOS Software, C2960X Software

            Time remaining: 95 seconds
            System Capabilities: B,R
            Enabled Capabilities: B
            Management Addresses:
                IP: 10.0.0.9
        "};
        let neighbors = parse_lldp_neighbors(output);
        assert_eq!(neighbors.len(), 1);

        let neighbor = &neighbors[0];
        assert_eq!(neighbor.local_interface, "GigabitEthernet1/0/3");
        assert_eq!(neighbor.remote_name, "KGW-ACC-3");
        assert_eq!(neighbor.remote_interface, "GigabitEthernet1/0/48");
        assert_eq!(neighbor.remote_ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(neighbor.capabilities, vec![Capability::Switch]);
        assert_eq!(neighbor.protocol, DiscoveryProtocol::Lldp);
    }

    #[test]
    fn test_lldp_mac_port_id_uses_description() {
        let output = indoc! {"
            Local Intf: Gi1/0/7
            Port id: 0011.2233.4455
            Port Description: GigabitEthernet0/2
            System Name: OLD-SWITCH
            Enabled Capabilities: B
        "};
        let neighbors = parse_lldp_neighbors(output);
        assert_eq!(neighbors[0].remote_interface, "GigabitEthernet0/2");
    }

    #[test]
    fn test_nameless_lldp_entry_dropped() {
        let output = indoc! {"
            Local Intf: Gi1/0/9
            Port id: 0011.2233.4455
            Enabled Capabilities: S
        "};
        assert!(parse_lldp_neighbors(output).is_empty());
    }

    #[test]
    fn test_ip_device_ids_kept_whole() {
        assert_eq!(clean_device_name("10.1.2.3"), "10.1.2.3");
        assert_eq!(clean_device_name("SEP0011.example.com"), "SEP0011");
        assert_eq!(clean_device_name("CORE-A(FOC123456AB)"), "CORE-A");
    }

    #[test]
    fn test_noise_is_skipped() {
        assert!(parse_cdp_neighbors("% CDP is not enabled").is_empty());
        assert!(parse_lldp_neighbors("").is_empty());
    }
}
