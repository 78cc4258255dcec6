//! VLAN tables from `show vlan brief`.

use lazy_static::lazy_static;
use regex::Regex;

use netwalker_api::model::VlanInfo;

lazy_static! {
    // "10   USERS     active    Gi1/0/6, Gi1/0/7"
    static ref VLAN_ROW: Regex =
        Regex::new(r"^(\d+)\s+(\S+)\s+(\S+)\s*(.*)$").unwrap();
    // Wrapped port lists continue under the Ports column.
    static ref CONTINUATION: Regex = Regex::new(r"^\s{20,}(\S.*)$").unwrap();
}

/// Parse `show vlan brief` output (IOS, IOS-XE, NX-OS, and EOS share the
/// column layout). VLAN ids outside 1..=4094 are discarded.
pub fn parse_vlans(output: &str) -> Vec<VlanInfo> {
    let mut vlans: Vec<VlanInfo> = Vec::new();

    for line in output.lines() {
        if let Some(captures) = VLAN_ROW.captures(line) {
            let Ok(number) = captures[1].parse::<u16>() else {
                continue;
            };
            if !(1..=4094).contains(&number) {
                continue;
            }
            vlans.push(VlanInfo {
                number,
                name: captures[2].to_string(),
                port_count: count_ports(&captures[4]),
            });
        } else if let Some(captures) = CONTINUATION.captures(line) {
            if let Some(last) = vlans.last_mut() {
                last.port_count += count_ports(&captures[1]);
            }
        }
    }

    vlans
}

fn count_ports(ports: &str) -> u32 {
    ports
        .split(',')
        .filter(|token| !token.trim().is_empty())
        .count() as u32
}
