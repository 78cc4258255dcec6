//! Interface tables: name, address, mask, and coarse type.

use lazy_static::lazy_static;
use regex::Regex;

use netwalker_api::model::{InterfaceInfo, InterfaceType, Platform};

use crate::ifnames::normalize;
use crate::parse::prefix_to_mask;

lazy_static! {
    // IOS `show ip interface`: header line per interface, address indented
    // below it.
    static ref IOS_IF_HEADER: Regex = Regex::new(r"^(\S+) is ").unwrap();
    static ref IOS_IF_ADDRESS: Regex =
        Regex::new(r"^\s+Internet address is (\d+\.\d+\.\d+\.\d+)/(\d+)").unwrap();

    // NX-OS `show ip interface vrf all`.
    static ref NXOS_IF_HEADER: Regex = Regex::new(r"^(\S+?), Interface status").unwrap();
    static ref NXOS_IF_ADDRESS: Regex =
        Regex::new(r"^\s+IP address:\s*(\d+\.\d+\.\d+\.\d+), IP subnet: \S+/(\d+)").unwrap();

    // Single-line name + addr/len tables (EOS brief, JunOS terse, PAN-OS).
    static ref INLINE_ADDRESS: Regex =
        Regex::new(r"^\s*(\S+)\s+.*?(\d+\.\d+\.\d+\.\d+)/(\d+)").unwrap();

    // ASA `show ip address`: dotted mask in its own column.
    static ref ASA_ADDRESS: Regex =
        Regex::new(r"^(\S+)\s+\S+\s+(\d+\.\d+\.\d+\.\d+)\s+(\d+\.\d+\.\d+\.\d+)").unwrap();
}

/// Parse the interface listing for `platform` into structured rows.
/// Interfaces without an IPv4 address are not reported.
pub fn parse_interfaces(platform: Platform, output: &str) -> Vec<InterfaceInfo> {
    match platform {
        Platform::Ios | Platform::IosXe | Platform::IosXr => {
            parse_header_style(output, &IOS_IF_HEADER, &IOS_IF_ADDRESS)
        }
        Platform::NxOs => parse_header_style(output, &NXOS_IF_HEADER, &NXOS_IF_ADDRESS),
        Platform::Eos | Platform::Junos | Platform::PanOs => parse_inline_style(output),
        Platform::Asa => parse_asa_style(output),
        Platform::Unknown => Vec::new(),
    }
}

/// Two-line shape: an interface header, then an indented address line that
/// belongs to the most recent header.
fn parse_header_style(output: &str, header: &Regex, address: &Regex) -> Vec<InterfaceInfo> {
    let mut interfaces = Vec::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        if let Some(captures) = header.captures(line) {
            current = Some(normalize(&captures[1]));
            continue;
        }
        if let (Some(name), Some(captures)) = (&current, address.captures(line)) {
            if let Some(info) = build(name, &captures[1], captures[2].parse().ok()) {
                interfaces.push(info);
            }
            // One address per header; further address lines are secondaries
            // on the same interface and get their own rows too, so keep the
            // current header.
        }
    }
    interfaces
}

fn parse_inline_style(output: &str) -> Vec<InterfaceInfo> {
    output
        .lines()
        .filter_map(|line| {
            let captures = INLINE_ADDRESS.captures(line)?;
            build(&normalize(&captures[1]), &captures[2], captures[3].parse().ok())
        })
        .collect()
}

fn parse_asa_style(output: &str) -> Vec<InterfaceInfo> {
    output
        .lines()
        .filter_map(|line| {
            let captures = ASA_ADDRESS.captures(line)?;
            let name = normalize(&captures[1]);
            Some(InterfaceInfo {
                interface_type: InterfaceType::classify(&name),
                name,
                ip_address: captures[2].to_string(),
                subnet_mask: captures[3].to_string(),
            })
        })
        .collect()
}

fn build(name: &str, ip: &str, prefix_len: Option<u8>) -> Option<InterfaceInfo> {
    let prefix_len = prefix_len?;
    Some(InterfaceInfo {
        interface_type: InterfaceType::classify(name),
        name: name.to_string(),
        ip_address: ip.to_string(),
        subnet_mask: prefix_to_mask(prefix_len),
    })
}
