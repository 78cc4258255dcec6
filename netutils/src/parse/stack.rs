//! Switch-stack and VSS membership parsing.

use lazy_static::lazy_static;
use regex::Regex;

use netwalker_api::model::{StackMemberInfo, StackRole};

lazy_static! {
    // "*1       Active  0cd0.f894.5f80     15    V07     Ready"
    static ref STACK_ROW: Regex = Regex::new(
        r"(?m)^\*?\s*(\d+)\s+(Active|Standby|Member)\s+([0-9a-f]{4}\.[0-9a-f]{4}\.[0-9a-f]{4})\s+(\d+)\s+(\S+)\s+(\S+)"
    )
    .unwrap();

    // VSS `show module` data rows start with the switch number and a port
    // count.
    static ref VSS_ROW: Regex = Regex::new(r"^\s*([12])\s+\d+\s+").unwrap();
    static ref VSS_MODEL: Regex = Regex::new(r"(?i)(WS-C[\w-]+)").unwrap();
    // Cisco serial formats: 3 letters + 6 digits + 2 letters, then the older
    // 3 letters + 9 digits.
    static ref SERIAL_PRIMARY: Regex = Regex::new(r"\b([A-Z]{3}\d{6}[A-Z]{2})\b").unwrap();
    static ref SERIAL_ALTERNATE: Regex = Regex::new(r"\b([A-Z]{3}\d{9})\b").unwrap();

    // Per-switch sections of `show version` on stacked switches.
    static ref SWITCH_SECTION: Regex = Regex::new(r"(?m)^Switch 0?(\d+)\s*$").unwrap();
    static ref SECTION_MODEL: Regex =
        Regex::new(r"(?im)^Model [Nn]umber\s*:\s*(\S+)").unwrap();
    static ref SECTION_SERIAL: Regex =
        Regex::new(r"(?im)^System [Ss]erial [Nn]umber\s*:\s*(\S+)").unwrap();
}

/// Parse `show switch detail` (IOS / IOS-XE stacks).
///
/// The command carries number, role, MAC, priority, and state but neither
/// serial nor model; those are merged in afterwards from the per-switch
/// sections of `show version` (see [`parse_switch_sections`]).
pub fn parse_switch_detail(output: &str) -> Vec<StackMemberInfo> {
    STACK_ROW
        .captures_iter(output)
        .filter_map(|captures| {
            let role = match &captures[2] {
                "Active" => StackRole::Active,
                "Standby" => StackRole::Standby,
                "Member" => StackRole::Member,
                _ => return None,
            };
            Some(StackMemberInfo {
                switch_number: captures[1].parse().ok()?,
                role,
                priority: captures[4].parse().ok(),
                hardware_model: String::new(),
                serial_number: String::new(),
                mac_address: Some(captures[3].to_string()),
                software_version: None,
                state: captures[6].to_string(),
            })
        })
        .collect()
}

/// Extract per-switch (model, serial) pairs from the `Switch NN` sections of
/// a stacked switch's `show version` output.
pub fn parse_switch_sections(version_output: &str) -> Vec<(u32, String, String)> {
    let mut sections = Vec::new();
    let headers: Vec<(usize, u32)> = SWITCH_SECTION
        .captures_iter(version_output)
        .filter_map(|c| {
            let number = c[1].parse().ok()?;
            Some((c.get(0)?.start(), number))
        })
        .collect();

    for (index, (start, number)) in headers.iter().enumerate() {
        let end = headers
            .get(index + 1)
            .map(|(next, _)| *next)
            .unwrap_or(version_output.len());
        let section = &version_output[*start..end];

        let model = SECTION_MODEL
            .captures(section)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let serial = SECTION_SERIAL
            .captures(section)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        if !model.is_empty() || !serial.is_empty() {
            sections.push((*number, model, serial));
        }
    }
    sections
}

/// Parse `show module` output from VSS chassis (Catalyst 4500-X / 6500).
///
/// Only the first data section is read; the MAC-address section that follows
/// repeats the module numbers with different columns. A single switch row is
/// not a VSS pair, so the whole output is discarded unless at least two rows
/// parse.
pub fn parse_vss_module(output: &str) -> Vec<StackMemberInfo> {
    let mut members = Vec::new();
    let mut in_data_section = false;
    let mut found_first_section = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.contains("---") {
            if !found_first_section {
                in_data_section = true;
                found_first_section = true;
            } else {
                break;
            }
            continue;
        }
        if in_data_section && VSS_ROW.is_match(line) {
            if let Some(member) = parse_vss_line(trimmed) {
                members.push(member);
            }
        }
    }

    if members.len() >= 2 {
        members
    } else {
        Vec::new()
    }
}

fn parse_vss_line(line: &str) -> Option<StackMemberInfo> {
    let switch_number: u32 = VSS_ROW.captures(line)?[1].parse().ok()?;

    let model = VSS_MODEL
        .captures(line)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let serial = SERIAL_PRIMARY
        .captures(line)
        .or_else(|| SERIAL_ALTERNATE.captures(line))
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let lower = line.to_ascii_lowercase();
    let role = if lower.contains("active") {
        StackRole::Active
    } else if lower.contains("standby") {
        StackRole::Standby
    } else if switch_number == 1 {
        StackRole::Active
    } else {
        StackRole::Standby
    };

    Some(StackMemberInfo {
        switch_number,
        role,
        priority: None,
        hardware_model: model,
        serial_number: serial,
        mac_address: None,
        software_version: None,
        state: "Ok".to_string(),
    })
}
