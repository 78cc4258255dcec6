//! Interface-name canonicalization.
//!
//! CDP/LLDP and the various `show` commands abbreviate interface names
//! inconsistently (`Gi1/0/1`, `Gig 1/0/1`, `GigabitEthernet1/0/1` all name
//! the same port). Every parser funnels names through [`normalize`] so that
//! both endpoints of a stored neighbor edge use the long form and edges
//! deduplicate regardless of which side reported them.

/// Abbreviation table, keyed by the lowercased alphabetic head of the name.
/// Canonical long forms map to themselves, which makes `normalize`
/// idempotent.
const INTERFACE_HEADS: &[(&str, &str)] = &[
    ("gi", "GigabitEthernet"),
    ("gig", "GigabitEthernet"),
    ("gige", "GigabitEthernet"),
    ("gigabitethernet", "GigabitEthernet"),
    ("te", "TenGigabitEthernet"),
    ("ten", "TenGigabitEthernet"),
    ("tengige", "TenGigabitEthernet"),
    ("tengigabitethernet", "TenGigabitEthernet"),
    ("tw", "TwoGigabitEthernet"),
    ("twogigabitethernet", "TwoGigabitEthernet"),
    ("twe", "TwentyFiveGigE"),
    ("twentyfivegige", "TwentyFiveGigE"),
    ("fo", "FortyGigabitEthernet"),
    ("fortygigabitethernet", "FortyGigabitEthernet"),
    ("hu", "HundredGigE"),
    ("hundredgige", "HundredGigE"),
    ("fa", "FastEthernet"),
    ("fas", "FastEthernet"),
    ("fastethernet", "FastEthernet"),
    ("et", "Ethernet"),
    ("eth", "Ethernet"),
    ("ethernet", "Ethernet"),
    ("po", "Port-channel"),
    ("port-channel", "Port-channel"),
    ("lo", "Loopback"),
    ("loopback", "Loopback"),
    ("vl", "Vlan"),
    ("vlan", "Vlan"),
    ("ma", "Management"),
    ("mgmt", "Management"),
    ("management", "Management"),
    ("se", "Serial"),
    ("serial", "Serial"),
    ("tu", "Tunnel"),
    ("tunnel", "Tunnel"),
];

/// Normalize an interface name to its canonical long form.
///
/// Unrecognized heads are returned unchanged apart from whitespace
/// trimming, so exotic names survive rather than erroring.
pub fn normalize(name: &str) -> String {
    let name = name.trim();

    // Head: leading letters plus any embedded dash ("Port-channel").
    // The remainder (slot/port digits, dots, subinterfaces) is kept verbatim.
    let head_len = name
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_alphabetic() || *c == '-')
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    if head_len == 0 {
        return name.to_string();
    }

    let head = name[..head_len].to_ascii_lowercase();
    let rest = name[head_len..].trim_start();

    match INTERFACE_HEADS
        .iter()
        .find(|(abbrev, _)| *abbrev == head)
    {
        Some((_, canonical)) => format!("{canonical}{rest}"),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_abbreviations() {
        assert_eq!(normalize("Gi1/0/1"), "GigabitEthernet1/0/1");
        assert_eq!(normalize("Te1/0/1"), "TenGigabitEthernet1/0/1");
        assert_eq!(normalize("Po1"), "Port-channel1");
        assert_eq!(normalize("mgmt0"), "Management0");
        assert_eq!(normalize("Fa0/1"), "FastEthernet0/1");
        assert_eq!(normalize("Twe1/0/1"), "TwentyFiveGigE1/0/1");
        assert_eq!(normalize("Fo1/1/1"), "FortyGigabitEthernet1/1/1");
        assert_eq!(normalize("Hu1/0/25"), "HundredGigE1/0/25");
        assert_eq!(normalize("Lo0"), "Loopback0");
        assert_eq!(normalize("Vl100"), "Vlan100");
    }

    #[test]
    fn test_nxos_ethernet_unchanged() {
        assert_eq!(normalize("Ethernet1/1"), "Ethernet1/1");
        assert_eq!(normalize("Eth1/1"), "Ethernet1/1");
    }

    #[test]
    fn test_spaced_and_padded_names() {
        assert_eq!(normalize("Gig 1/0/24"), "GigabitEthernet1/0/24");
        assert_eq!(normalize("  Te1/49  "), "TenGigabitEthernet1/49");
    }

    #[test]
    fn test_subinterfaces_kept() {
        assert_eq!(normalize("Gi0/0/0.100"), "GigabitEthernet0/0/0.100");
        assert_eq!(normalize("Po10.20"), "Port-channel10.20");
    }

    #[test]
    fn test_unknown_names_pass_through() {
        assert_eq!(normalize("xe-0/0/0"), "xe-0/0/0");
        assert_eq!(normalize("ae0"), "ae0");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("123"), "123");
    }

    #[test]
    fn test_idempotent() {
        for name in [
            "Gi1/0/1",
            "GigabitEthernet1/0/1",
            "Ethernet1/1",
            "mgmt0",
            "Port-channel48",
            "xe-0/0/0",
        ] {
            let once = normalize(name);
            assert_eq!(normalize(&once), once, "normalize must be idempotent for {name}");
        }
    }
}
