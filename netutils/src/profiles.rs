//! The platform × fact-kind command matrix.
//!
//! Each cell lists the commands to try, in order, for one fact-kind on one
//! platform; an empty cell means the platform has no way to produce that
//! fact and the collector skips it silently. The matching parser lives in
//! [`crate::parse`] and is selected by fact-kind in the collector.

use lazy_static::lazy_static;
use regex::Regex;

use netwalker_api::model::{FactKind, Platform};

/// Ordered command probes for `(platform, kind)`.
///
/// Most cells hold a single command. `StackMembers` on IOS/IOS-XE holds two:
/// stackable switches answer `show switch detail`, VSS chassis reject it and
/// answer `show module` instead.
pub fn commands(platform: Platform, kind: FactKind) -> &'static [&'static str] {
    use FactKind::*;
    use Platform::*;

    match (platform, kind) {
        (Unknown, _) => &[],

        (PanOs, Identity | Version) => &["show system info"],
        (_, Identity | Version) => &["show version"],

        (Ios | IosXe | IosXr, Interfaces) => &["show ip interface"],
        (NxOs, Interfaces) => &["show ip interface vrf all"],
        (Eos, Interfaces) => &["show ip interface brief"],
        (Junos, Interfaces) => &["show interfaces terse"],
        (Asa, Interfaces) => &["show ip address"],
        (PanOs, Interfaces) => &["show interface all"],

        (Ios | IosXe | NxOs, Vlans) => &["show vlan brief"],
        (Eos, Vlans) => &["show vlan"],
        (_, Vlans) => &[],

        (Ios | IosXe, StackMembers) => &["show switch detail", "show module"],
        (_, StackMembers) => &[],

        (Ios | IosXe | IosXr | NxOs, CdpNeighbors) => &["show cdp neighbors detail"],
        (_, CdpNeighbors) => &[],

        (Ios | IosXe | IosXr | NxOs | Eos, LldpNeighbors) => &["show lldp neighbors detail"],
        (_, LldpNeighbors) => &[],
    }
}

lazy_static! {
    /// Rejection markers shared by the CLIs we drive. An output matching one
    /// of these failed the cell's success predicate and must not be parsed.
    static ref INVALID_RESPONSES: Vec<Regex> = [
        r"% Invalid input detected",
        r"% Incomplete command",
        r"% Ambiguous command",
        r"syntax error, expecting",
        r"Error: Unrecognized command",
        r"%Error",
        r"command not found",
        r"% Unknown command",
        r"Invalid command",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();
}

/// The expected-success predicate: did the device accept the command?
pub fn output_accepted(output: &str) -> bool {
    !INVALID_RESPONSES.iter().any(|re| re.is_match(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_defined_for_every_known_platform() {
        use strum::IntoEnumIterator;
        for platform in Platform::iter() {
            let commands = commands(platform, FactKind::Identity);
            if platform == Platform::Unknown {
                assert!(commands.is_empty());
            } else {
                assert!(!commands.is_empty(), "{platform} must have an identity command");
            }
        }
    }

    #[test]
    fn test_stack_probes_ordered() {
        let probes = commands(Platform::IosXe, FactKind::StackMembers);
        assert_eq!(probes, ["show switch detail", "show module"]);
        assert!(commands(Platform::Junos, FactKind::StackMembers).is_empty());
    }

    #[test]
    fn test_cdp_limited_to_cisco_platforms() {
        assert!(!commands(Platform::NxOs, FactKind::CdpNeighbors).is_empty());
        assert!(commands(Platform::Eos, FactKind::CdpNeighbors).is_empty());
        assert!(commands(Platform::Junos, FactKind::CdpNeighbors).is_empty());
    }

    #[test]
    fn test_output_accepted() {
        assert!(output_accepted("GigabitEthernet1/0/1 is up"));
        assert!(!output_accepted("% Invalid input detected at '^' marker."));
        assert!(!output_accepted("Error: Unrecognized command"));
    }
}
