//! Identity (hostname / serial / model) and software-version extraction
//! from `show version`-equivalent output.

use lazy_static::lazy_static;
use regex::Regex;

use netwalker_api::model::{IdentityInfo, Platform};

lazy_static! {
    static ref IOS_HOSTNAME: Regex = Regex::new(r"(?m)^(\S+)\s+uptime is").unwrap();
    static ref IOS_SERIAL: Regex =
        Regex::new(r"(?im)^System [Ss]erial [Nn]umber\s*:\s*(\S+)").unwrap();
    static ref IOS_BOARD_ID: Regex = Regex::new(r"Processor [Bb]oard ID (\S+)").unwrap();
    static ref IOS_MODEL: Regex = Regex::new(r"(?im)^Model [Nn]umber\s*:\s*(\S+)").unwrap();
    static ref IOS_CHASSIS: Regex =
        Regex::new(r"(?m)^[Cc]isco\s+(\S+)\s+\(.*\)\s+processor").unwrap();
    static ref IOS_VERSION: Regex = Regex::new(r"Software.*Version\s+([^,\s\[]+)").unwrap();

    static ref NXOS_HOSTNAME: Regex = Regex::new(r"(?m)^\s*Device name:\s*(\S+)").unwrap();
    static ref NXOS_MODEL: Regex =
        Regex::new(r"(?m)^\s*cisco\s+(Nexus\S*(?:\s+\S+)?)\s+Chassis").unwrap();
    static ref NXOS_VERSION: Regex =
        Regex::new(r"(?m)^\s*(?:NXOS|system):\s*version\s+(\S+)").unwrap();

    static ref EOS_MODEL: Regex = Regex::new(r"(?m)^\s*Arista\s+(\S+)").unwrap();
    static ref EOS_SERIAL: Regex = Regex::new(r"(?im)^Serial number:\s*(\S+)").unwrap();
    static ref EOS_VERSION: Regex =
        Regex::new(r"(?im)^Software image version:\s*(\S+)").unwrap();

    static ref JUNOS_HOSTNAME: Regex = Regex::new(r"(?im)^Hostname:\s*(\S+)").unwrap();
    static ref JUNOS_MODEL: Regex = Regex::new(r"(?im)^Model:\s*(\S+)").unwrap();
    static ref JUNOS_VERSION: Regex =
        Regex::new(r"(?im)^Junos:\s*(\S+)|JUNOS Software Release \[([^\]]+)\]").unwrap();

    static ref PANOS_HOSTNAME: Regex = Regex::new(r"(?im)^hostname:\s*(\S+)").unwrap();
    static ref PANOS_MODEL: Regex = Regex::new(r"(?im)^model:\s*(\S+)").unwrap();
    static ref PANOS_SERIAL: Regex = Regex::new(r"(?im)^serial:\s*(\S+)").unwrap();
    static ref PANOS_VERSION: Regex = Regex::new(r"(?im)^sw-version:\s*(\S+)").unwrap();

    static ref ASA_HOSTNAME: Regex = Regex::new(r"(?m)^(\S+) up \d+").unwrap();
    static ref ASA_SERIAL: Regex = Regex::new(r"(?im)^Serial Number:\s*(\S+)").unwrap();
    static ref ASA_MODEL: Regex = Regex::new(r"(?im)^Hardware:\s*([^,\s]+)").unwrap();
    static ref ASA_VERSION: Regex =
        Regex::new(r"Adaptive Security Appliance Software Version\s+(\S+)").unwrap();
}

/// Extract hostname, serial, and hardware model for `platform`.
///
/// Fields the output does not carry are left empty; the collector fills the
/// hostname from the session prompt and defaults the serial to `unknown`.
pub fn parse_identity(platform: Platform, output: &str) -> IdentityInfo {
    let capture = |re: &Regex| {
        re.captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };

    match platform {
        Platform::Ios | Platform::IosXe | Platform::IosXr => IdentityInfo {
            hostname: capture(&IOS_HOSTNAME),
            serial_number: {
                let serial = capture(&IOS_SERIAL);
                if serial.is_empty() {
                    capture(&IOS_BOARD_ID)
                } else {
                    serial
                }
            },
            hardware_model: {
                let model = capture(&IOS_MODEL);
                if model.is_empty() {
                    capture(&IOS_CHASSIS)
                } else {
                    model
                }
            },
        },
        Platform::NxOs => IdentityInfo {
            hostname: capture(&NXOS_HOSTNAME),
            serial_number: capture(&IOS_BOARD_ID),
            hardware_model: capture(&NXOS_MODEL),
        },
        Platform::Eos => IdentityInfo {
            hostname: String::new(),
            serial_number: capture(&EOS_SERIAL),
            hardware_model: capture(&EOS_MODEL),
        },
        Platform::Junos => IdentityInfo {
            hostname: capture(&JUNOS_HOSTNAME),
            serial_number: String::new(),
            hardware_model: capture(&JUNOS_MODEL),
        },
        Platform::PanOs => IdentityInfo {
            hostname: capture(&PANOS_HOSTNAME),
            serial_number: capture(&PANOS_SERIAL),
            hardware_model: capture(&PANOS_MODEL),
        },
        Platform::Asa => IdentityInfo {
            hostname: capture(&ASA_HOSTNAME),
            serial_number: capture(&ASA_SERIAL),
            hardware_model: capture(&ASA_MODEL),
        },
        Platform::Unknown => IdentityInfo::default(),
    }
}

/// Extract the software version string for `platform`, or `None` when the
/// output carries no recognizable version.
pub fn parse_version(platform: Platform, output: &str) -> Option<String> {
    let capture = |re: &Regex| {
        re.captures(output).and_then(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .map(|m| m.as_str().to_string())
        })
    };

    match platform {
        Platform::Ios | Platform::IosXe | Platform::IosXr => capture(&IOS_VERSION),
        Platform::NxOs => capture(&NXOS_VERSION),
        Platform::Eos => capture(&EOS_VERSION),
        Platform::Junos => capture(&JUNOS_VERSION),
        Platform::PanOs => capture(&PANOS_VERSION),
        Platform::Asa => capture(&ASA_VERSION),
        Platform::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const IOS_SHOW_VERSION: &str = indoc! {"
        Cisco IOS Software, C3750E Software (C3750E-UNIVERSALK9-M), Version 15.2(4)E10, RELEASE SOFTWARE (fc2)
        Technical Support: http://www.cisco.com/techsupport

        BORO-SW-UW01 uptime is 41 weeks, 3 days, 2 hours, 11 minutes
        System returned to ROM by power-on

        cisco WS-C3750X-48P (PowerPC405) processor (revision W0) with 262144K bytes of memory.
        Processor board ID FDO1623H1Z5
        Model number                    : WS-C3750X-48P-S
        System serial number            : FDO1623H1Z5
    "};

    #[test]
    fn test_ios_identity() {
        let identity = parse_identity(Platform::Ios, IOS_SHOW_VERSION);
        assert_eq!(identity.hostname, "BORO-SW-UW01");
        assert_eq!(identity.serial_number, "FDO1623H1Z5");
        assert_eq!(identity.hardware_model, "WS-C3750X-48P-S");
    }

    #[test]
    fn test_ios_version() {
        assert_eq!(
            parse_version(Platform::Ios, IOS_SHOW_VERSION).as_deref(),
            Some("15.2(4)E10")
        );
    }

    #[test]
    fn test_ios_falls_back_to_board_id_and_chassis() {
        let output = indoc! {"
            Cisco IOS Software, ISR Software, Version 15.7(3)M3
            EDGE-RTR-01 uptime is 10 weeks
            cisco CISCO2911/K9 (revision 1.0) processor with 483328K/40960K bytes of memory.
            Processor board ID FTX152600AB
        "};
        let identity = parse_identity(Platform::Ios, output);
        assert_eq!(identity.serial_number, "FTX152600AB");
        assert_eq!(identity.hardware_model, "CISCO2911/K9");
    }

    #[test]
    fn test_nxos_identity_and_version() {
        let output = indoc! {"
            Cisco Nexus Operating System (NX-OS) Software
            Software
              NXOS: version 9.3(8)
            Hardware
              cisco Nexus9000 C9336C-FX2 Chassis
              Processor Board ID FDO26060AAB

              Device name: KGW-AGG-1
        "};
        let identity = parse_identity(Platform::NxOs, output);
        assert_eq!(identity.hostname, "KGW-AGG-1");
        assert_eq!(identity.serial_number, "FDO26060AAB");
        assert_eq!(identity.hardware_model, "Nexus9000 C9336C-FX2");
        assert_eq!(
            parse_version(Platform::NxOs, output).as_deref(),
            Some("9.3(8)")
        );
    }

    #[test]
    fn test_eos_identity_leaves_hostname_to_prompt() {
        let output = indoc! {"
            Arista DCS-7050SX3-48YC8-F
            Hardware version: 11.01
            Serial number: JPE19181234
            Software image version: 4.28.3M
        "};
        let identity = parse_identity(Platform::Eos, output);
        assert_eq!(identity.hostname, "");
        assert_eq!(identity.serial_number, "JPE19181234");
        assert_eq!(identity.hardware_model, "DCS-7050SX3-48YC8-F");
        assert_eq!(
            parse_version(Platform::Eos, output).as_deref(),
            Some("4.28.3M")
        );
    }

    #[test]
    fn test_junos_identity() {
        let output = indoc! {"
            Hostname: pe1.example
            Model: mx240
            Junos: 20.4R3.8
        "};
        let identity = parse_identity(Platform::Junos, output);
        assert_eq!(identity.hostname, "pe1.example");
        assert_eq!(identity.hardware_model, "mx240");
        assert_eq!(identity.serial_number, "");
        assert_eq!(
            parse_version(Platform::Junos, output).as_deref(),
            Some("20.4R3.8")
        );
    }

    #[test]
    fn test_panos_identity() {
        let output = indoc! {"
            hostname: fw-edge-01
            ip-address: 10.50.1.4
            model: PA-3220
            serial: 013201001234
            sw-version: 10.1.6-h6
        "};
        let identity = parse_identity(Platform::PanOs, output);
        assert_eq!(identity.hostname, "fw-edge-01");
        assert_eq!(identity.serial_number, "013201001234");
        assert_eq!(identity.hardware_model, "PA-3220");
        assert_eq!(
            parse_version(Platform::PanOs, output).as_deref(),
            Some("10.1.6-h6")
        );
    }

    #[test]
    fn test_asa_identity() {
        let output = indoc! {"
            Cisco Adaptive Security Appliance Software Version 9.16(4)27

            DMZ-ASA-01 up 201 days 4 hours
            Hardware:   ASA5516, 8192 MB RAM, CPU Atom C2000 series
            Serial Number: JAD20251234
        "};
        let identity = parse_identity(Platform::Asa, output);
        assert_eq!(identity.hostname, "DMZ-ASA-01");
        assert_eq!(identity.serial_number, "JAD20251234");
        assert_eq!(identity.hardware_model, "ASA5516");
        assert_eq!(
            parse_version(Platform::Asa, output).as_deref(),
            Some("9.16(4)27")
        );
    }

    #[test]
    fn test_garbage_yields_empty_identity() {
        let identity = parse_identity(Platform::Ios, "% Invalid input detected at '^' marker.");
        assert_eq!(identity, IdentityInfo::default());
        assert_eq!(parse_version(Platform::Ios, "nothing here"), None);
    }
}
