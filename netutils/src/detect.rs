//! Platform detection from first-contact `show version` output.

use lazy_static::lazy_static;
use regex::Regex;

use netwalker_api::model::Platform;

lazy_static! {
    /// Ordered marker table. The first matching row wins, so the specific
    /// variants (IOS-XE, IOS-XR) must precede plain IOS, whose markers they
    /// also contain.
    static ref PLATFORM_MARKERS: Vec<(Platform, Regex)> = vec![
        (
            Platform::IosXe,
            Regex::new(r"(?i)IOS[ -]XE Software|Cisco IOS XE").unwrap(),
        ),
        (
            Platform::IosXr,
            Regex::new(r"(?i)IOS[ -]XR Software|Cisco IOS XR").unwrap(),
        ),
        (
            Platform::Asa,
            Regex::new(r"(?i)Adaptive Security Appliance|Cisco ASA").unwrap(),
        ),
        (
            Platform::NxOs,
            Regex::new(r"(?i)NX-OS|Cisco Nexus Operating System").unwrap(),
        ),
        (
            Platform::Eos,
            Regex::new(r"(?i)Arista|vEOS").unwrap(),
        ),
        (
            Platform::Junos,
            Regex::new(r"(?i)JUNOS|Juniper Networks").unwrap(),
        ),
        (
            Platform::PanOs,
            Regex::new(r"(?i)PAN-OS|sw-version:|model:\s+PA-").unwrap(),
        ),
        (
            Platform::Ios,
            Regex::new(r"(?i)Cisco IOS Software|Cisco Internetwork Operating System Software")
                .unwrap(),
        ),
    ];
}

/// Tag a device with a platform variant based on its version/banner text.
///
/// Unrecognized output yields [`Platform::Unknown`]; such devices are still
/// inventoried from the banner but receive no further profile-driven
/// commands.
pub fn detect_platform(version_output: &str) -> Platform {
    for (platform, marker) in PLATFORM_MARKERS.iter() {
        if marker.is_match(version_output) {
            return *platform;
        }
    }
    Platform::Unknown
}
