use std::net::Ipv4Addr;

use glob::Pattern;
use ipnet::Ipv4Net;
use log::debug;

use crate::config::{ExclusionConfig, FilterConfig};
use crate::error::SetupError;
use crate::model::Capability;

/// Outcome of a filter decision for a candidate device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Drop(&'static str),
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept)
    }
}

/// Decides whether a discovered identity is in scope for crawling.
///
/// Blank include lists accept everything; blank exclude lists exclude
/// nothing. The asymmetry is intentional: an untouched configuration crawls
/// the whole reachable network.
pub struct DeviceFilter {
    include_wildcards: Vec<Pattern>,
    exclude_wildcards: Vec<Pattern>,
    include_cidrs: Vec<Ipv4Net>,
    exclude_cidrs: Vec<Ipv4Net>,
    exclude_ip_ranges: Vec<(Ipv4Addr, Ipv4Addr)>,
    exclude_platforms: Vec<String>,
    exclude_capabilities: Vec<Capability>,
}

impl DeviceFilter {
    pub fn new(filtering: &FilterConfig, exclusions: &ExclusionConfig) -> Result<Self, SetupError> {
        // Hostname exclusions and exclude wildcards are both name patterns;
        // they share one list.
        let mut exclude_wildcards = compile_patterns(&filtering.exclude_wildcards)?;
        exclude_wildcards.extend(compile_patterns(&exclusions.exclude_hostnames)?);

        Ok(Self {
            include_wildcards: compile_patterns(&filtering.include_wildcards)?,
            exclude_wildcards,
            include_cidrs: parse_cidrs(&filtering.include_cidrs)?,
            exclude_cidrs: parse_cidrs(&filtering.exclude_cidrs)?,
            exclude_ip_ranges: parse_ranges(&exclusions.exclude_ip_ranges)?,
            exclude_platforms: exclusions
                .exclude_platforms
                .iter()
                .map(|p| p.to_ascii_lowercase())
                .collect(),
            exclude_capabilities: parse_capabilities(&exclusions.exclude_capabilities)?,
        })
    }

    /// Run the decision procedure for a candidate. Steps are ordered so that
    /// explicit exclusions always win over inclusion rules.
    pub fn evaluate(
        &self,
        name: &str,
        ip: Option<Ipv4Addr>,
        platform: &str,
        capabilities: &[Capability],
    ) -> Decision {
        let name_lower = name.to_ascii_lowercase();

        if self
            .exclude_wildcards
            .iter()
            .any(|p| p.matches(&name_lower))
        {
            return self.drop(name, "hostname excluded");
        }

        if let Some(ip) = ip {
            if self.exclude_cidrs.iter().any(|net| net.contains(&ip)) {
                return self.drop(name, "address in excluded CIDR");
            }
            if self
                .exclude_ip_ranges
                .iter()
                .any(|(lo, hi)| *lo <= ip && ip <= *hi)
            {
                return self.drop(name, "address in excluded range");
            }
        }

        let platform_lower = platform.to_ascii_lowercase();
        if !platform_lower.is_empty()
            && self
                .exclude_platforms
                .iter()
                .any(|excluded| platform_lower.contains(excluded))
        {
            return self.drop(name, "platform excluded");
        }
        if capabilities
            .iter()
            .any(|c| self.exclude_capabilities.contains(c))
        {
            return self.drop(name, "capability excluded");
        }

        if !self.include_cidrs.is_empty() {
            let in_scope = ip
                .map(|ip| self.include_cidrs.iter().any(|net| net.contains(&ip)))
                .unwrap_or(false);
            if !in_scope {
                return self.drop(name, "address outside include CIDRs");
            }
        }

        if !self.include_wildcards.is_empty()
            && !self
                .include_wildcards
                .iter()
                .any(|p| p.matches(&name_lower))
        {
            return self.drop(name, "hostname not in include wildcards");
        }

        Decision::Accept
    }

    fn drop(&self, name: &str, reason: &'static str) -> Decision {
        debug!("Filtered out {name}: {reason}");
        Decision::Drop(reason)
    }
}

fn compile_patterns(raw: &[String]) -> Result<Vec<Pattern>, SetupError> {
    raw.iter()
        .map(|p| {
            Pattern::new(&p.to_ascii_lowercase())
                .map_err(|e| SetupError::Config(format!("Bad wildcard '{p}': {e}")))
        })
        .collect()
}

fn parse_cidrs(raw: &[String]) -> Result<Vec<Ipv4Net>, SetupError> {
    raw.iter()
        .map(|c| {
            c.parse::<Ipv4Net>()
                .map_err(|e| SetupError::Config(format!("Bad CIDR '{c}': {e}")))
        })
        .collect()
}

/// Ranges are written `a.b.c.d-e.f.g.h`.
fn parse_ranges(raw: &[String]) -> Result<Vec<(Ipv4Addr, Ipv4Addr)>, SetupError> {
    raw.iter()
        .map(|r| {
            let (lo, hi) = r
                .split_once('-')
                .ok_or_else(|| SetupError::Config(format!("Bad IP range '{r}': expected start-end")))?;
            let lo = lo
                .trim()
                .parse::<Ipv4Addr>()
                .map_err(|e| SetupError::Config(format!("Bad IP range '{r}': {e}")))?;
            let hi = hi
                .trim()
                .parse::<Ipv4Addr>()
                .map_err(|e| SetupError::Config(format!("Bad IP range '{r}': {e}")))?;
            if hi < lo {
                return Err(SetupError::Config(format!(
                    "Bad IP range '{r}': end precedes start"
                )));
            }
            Ok((lo, hi))
        })
        .collect()
}

fn parse_capabilities(raw: &[String]) -> Result<Vec<Capability>, SetupError> {
    raw.iter()
        .map(|c| {
            Capability::from_token(c)
                .ok_or_else(|| SetupError::Config(format!("Unknown capability '{c}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(filtering: FilterConfig, exclusions: ExclusionConfig) -> DeviceFilter {
        DeviceFilter::new(&filtering, &exclusions).unwrap()
    }

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_blank_lists_accept_everything() {
        let f = filter(FilterConfig::default(), ExclusionConfig::default());
        let decision = f.evaluate("ANY-DEVICE", Some("10.0.0.1".parse().unwrap()), "", &[]);
        assert!(decision.is_accept());
        assert!(f.evaluate("no-ip-at-all", None, "", &[]).is_accept());
    }

    #[test]
    fn test_exclude_hostname_wins_over_include() {
        let f = filter(
            FilterConfig {
                include_wildcards: list(&["*"]),
                exclude_wildcards: list(&["*-LAB-*"]),
                ..Default::default()
            },
            ExclusionConfig {
                exclude_hostnames: list(&["BORO-TEST?"]),
                ..Default::default()
            },
        );
        assert_eq!(
            f.evaluate("CORE-LAB-A", None, "", &[]),
            Decision::Drop("hostname excluded")
        );
        assert_eq!(
            f.evaluate("boro-test1", None, "", &[]),
            Decision::Drop("hostname excluded")
        );
        assert!(f.evaluate("BORO-CORE-A", None, "", &[]).is_accept());
    }

    #[test]
    fn test_cidr_exclusion_and_range() {
        let f = filter(
            FilterConfig {
                exclude_cidrs: list(&["192.168.100.0/24"]),
                ..Default::default()
            },
            ExclusionConfig {
                exclude_ip_ranges: list(&["10.1.1.10-10.1.1.20"]),
                ..Default::default()
            },
        );
        assert_eq!(
            f.evaluate("X", Some("192.168.100.7".parse().unwrap()), "", &[]),
            Decision::Drop("address in excluded CIDR")
        );
        assert_eq!(
            f.evaluate("X", Some("10.1.1.15".parse().unwrap()), "", &[]),
            Decision::Drop("address in excluded range")
        );
        assert!(f
            .evaluate("X", Some("10.1.1.21".parse().unwrap()), "", &[])
            .is_accept());
    }

    #[test]
    fn test_platform_and_capability_exclusion() {
        let f = filter(
            FilterConfig::default(),
            ExclusionConfig {
                exclude_platforms: list(&["linux", "ip phone"]),
                exclude_capabilities: list(&["Phone", "Host"]),
                ..Default::default()
            },
        );
        assert_eq!(
            f.evaluate("PBX", None, "Cisco IP Phone 8841", &[]),
            Decision::Drop("platform excluded")
        );
        assert_eq!(
            f.evaluate("SRV", None, "", &[Capability::Host]),
            Decision::Drop("capability excluded")
        );
        assert!(f
            .evaluate("SW", None, "cisco WS-C3850-48T", &[Capability::Switch])
            .is_accept());
    }

    #[test]
    fn test_include_cidr_requires_known_address() {
        let f = filter(
            FilterConfig {
                include_cidrs: list(&["10.0.0.0/8"]),
                ..Default::default()
            },
            ExclusionConfig::default(),
        );
        assert!(f
            .evaluate("A", Some("10.20.30.40".parse().unwrap()), "", &[])
            .is_accept());
        assert_eq!(
            f.evaluate("B", Some("172.16.0.1".parse().unwrap()), "", &[]),
            Decision::Drop("address outside include CIDRs")
        );
        // No resolvable address cannot satisfy a non-empty include list.
        assert_eq!(
            f.evaluate("C", None, "", &[]),
            Decision::Drop("address outside include CIDRs")
        );
    }

    #[test]
    fn test_include_wildcards() {
        let f = filter(
            FilterConfig {
                include_wildcards: list(&["*-CORE-*", "*-DIST-*"]),
                ..Default::default()
            },
            ExclusionConfig::default(),
        );
        assert!(f.evaluate("KGW-CORE-A", None, "", &[]).is_accept());
        assert_eq!(
            f.evaluate("KGW-ACCESS-A", None, "", &[]),
            Decision::Drop("hostname not in include wildcards")
        );
    }

    #[test]
    fn test_bad_config_rejected() {
        assert!(DeviceFilter::new(
            &FilterConfig {
                include_cidrs: list(&["10.0.0.0/33"]),
                ..Default::default()
            },
            &ExclusionConfig::default(),
        )
        .is_err());

        assert!(DeviceFilter::new(
            &FilterConfig::default(),
            &ExclusionConfig {
                exclude_ip_ranges: list(&["10.0.0.9-10.0.0.1"]),
                ..Default::default()
            },
        )
        .is_err());
    }
}
