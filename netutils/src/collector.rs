//! Fact collection: drive one open session through the command profile for
//! its platform and assemble a [`DeviceFacts`] record.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use netwalker_api::model::{
    DeviceFacts, DiscoveryProtocol, FactFailure, FactKind, NeighborInfo, Platform, UNKNOWN_SERIAL,
};

use crate::parse::{identity, interfaces, neighbors, stack, vlans};
use crate::profiles;
use crate::transport::Session;

/// Execute the fact-kinds in their fixed order and gather the results.
///
/// `primed` seeds the output cache, so the command the platform detector
/// already ran is not sent a second time.
///
/// Individual failures (transport or rejected output) are recorded per
/// fact-kind and collection continues; only the per-command deadline inside
/// the session bounds the damage a dead device can do.
pub fn collect_facts(
    session: &mut Session,
    platform: Platform,
    protocols: &[DiscoveryProtocol],
    primed: Option<(&'static str, String)>,
) -> DeviceFacts {
    let mut collector = Collector {
        session,
        platform,
        cache: primed.into_iter().collect(),
        facts: DeviceFacts::default(),
    };

    collector.identity();
    collector.version();
    collector.interfaces();
    collector.vlans();
    collector.stack_members();
    if protocols.contains(&DiscoveryProtocol::Cdp) {
        collector.cdp_neighbors();
    }
    if protocols.contains(&DiscoveryProtocol::Lldp) {
        collector.lldp_neighbors();
    }

    collector.facts.neighbors = dedup_neighbors(std::mem::take(&mut collector.facts.neighbors));
    collector.facts
}

struct Collector<'a> {
    session: &'a mut Session,
    platform: Platform,
    /// Output cache: identity and version usually share one command, which
    /// is sent only once.
    cache: HashMap<&'static str, String>,
    facts: DeviceFacts,
}

impl Collector<'_> {
    /// Run the profile's probes for `kind` until one is accepted by the
    /// device; record a failure if none is.
    fn run(&mut self, kind: FactKind) -> Option<String> {
        let commands = profiles::commands(self.platform, kind);
        if commands.is_empty() {
            debug!("{} has no {kind} command", self.platform);
            return None;
        }

        let mut last_rejection = None;
        for &command in commands {
            if let Some(cached) = self.cache.get(command) {
                return Some(cached.clone());
            }
            match self.session.send(command) {
                Ok(output) => {
                    if profiles::output_accepted(&output) {
                        self.cache.insert(command, output.clone());
                        return Some(output);
                    }
                    debug!("'{command}' rejected by device");
                    last_rejection = Some(format!("'{command}' rejected"));
                }
                Err(e) => {
                    warn!("{kind} command '{command}' failed: {e}");
                    self.fail(kind, e.to_string());
                    return None;
                }
            }
        }

        if let Some(detail) = last_rejection {
            self.fail(kind, detail);
        }
        None
    }

    fn fail(&mut self, kind: FactKind, detail: String) {
        self.facts.failures.push(FactFailure { kind, detail });
    }

    fn identity(&mut self) {
        let Some(output) = self.run(FactKind::Identity) else {
            return;
        };

        let mut info = identity::parse_identity(self.platform, &output);
        if info.hostname.is_empty() {
            info.hostname = self.session.prompt_hostname().to_string();
        }
        if info.serial_number.is_empty() {
            info.serial_number = UNKNOWN_SERIAL.to_string();
        }
        if info.hostname.is_empty() {
            self.fail(FactKind::Identity, "no hostname in output or prompt".into());
            return;
        }
        self.facts.identity = Some(info);
    }

    fn version(&mut self) {
        let Some(output) = self.run(FactKind::Version) else {
            return;
        };
        match identity::parse_version(self.platform, &output) {
            Some(version) => self.facts.software_version = Some(version),
            None => self.fail(FactKind::Version, "no version string recognized".into()),
        }
    }

    fn interfaces(&mut self) {
        if let Some(output) = self.run(FactKind::Interfaces) {
            self.facts.interfaces = interfaces::parse_interfaces(self.platform, &output);
        }
    }

    fn vlans(&mut self) {
        if let Some(output) = self.run(FactKind::Vlans) {
            self.facts.vlans = vlans::parse_vlans(&output);
        }
    }

    /// Stack membership: the first probe whose output parses into members
    /// wins. Stackable switches answer `show switch detail`; VSS chassis
    /// reject it and answer `show module`.
    fn stack_members(&mut self) {
        let commands = profiles::commands(self.platform, FactKind::StackMembers);
        for &command in commands {
            let output = match self.cache.get(command) {
                Some(cached) => cached.clone(),
                None => match self.session.send(command) {
                    Ok(output) => {
                        self.cache.insert(command, output.clone());
                        output
                    }
                    Err(e) => {
                        warn!("stack_members command '{command}' failed: {e}");
                        self.fail(FactKind::StackMembers, e.to_string());
                        return;
                    }
                },
            };
            if !profiles::output_accepted(&output) {
                continue;
            }

            let members = match command {
                "show module" => stack::parse_vss_module(&output),
                _ => stack::parse_switch_detail(&output),
            };
            if !members.is_empty() {
                self.facts.stack_members = members;
                self.enrich_stack_members();
                return;
            }
        }
        // Standalone switches simply have no stack; that is not a failure.
    }

    /// `show switch detail` has no serials or models; merge them in from the
    /// per-switch sections of the already-cached version output.
    fn enrich_stack_members(&mut self) {
        let version_commands = profiles::commands(self.platform, FactKind::Identity);
        let Some(version_output) = version_commands
            .first()
            .and_then(|command| self.cache.get(command))
        else {
            return;
        };

        let sections = stack::parse_switch_sections(version_output);
        let software_version = self.facts.software_version.clone();
        for member in &mut self.facts.stack_members {
            if member.software_version.is_none() {
                member.software_version = software_version.clone();
            }
            if let Some((_, model, serial)) = sections
                .iter()
                .find(|(number, _, _)| *number == member.switch_number)
            {
                if member.hardware_model.is_empty() {
                    member.hardware_model = model.clone();
                }
                if member.serial_number.is_empty() {
                    member.serial_number = serial.clone();
                }
            }
        }

        // Switch 1 on stacks reports only in the top-level identity fields.
        if let Some(identity) = &self.facts.identity {
            for member in &mut self.facts.stack_members {
                if member.switch_number == 1 {
                    if member.hardware_model.is_empty() {
                        member.hardware_model = identity.hardware_model.clone();
                    }
                    if member.serial_number.is_empty() && identity.serial_number != UNKNOWN_SERIAL {
                        member.serial_number = identity.serial_number.clone();
                    }
                }
            }
        }
    }

    fn cdp_neighbors(&mut self) {
        if let Some(output) = self.run(FactKind::CdpNeighbors) {
            self.facts
                .neighbors
                .extend(neighbors::parse_cdp_neighbors(&output));
        }
    }

    fn lldp_neighbors(&mut self) {
        if let Some(output) = self.run(FactKind::LldpNeighbors) {
            self.facts
                .neighbors
                .extend(neighbors::parse_lldp_neighbors(&output));
        }
    }
}

/// Merge CDP and LLDP sightings of the same link: first protocol wins, with
/// capability sets unioned. The key is (local-if, remote name, remote-if),
/// all case-folded and already canonicalized by the parsers.
fn dedup_neighbors(neighbors: Vec<NeighborInfo>) -> Vec<NeighborInfo> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut merged: Vec<NeighborInfo> = Vec::new();

    for neighbor in neighbors {
        let key = (
            neighbor.local_interface.to_ascii_lowercase(),
            neighbor.remote_name.to_ascii_lowercase(),
            neighbor.remote_interface.to_ascii_lowercase(),
        );
        if seen.insert(key.clone()) {
            merged.push(neighbor);
        } else if let Some(existing) = merged.iter_mut().find(|n| {
            n.local_interface.eq_ignore_ascii_case(&neighbor.local_interface)
                && n.remote_name.eq_ignore_ascii_case(&neighbor.remote_name)
                && n.remote_interface
                    .eq_ignore_ascii_case(&neighbor.remote_interface)
        }) {
            for capability in neighbor.capabilities {
                if !existing.capabilities.contains(&capability) {
                    existing.capabilities.push(capability);
                }
            }
            if existing.remote_ip.is_none() {
                existing.remote_ip = neighbor.remote_ip;
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use netwalker_api::model::Capability;

    use super::*;

    fn neighbor(
        local: &str,
        name: &str,
        remote: &str,
        protocol: DiscoveryProtocol,
        capabilities: Vec<Capability>,
    ) -> NeighborInfo {
        NeighborInfo {
            local_interface: local.to_string(),
            remote_name: name.to_string(),
            remote_interface: remote.to_string(),
            remote_ip: None,
            platform: String::new(),
            capabilities,
            protocol,
        }
    }

    #[test]
    fn test_dedup_merges_cdp_and_lldp() {
        let merged = dedup_neighbors(vec![
            neighbor(
                "GigabitEthernet1/0/1",
                "DIST-A",
                "GigabitEthernet1/0/24",
                DiscoveryProtocol::Cdp,
                vec![Capability::Switch],
            ),
            neighbor(
                "GigabitEthernet1/0/1",
                "dist-a",
                "GigabitEthernet1/0/24",
                DiscoveryProtocol::Lldp,
                vec![Capability::Router],
            ),
            neighbor(
                "GigabitEthernet1/0/2",
                "DIST-B",
                "GigabitEthernet1/0/24",
                DiscoveryProtocol::Cdp,
                vec![],
            ),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].protocol, DiscoveryProtocol::Cdp);
        assert_eq!(
            merged[0].capabilities,
            vec![Capability::Switch, Capability::Router],
            "capability sets must union"
        );
    }

    #[test]
    fn test_dedup_keeps_distinct_links() {
        let merged = dedup_neighbors(vec![
            neighbor("Gi1", "A", "Gi2", DiscoveryProtocol::Cdp, vec![]),
            neighbor("Gi1", "A", "Gi3", DiscoveryProtocol::Cdp, vec![]),
            neighbor("Gi2", "A", "Gi2", DiscoveryProtocol::Cdp, vec![]),
        ]);
        assert_eq!(merged.len(), 3);
    }
}
