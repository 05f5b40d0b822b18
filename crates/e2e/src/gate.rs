//! Minimum product versions for version-gated UI features

use tracing::debug;

use appliance_common::Version;

use crate::roles::{ServerRole, ServerRoles};

/// Something only present from a given product version onward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gated {
    Role(ServerRole),
    /// The VMware console support panel
    VmwareConsole,
}

const GATES: &[(Gated, &[u32])] = &[
    (Gated::Role(ServerRole::EmbeddedAnsible), &[5, 8]),
    (Gated::Role(ServerRole::CockpitWs), &[5, 9]),
    (Gated::VmwareConsole, &[5, 8]),
];

/// Minimum version for a gated item, `None` when it is always available
pub fn minimum_version(item: Gated) -> Option<Version> {
    GATES
        .iter()
        .find(|(gated, _)| *gated == item)
        .map(|(_, min)| Version::new(min))
}

pub fn is_supported(item: Gated, version: &Version) -> bool {
    minimum_version(item).map_or(true, |min| *version >= min)
}

/// Roles whose switch is rendered on the given version
pub fn supported_roles(version: &Version) -> Vec<ServerRole> {
    ServerRole::ALL
        .iter()
        .copied()
        .filter(|role| is_supported(Gated::Role(*role), version))
        .collect()
}

/// Silently drop roles the version does not know, returning what was dropped
pub fn strip_unsupported_roles(roles: &mut ServerRoles, version: &Version) -> Vec<ServerRole> {
    let dropped: Vec<ServerRole> = roles
        .keys()
        .copied()
        .filter(|role| !is_supported(Gated::Role(*role), version))
        .collect();
    for role in &dropped {
        debug!("{} is not available on {}, dropping it from the update", role, version);
        roles.remove(role);
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("5.7.4", false, false ; "before both")]
    #[test_case("5.8.1", true, false ; "ansible only")]
    #[test_case("5.9", true, true ; "both")]
    #[test_case("latest", true, true ; "upstream")]
    fn test_role_gates(version: &str, ansible: bool, cockpit: bool) {
        let version: Version = version.parse().unwrap();
        assert_eq!(is_supported(Gated::Role(ServerRole::EmbeddedAnsible), &version), ansible);
        assert_eq!(is_supported(Gated::Role(ServerRole::CockpitWs), &version), cockpit);
        assert!(is_supported(Gated::Role(ServerRole::Automate), &version));
    }

    #[test]
    fn test_strip_unsupported_roles() {
        let mut roles = ServerRoles::new();
        roles.insert(ServerRole::EmbeddedAnsible, true);
        roles.insert(ServerRole::CockpitWs, true);
        roles.insert(ServerRole::Notifier, false);

        let dropped = strip_unsupported_roles(&mut roles, &Version::new(&[5, 8, 2]));
        assert_eq!(dropped, vec![ServerRole::CockpitWs]);
        assert_eq!(roles.len(), 2);
        assert!(roles.contains_key(&ServerRole::EmbeddedAnsible));
    }

    #[test]
    fn test_supported_roles_counts() {
        assert_eq!(supported_roles(&Version::new(&[5, 7])).len(), 24);
        assert_eq!(supported_roles(&Version::Latest).len(), 26);
    }
}
