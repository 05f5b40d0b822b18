use appliance_e2e::sim::{SimConfig, SimFaults, SimulatedAppliance};
use appliance_e2e::{E2eError, RoleChange, ServerInformation, ServerRole, ServerRoles};
use std::sync::Arc;
use test_case::test_case;

/// Every role off except the notifier
fn notifier_only() -> ServerRoles {
    ServerRole::ALL
        .iter()
        .map(|role| (*role, *role == ServerRole::Notifier))
        .collect()
}

fn setup(roles: ServerRoles) -> (Arc<SimulatedAppliance>, ServerInformation) {
    let sim = SimulatedAppliance::new(SimConfig {
        roles,
        ..Default::default()
    });
    let server = ServerInformation::new(sim.appliance());
    (sim, server)
}

fn enabled(roles: &ServerRoles) -> Vec<ServerRole> {
    roles
        .iter()
        .filter(|(_, on)| **on)
        .map(|(role, _)| *role)
        .collect()
}

/// Enabling a role keeps the others and writes once; repeating it writes nothing
#[tokio::test]
async fn enable_merges_into_current_roles() {
    let (sim, server) = setup(notifier_only());

    let change = server.enable_server_roles(&[ServerRole::Automate]).await.unwrap();
    assert_eq!(change, RoleChange::Applied);

    let roles = server.server_roles_db().await.unwrap();
    assert_eq!(
        enabled(&roles),
        vec![ServerRole::Notifier, ServerRole::Automate]
    );
    assert_eq!(roles.len(), ServerRole::ALL.len());
    assert_eq!(sim.counters().role_writes, 1);

    let change = server.enable_server_roles(&[ServerRole::Automate]).await.unwrap();
    assert_eq!(change, RoleChange::AlreadyMatching);
    assert_eq!(sim.counters().role_writes, 1, "no write expected for a matching set");
}

#[test_case(&[ServerRole::Automate] ; "single role")]
#[test_case(&[ServerRole::Reporting, ServerRole::Scheduler] ; "two roles")]
#[test_case(&[ServerRole::Smartstate, ServerRole::Notifier] ; "enabled and disabled role")]
#[tokio::test]
async fn disable_clears_only_named_roles(disable: &[ServerRole]) {
    let defaults = SimConfig::default().roles;
    let (_sim, server) = setup(defaults.clone());

    server.disable_server_roles(disable).await.unwrap();

    let roles = server.server_roles_db().await.unwrap();
    for (role, was_enabled) in &defaults {
        let expected = *was_enabled && !disable.contains(role);
        assert_eq!(roles[role], expected, "unexpected state for {}", role);
    }
}

#[tokio::test]
async fn disabling_disabled_roles_writes_nothing() {
    let (sim, server) = setup(notifier_only());

    let change = server
        .disable_server_roles(&[ServerRole::Automate, ServerRole::Reporting])
        .await
        .unwrap();
    assert_eq!(change, RoleChange::AlreadyMatching);
    assert_eq!(sim.counters().role_writes, 0);
}

/// A rejected write is undone by writing the original set back
#[tokio::test]
async fn failed_write_restores_original_roles() {
    let (sim, server) = setup(notifier_only());
    sim.set_faults(SimFaults {
        failing_role_writes: 1,
        ..Default::default()
    });

    let change = server.enable_server_roles(&[ServerRole::Automate]).await.unwrap();
    assert!(
        matches!(change, RoleChange::RolledBack { ref error } if error.contains("rejected")),
        "unexpected change: {:?}",
        change
    );
    assert_eq!(server.server_roles_db().await.unwrap(), notifier_only());
    assert_eq!(sim.counters().role_writes, 2);
}

#[tokio::test]
async fn failed_restore_is_returned() {
    let (sim, server) = setup(notifier_only());
    sim.set_faults(SimFaults {
        failing_role_writes: 2,
        ..Default::default()
    });

    let err = server
        .enable_server_roles(&[ServerRole::Automate])
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::RoleStore(_)));
    assert_eq!(sim.counters().role_writes, 2);
}

#[tokio::test]
async fn full_role_set_update() {
    let (sim, server) = setup(notifier_only());

    let change = server.update_server_roles_db(&notifier_only()).await.unwrap();
    assert_eq!(change, RoleChange::AlreadyMatching);
    assert_eq!(sim.counters().role_writes, 0);

    let mut wanted = notifier_only();
    wanted.insert(ServerRole::Notifier, false);
    wanted.insert(ServerRole::Websocket, true);
    let change = server.update_server_roles_db(&wanted).await.unwrap();
    assert_eq!(change, RoleChange::Applied);
    assert_eq!(enabled(&server.server_roles_db().await.unwrap()), vec![ServerRole::Websocket]);
}
