use appliance_common::Version;
use appliance_e2e::sim::{SimConfig, SimFaults, SimulatedAppliance};
use appliance_e2e::{ProviderConfig, Scenario, ScenarioRunner};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn providers() -> BTreeMap<String, ProviderConfig> {
    let mut providers = BTreeMap::new();
    providers.insert(
        "corp_ldap".to_string(),
        ProviderConfig::Ldap {
            host1: "ldap.example.com".to_string(),
            host2: Some("ldap2.example.com".to_string()),
            host3: None,
            port: "389".to_string(),
            domain_prefix: None,
            user_suffix: Some("example.com".to_string()),
            base_dn: "dc=example,dc=com".to_string(),
            bind_dn: "cn=admin,dc=example,dc=com".to_string(),
            bind_password: "secret".to_string(),
            get_groups: true,
            get_roles: false,
            follow_referrals: false,
        },
    );
    providers
}

fn runner(sim: &Arc<SimulatedAppliance>, output: &Path) -> ScenarioRunner {
    ScenarioRunner::new(sim.appliance(), providers(), output)
}

fn write(dir: &Path, file: &str, yaml: &str) {
    std::fs::write(dir.join(file), yaml).unwrap();
}

/// The bundled scenarios all pass against a default simulated appliance
#[tokio::test]
async fn bundled_scenarios_pass() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios");
    let output = tempfile::tempdir().unwrap();
    let sim = SimulatedAppliance::new(SimConfig::default());

    let results = runner(&sim, output.path()).run_dir(&dir).await.unwrap();

    let failures: Vec<_> = results
        .results
        .iter()
        .filter(|r| !r.success)
        .map(|r| format!("{}: {}", r.name, r.error.as_deref().unwrap_or("?")))
        .collect();
    assert!(failures.is_empty(), "failed scenarios: {:#?}", failures);
    assert!(results.total >= 5);
    assert_eq!(results.skipped, 0);
}

#[tokio::test]
async fn failing_step_stops_the_scenario() {
    let specs = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(
        specs.path(),
        "a_logging.yaml",
        r#"
name: logging
steps:
  - action: update_form
    form: logging
    values:
      log_level: debug
    expect: committed
  - action: assert_values
    form: logging
    expected:
      log_level: debug
"#,
    );
    write(
        specs.path(),
        "b_broken.yaml",
        r#"
name: broken
steps:
  - action: update_form
    form: ntp_servers
    values:
      ntp_server_1: pool.example.com
    expect: unchanged
  - action: log
    message: never reached
"#,
    );

    let sim = SimulatedAppliance::new(SimConfig::default());
    let runner = runner(&sim, output.path());
    let results = runner.run_dir(specs.path()).await.unwrap();

    assert_eq!(results.total, 2);
    assert_eq!(results.passed, 1);
    assert_eq!(results.failed, 1);
    assert!(!results.success());

    let broken = &results.results[1];
    assert_eq!(broken.steps.len(), 1, "steps after a failure must not run");
    assert!(broken
        .error
        .as_deref()
        .is_some_and(|e| e.contains("update_form:ntp_servers")));

    let path = runner.write_results(&results).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["passed"], 1);
    assert_eq!(json["results"][0]["steps"][0]["outcome"], "Committed");
}

#[tokio::test]
async fn scenario_below_min_version_is_skipped() {
    let output = tempfile::tempdir().unwrap();
    let scenario = Scenario::from_yaml(
        r#"
name: embedded-ansible
min_version: "5.8"
steps:
  - action: enable_server_roles
    roles: [embedded_ansible]
"#,
    )
    .unwrap();

    let sim = SimulatedAppliance::new(SimConfig {
        version: Version::new(&[5, 7, 4]),
        ..Default::default()
    });
    let results = runner(&sim, output.path())
        .run_scenarios(std::slice::from_ref(&scenario))
        .await;

    assert_eq!(results.skipped, 1);
    assert!(results.success());
    assert_eq!(sim.counters().role_writes, 0);
}

#[tokio::test]
async fn unknown_provider_fails_the_step() {
    let output = tempfile::tempdir().unwrap();
    let scenario = Scenario::from_yaml(
        r#"
name: amazon
steps:
  - action: configure_auth
    mode: amazon
    provider: corp_amazon
"#,
    )
    .unwrap();

    let sim = SimulatedAppliance::new(SimConfig::default());
    let result = runner(&sim, output.path()).run_scenario(&scenario).await;

    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.contains("corp_amazon")));
}

/// Role write failures surface as a rolled back outcome, not a failure
#[tokio::test]
async fn rolled_back_roles_are_reported() {
    let output = tempfile::tempdir().unwrap();
    let scenario = Scenario::from_yaml(
        r#"
name: roles
steps:
  - action: enable_server_roles
    roles: [notifier]
"#,
    )
    .unwrap();

    let sim = SimulatedAppliance::new(SimConfig::default());
    sim.set_faults(SimFaults {
        failing_role_writes: 1,
        ..Default::default()
    });
    let result = runner(&sim, output.path()).run_scenario(&scenario).await;

    assert!(result.success);
    let outcome = result.steps[0].outcome.as_deref().unwrap_or_default();
    assert!(outcome.starts_with("RolledBack"), "outcome was {}", outcome);
}
