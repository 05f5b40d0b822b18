use appliance_common::{FieldMap, FieldValue};
use appliance_e2e::auth::{AuthForm, AuthProvider, ExternalSettings, LdapSettings};
use appliance_e2e::browser::{Destination, NavigateOptions, Target};
use appliance_e2e::sim::{SimConfig, SimFaults, SimulatedAppliance};
use appliance_e2e::{
    AuthMode, AuthSettings, AuthenticationSetting, ConfigureOptions, E2eError, ProviderConfig,
    SaveAction,
};
use std::sync::Arc;

fn setup() -> (Arc<SimulatedAppliance>, AuthenticationSetting) {
    let sim = SimulatedAppliance::new(SimConfig::default());
    let auth = AuthenticationSetting::new(sim.appliance());
    (sim, auth)
}

fn ldap_provider() -> ProviderConfig {
    ProviderConfig::Ldap {
        host1: "ldap.example.com".to_string(),
        host2: None,
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
    }
}

fn as_provider(provider: &ProviderConfig) -> Option<&dyn AuthProvider> {
    Some(provider)
}

fn assert_blank(settings: &AuthSettings) {
    for (name, value) in settings.values().unwrap() {
        assert!(
            value == FieldValue::Text(String::new()) || value == FieldValue::Bool(false),
            "{} should render blank, got {}",
            name,
            value
        );
    }
}

/// Fields of a variant do not survive switching the mode away and back
#[tokio::test]
async fn switching_mode_back_renders_blank_variant() {
    let (sim, _auth) = setup();
    let appliance = sim.appliance();
    appliance
        .navigate_to(
            &Target::Server,
            Destination::Authentication,
            NavigateOptions::default(),
        )
        .await
        .unwrap();
    let form = AuthForm::new(appliance.browser.as_ref());

    form.fill(&AuthSettings::Ldap(LdapSettings {
        host1: Some("ldap.example.com".to_string()),
        get_groups: Some(true),
        ..Default::default()
    }))
    .await
    .unwrap();
    form.select_mode(AuthMode::Amazon).await.unwrap();
    form.select_mode(AuthMode::Ldap).await.unwrap();

    let settings = form.read().await.unwrap();
    assert_eq!(settings.mode(), AuthMode::Ldap);
    assert_blank(&settings);

    // switching without writing anything
    form.select_mode(AuthMode::Database).await.unwrap();
    form.select_mode(AuthMode::Ldaps).await.unwrap();
    let settings = form.read().await.unwrap();
    assert_eq!(settings.mode(), AuthMode::Ldaps);
    assert_blank(&settings);
}

#[tokio::test]
async fn provider_backed_mode_needs_a_provider() {
    let (sim, auth) = setup();

    let err = auth
        .configure(Some(AuthMode::Ldap), None, ConfigureOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::Config(_)));
    assert_eq!(sim.counters().navigations, 0);
}

#[tokio::test]
async fn database_mode_ignores_provider() {
    let (sim, auth) = setup();
    let provider = ldap_provider();

    let action = auth
        .configure(
            Some(AuthMode::Database),
            as_provider(&provider),
            ConfigureOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(action, SaveAction::Unchanged);

    let action = auth
        .configure(None, None, ConfigureOptions::default())
        .await
        .unwrap();
    assert_eq!(action, SaveAction::Unchanged);
    assert_eq!(sim.counters().saves, 0);
}

#[tokio::test]
async fn ldap_is_validated_then_saved() {
    let (sim, auth) = setup();
    let provider = ldap_provider();

    let action = auth
        .configure(
            Some(AuthMode::Ldap),
            as_provider(&provider),
            ConfigureOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(action, SaveAction::Committed);

    let counters = sim.counters();
    assert_eq!(counters.validations, 1);
    assert_eq!(counters.saves, 1);

    assert_eq!(auth.auth_mode().await.unwrap(), AuthMode::Ldap);
    match auth.auth_settings().await.unwrap() {
        AuthSettings::Ldap(ldap) => {
            assert_eq!(ldap.host1.as_deref(), Some("ldap.example.com"));
            assert_eq!(ldap.user_suffix.as_deref(), Some("example.com"));
            assert_eq!(ldap.get_groups, Some(true));
        }
        other => panic!("expected LDAP settings, got {:?}", other),
    }
}

#[tokio::test]
async fn validation_can_be_skipped() {
    let (sim, auth) = setup();
    let provider = ldap_provider();

    let options = ConfigureOptions {
        validate: false,
        ..Default::default()
    };
    let action = auth
        .configure(Some(AuthMode::Ldaps), as_provider(&provider), options)
        .await
        .unwrap();
    assert_eq!(action, SaveAction::Committed);
    assert_eq!(sim.counters().validations, 0);
}

#[tokio::test]
async fn reset_leaves_database_mode() {
    let (sim, auth) = setup();
    let provider = ldap_provider();

    let options = ConfigureOptions {
        reset: true,
        ..Default::default()
    };
    let action = auth
        .configure(Some(AuthMode::Ldap), as_provider(&provider), options)
        .await
        .unwrap();
    assert_eq!(action, SaveAction::Reverted);
    assert_eq!(sim.counters().saves, 0);
    assert_eq!(auth.auth_mode().await.unwrap(), AuthMode::Database);
}

/// A failed validation stops before the save
#[tokio::test]
async fn validation_error_fails_before_save() {
    let (sim, auth) = setup();
    sim.set_faults(SimFaults {
        validate_error: Some("LDAP host unreachable".to_string()),
        ..Default::default()
    });
    let provider = ldap_provider();

    let err = auth
        .configure(
            Some(AuthMode::Ldap),
            as_provider(&provider),
            ConfigureOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::Verification(ref m) if m.contains("unreachable")));
    assert_eq!(sim.counters().saves, 0);
}

#[tokio::test]
async fn provider_of_another_kind_is_rejected() {
    let (sim, auth) = setup();
    let provider = ldap_provider();

    let err = auth
        .configure(
            Some(AuthMode::Amazon),
            as_provider(&provider),
            ConfigureOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::Config(_)));
    assert_eq!(sim.counters().navigations, 0);
}

#[tokio::test]
async fn external_mode_without_provider() {
    let (_sim, auth) = setup();

    let action = auth
        .configure(Some(AuthMode::External), None, ConfigureOptions::default())
        .await
        .unwrap();
    assert_eq!(action, SaveAction::Committed);
    assert_eq!(auth.auth_mode().await.unwrap(), AuthMode::External);
}

#[tokio::test]
async fn direct_mode_switch_is_limited() {
    let (sim, auth) = setup();

    let err = auth.set_auth_mode(AuthMode::Ldap).await.unwrap_err();
    assert!(matches!(err, E2eError::Config(_)));
    assert_eq!(sim.counters().navigations, 0);

    let action = auth.set_auth_mode(AuthMode::External).await.unwrap();
    assert_eq!(action, SaveAction::Committed);
    let action = auth.set_auth_mode(AuthMode::External).await.unwrap();
    assert_eq!(action, SaveAction::Unchanged);
}

#[tokio::test]
async fn session_timeout() {
    let (sim, auth) = setup();

    let action = auth.set_session_timeout(Some("2"), None).await.unwrap();
    assert_eq!(action, SaveAction::Committed);
    assert_eq!(sim.counters().saves, 1);

    let action = auth.set_session_timeout(Some("2"), Some("0")).await.unwrap();
    assert_eq!(action, SaveAction::Unchanged);
    assert_eq!(sim.counters().saves, 1);
}

fn failing_saves(sim: &SimulatedAppliance) {
    sim.set_faults(SimFaults {
        save_error: Some("Authentication settings not saved".to_string()),
        ..Default::default()
    });
}

/// An error flash after saving fails the mode switch
#[tokio::test]
async fn mode_switch_save_error_is_reported() {
    let (sim, auth) = setup();
    failing_saves(&sim);

    let err = auth.set_auth_mode(AuthMode::External).await.unwrap_err();
    assert!(
        matches!(err, E2eError::Verification(ref m) if m.contains("not saved")),
        "unexpected error: {:?}",
        err
    );
    assert_eq!(sim.counters().saves, 1);
}

#[tokio::test]
async fn settings_save_error_is_reported() {
    let (sim, auth) = setup();
    failing_saves(&sim);

    let settings = AuthSettings::External(ExternalSettings {
        enable_sso: Some(true),
        ..Default::default()
    });
    let err = auth.set_auth_settings(&settings).await.unwrap_err();
    assert!(
        matches!(err, E2eError::Verification(ref m) if m.contains("not saved")),
        "unexpected error: {:?}",
        err
    );
}

/// Field names outside the chosen variant are rejected before the mode switch
#[tokio::test]
async fn untyped_fill_rejects_foreign_fields() {
    let (sim, _auth) = setup();
    let appliance = sim.appliance();
    appliance
        .navigate_to(
            &Target::Server,
            Destination::Authentication,
            NavigateOptions::wait(),
        )
        .await
        .unwrap();
    let form = AuthForm::new(appliance.browser.as_ref());

    let mut values = FieldMap::new();
    values.insert("access_key".to_string(), FieldValue::from("AKIA"));
    let err = form.fill_values(AuthMode::Ldap, &values).await.unwrap_err();

    assert!(matches!(err, E2eError::Config(ref m) if m.contains("access_key")));
    assert_eq!(sim.counters().field_writes, 0);
    assert_eq!(form.mode().await.unwrap(), AuthMode::Database);

    let mut values = FieldMap::new();
    values.insert("host1".to_string(), FieldValue::from("ldap.example.com"));
    let staged = form.fill_values(AuthMode::Ldap, &values).await.unwrap();
    assert!(staged.changed());
    assert_eq!(form.mode().await.unwrap(), AuthMode::Ldap);
}
