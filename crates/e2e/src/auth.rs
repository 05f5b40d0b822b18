//! Authentication modes and the conditional settings form.
//!
//! The authentication tab shows one of five mutually exclusive field sets,
//! selected by the `auth_mode` dropdown. [`AuthSettings`] models that as a
//! sum type; [`AuthForm`] keeps the dropdown and the visible variant in step
//! on a rendered page.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use appliance_common::{FieldMap, FieldValue};

use crate::browser::{Browser, Click};
use crate::error::{E2eError, E2eResult};
use crate::forms::{fill_widgets, read_widgets, SubForm};
use crate::protocol::Staged;
use crate::widget::{Locator, Widget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Database,
    Ldap,
    Ldaps,
    Amazon,
    External,
}

impl AuthMode {
    pub const ALL: [AuthMode; 5] = [
        AuthMode::Database,
        AuthMode::Ldap,
        AuthMode::Ldaps,
        AuthMode::Amazon,
        AuthMode::External,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Database => "database",
            AuthMode::Ldap => "ldap",
            AuthMode::Ldaps => "ldaps",
            AuthMode::Amazon => "amazon",
            AuthMode::External => "external",
        }
    }

    /// Option label in the mode dropdown
    pub fn label(&self) -> &'static str {
        match self {
            AuthMode::Database => "Database",
            AuthMode::Ldap => "LDAP",
            AuthMode::Ldaps => "LDAPS",
            AuthMode::Amazon => "Amazon",
            AuthMode::External => "External (httpd)",
        }
    }

    pub fn from_label(label: &str) -> E2eResult<Self> {
        AuthMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.label() == label)
            .ok_or_else(|| E2eError::Config(format!("unknown authentication mode label: {}", label)))
    }

    /// Modes whose settings come from a provider and can be validated
    pub fn requires_provider(&self) -> bool {
        matches!(self, AuthMode::Ldap | AuthMode::Ldaps | AuthMode::Amazon)
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        AuthMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == lower || mode.label() == s)
            .ok_or_else(|| E2eError::Config(format!("unknown authentication mode: {}", s)))
    }
}

/// How LDAP user names are formed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Upn,
    Email,
    Cn,
    Uid,
    Sam,
}

impl UserType {
    pub fn label(&self) -> &'static str {
        match self {
            UserType::Upn => "User Principal Name",
            UserType::Email => "E-mail Address",
            UserType::Cn => "Distinguished Name (CN=<user>)",
            UserType::Uid => "Distinguished Name (UID=<user>)",
            UserType::Sam => "SAM Account Name",
        }
    }
}

/// LDAP and LDAPS share the same fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LdapSettings {
    pub host1: Option<String>,
    pub host2: Option<String>,
    pub host3: Option<String>,
    pub port: Option<String>,
    pub user_type: Option<String>,
    pub domain_prefix: Option<String>,
    pub user_suffix: Option<String>,
    pub get_roles: Option<bool>,
    pub get_groups: Option<bool>,
    pub follow_referrals: Option<bool>,
    pub base_dn: Option<String>,
    pub bind_dn: Option<String>,
    pub bind_password: Option<String>,
}

impl SubForm for LdapSettings {
    const PANEL: &'static str = "LDAP Settings";

    fn widgets() -> Vec<Widget> {
        vec![
            Widget::input("host1", "authentication_ldaphost_1"),
            Widget::input("host2", "authentication_ldaphost_2"),
            Widget::input("host3", "authentication_ldaphost_3"),
            Widget::input("port", "authentication_ldapport"),
            Widget::select("user_type", "authentication_user_type"),
            Widget::input("domain_prefix", "authentication_domain_prefix"),
            Widget::input("user_suffix", "authentication_user_suffix"),
            // the label reads "Get [...] Groups" but the control names are swapped
            Widget::checkbox("get_roles", "get_direct_groups"),
            Widget::checkbox("get_groups", "ldap_role"),
            Widget::checkbox("follow_referrals", "follow_referrals"),
            Widget::input("base_dn", "authentication_basedn"),
            Widget::input("bind_dn", "authentication_bind_dn"),
            Widget::input("bind_password", "authentication_bind_pwd"),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AmazonSettings {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub get_groups: Option<bool>,
}

impl SubForm for AmazonSettings {
    const PANEL: &'static str = "Amazon Settings";

    fn widgets() -> Vec<Widget> {
        vec![
            Widget::input("access_key", "authentication_amazon_key"),
            Widget::input("secret_key", "authentication_amazon_secret"),
            Widget::checkbox("get_groups", "amazon_role"),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalSettings {
    pub enable_sso: Option<bool>,
    pub enable_saml: Option<bool>,
    pub get_groups: Option<bool>,
}

impl SubForm for ExternalSettings {
    const PANEL: &'static str = "External Authentication";

    fn widgets() -> Vec<Widget> {
        vec![
            Widget::checkbox("enable_sso", "sso_enabled"),
            Widget::checkbox("enable_saml", "saml_enabled"),
            Widget::checkbox("get_groups", "httpd_role"),
        ]
    }
}

/// Selected mode together with the fields of its variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "auth_mode", content = "auth_settings", rename_all = "snake_case")]
pub enum AuthSettings {
    Database,
    Ldap(LdapSettings),
    Ldaps(LdapSettings),
    Amazon(AmazonSettings),
    External(ExternalSettings),
}

impl AuthSettings {
    /// Variant of `mode` with every field unset
    pub fn empty(mode: AuthMode) -> Self {
        match mode {
            AuthMode::Database => AuthSettings::Database,
            AuthMode::Ldap => AuthSettings::Ldap(LdapSettings::default()),
            AuthMode::Ldaps => AuthSettings::Ldaps(LdapSettings::default()),
            AuthMode::Amazon => AuthSettings::Amazon(AmazonSettings::default()),
            AuthMode::External => AuthSettings::External(ExternalSettings::default()),
        }
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            AuthSettings::Database => AuthMode::Database,
            AuthSettings::Ldap(_) => AuthMode::Ldap,
            AuthSettings::Ldaps(_) => AuthMode::Ldaps,
            AuthSettings::Amazon(_) => AuthMode::Amazon,
            AuthSettings::External(_) => AuthMode::External,
        }
    }

    /// Set fields of the variant
    pub fn values(&self) -> E2eResult<FieldMap> {
        match self {
            AuthSettings::Database => Ok(FieldMap::new()),
            AuthSettings::Ldap(s) | AuthSettings::Ldaps(s) => s.values(),
            AuthSettings::Amazon(s) => s.values(),
            AuthSettings::External(s) => s.values(),
        }
    }

    /// Build the variant of `mode`; a field outside it is a configuration error
    pub fn from_values(mode: AuthMode, values: FieldMap) -> E2eResult<Self> {
        Ok(match mode {
            AuthMode::Database => {
                if let Some(name) = values.keys().next() {
                    return Err(E2eError::Config(format!(
                        "{} is not a field of database authentication",
                        name
                    )));
                }
                AuthSettings::Database
            }
            AuthMode::Ldap => AuthSettings::Ldap(LdapSettings::from_values(values)?),
            AuthMode::Ldaps => AuthSettings::Ldaps(LdapSettings::from_values(values)?),
            AuthMode::Amazon => AuthSettings::Amazon(AmazonSettings::from_values(values)?),
            AuthMode::External => AuthSettings::External(ExternalSettings::from_values(values)?),
        })
    }
}

/// The mode dropdown
pub fn mode_widget() -> Widget {
    Widget::select("auth_mode", "authentication_mode")
}

/// Fields of the variant shown for `mode`
pub fn variant_widgets(mode: AuthMode) -> Vec<Widget> {
    match mode {
        AuthMode::Database => Vec::new(),
        AuthMode::Ldap | AuthMode::Ldaps => LdapSettings::widgets(),
        AuthMode::Amazon => AmazonSettings::widgets(),
        AuthMode::External => ExternalSettings::widgets(),
    }
}

/// Validate button of provider-backed variants
pub fn validate_button(mode: AuthMode) -> Option<Widget> {
    mode.requires_provider()
        .then(|| Widget::button("validate", Locator::button_text("Validate")))
}

/// Resolver binding the mode dropdown to its active variant on a page
pub struct AuthForm<'a> {
    browser: &'a dyn Browser,
}

impl<'a> AuthForm<'a> {
    pub fn new(browser: &'a dyn Browser) -> Self {
        Self { browser }
    }

    pub async fn mode(&self) -> E2eResult<AuthMode> {
        match self.browser.read(&mode_widget()).await? {
            FieldValue::Text(label) => AuthMode::from_label(&label),
            other => Err(E2eError::Config(format!(
                "authentication mode dropdown returned {}",
                other
            ))),
        }
    }

    /// Active mode and its variant's current values
    pub async fn read(&self) -> E2eResult<AuthSettings> {
        let mode = self.mode().await?;
        let values = read_widgets(self.browser, &variant_widgets(mode)).await?;
        AuthSettings::from_values(mode, values)
    }

    /// Switch the dropdown; the variant re-renders, so widgets must be
    /// resolved again afterwards
    pub async fn select_mode(&self, mode: AuthMode) -> E2eResult<Staged> {
        let fill = self
            .browser
            .fill(&mode_widget(), &FieldValue::from(mode.label()))
            .await?;
        if fill == crate::browser::Fill::Changed {
            debug!("Authentication mode switched to {}", mode);
        }
        Ok(Staged::Unchanged.record(fill))
    }

    /// Select the settings' mode, then fill its set fields
    pub async fn fill(&self, settings: &AuthSettings) -> E2eResult<Staged> {
        let mode = settings.mode();
        let values = settings.values()?;

        let staged = self.select_mode(mode).await?;
        if staged == Staged::Unavailable {
            return Ok(staged);
        }

        let widgets = variant_widgets(mode);
        let filled = fill_widgets(self.browser, mode.label(), &widgets, &values).await?;
        Ok(match (staged, filled) {
            (_, Staged::Unavailable) => Staged::Unavailable,
            (Staged::Changed, _) | (_, Staged::Changed) => Staged::Changed,
            _ => Staged::Unchanged,
        })
    }

    /// Untyped variant of [`AuthForm::fill`]; names are checked before any write
    pub async fn fill_values(&self, mode: AuthMode, values: &FieldMap) -> E2eResult<Staged> {
        let settings = AuthSettings::from_values(mode, values.clone())?;
        self.fill(&settings).await
    }

    /// Click the active variant's Validate button
    pub async fn validate(&self, mode: AuthMode) -> E2eResult<Click> {
        match validate_button(mode) {
            Some(button) => self.browser.click(&button).await,
            None => Ok(Click::Unavailable),
        }
    }
}

/// Source of provider credentials for provider-backed modes
pub trait AuthProvider: Send + Sync {
    /// Full settings for `mode`
    fn as_fill_value(&self, mode: AuthMode, user_type: Option<UserType>) -> E2eResult<AuthSettings>;

    /// Reduced settings used with external (httpd) authentication
    fn as_fill_external_value(&self) -> ExternalSettings;
}

fn default_true() -> bool {
    true
}

/// Authentication provider described in the harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    Ldap {
        host1: String,
        #[serde(default)]
        host2: Option<String>,
        #[serde(default)]
        host3: Option<String>,
        port: String,
        #[serde(default)]
        domain_prefix: Option<String>,
        #[serde(default)]
        user_suffix: Option<String>,
        base_dn: String,
        bind_dn: String,
        bind_password: String,
        #[serde(default = "default_true")]
        get_groups: bool,
        #[serde(default)]
        get_roles: bool,
        #[serde(default)]
        follow_referrals: bool,
    },
    Amazon {
        access_key: String,
        secret_key: String,
        #[serde(default = "default_true")]
        get_groups: bool,
    },
}

impl AuthProvider for ProviderConfig {
    fn as_fill_value(&self, mode: AuthMode, user_type: Option<UserType>) -> E2eResult<AuthSettings> {
        match (self, mode) {
            (
                ProviderConfig::Ldap {
                    host1,
                    host2,
                    host3,
                    port,
                    domain_prefix,
                    user_suffix,
                    base_dn,
                    bind_dn,
                    bind_password,
                    get_groups,
                    get_roles,
                    follow_referrals,
                },
                AuthMode::Ldap | AuthMode::Ldaps,
            ) => {
                let settings = LdapSettings {
                    host1: Some(host1.clone()),
                    host2: host2.clone(),
                    host3: host3.clone(),
                    port: Some(port.clone()),
                    user_type: user_type.map(|t| t.label().to_string()),
                    domain_prefix: domain_prefix.clone(),
                    user_suffix: user_suffix.clone(),
                    get_roles: Some(*get_roles),
                    get_groups: Some(*get_groups),
                    follow_referrals: Some(*follow_referrals),
                    base_dn: Some(base_dn.clone()),
                    bind_dn: Some(bind_dn.clone()),
                    bind_password: Some(bind_password.clone()),
                };
                Ok(if mode == AuthMode::Ldap {
                    AuthSettings::Ldap(settings)
                } else {
                    AuthSettings::Ldaps(settings)
                })
            }
            (
                ProviderConfig::Amazon {
                    access_key,
                    secret_key,
                    get_groups,
                },
                AuthMode::Amazon,
            ) => Ok(AuthSettings::Amazon(AmazonSettings {
                access_key: Some(access_key.clone()),
                secret_key: Some(secret_key.clone()),
                get_groups: Some(*get_groups),
            })),
            (provider, mode) => Err(E2eError::Config(format!(
                "{} provider cannot configure {} authentication",
                provider.kind(),
                mode
            ))),
        }
    }

    fn as_fill_external_value(&self) -> ExternalSettings {
        let get_groups = match self {
            ProviderConfig::Ldap { get_groups, .. } | ProviderConfig::Amazon { get_groups, .. } => {
                *get_groups
            }
        };
        ExternalSettings {
            enable_sso: None,
            enable_saml: None,
            get_groups: Some(get_groups),
        }
    }
}

impl ProviderConfig {
    fn kind(&self) -> &'static str {
        match self {
            ProviderConfig::Ldap { .. } => "ldap",
            ProviderConfig::Amazon { .. } => "amazon",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ldap_provider() -> ProviderConfig {
        serde_yaml::from_str(
            r#"
type: ldap
host1: ldap.example.com
port: "389"
base_dn: dc=example,dc=com
bind_dn: cn=admin,dc=example,dc=com
bind_password: secret
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(AuthMode::from_label("External (httpd)").unwrap(), AuthMode::External);
        assert_eq!("LDAPS".parse::<AuthMode>().unwrap(), AuthMode::Ldaps);
        assert_eq!("Database".parse::<AuthMode>().unwrap(), AuthMode::Database);
        assert!(AuthMode::from_label("Kerberos").is_err());
    }

    #[test]
    fn test_ldaps_is_field_identical_to_ldap() {
        assert_eq!(variant_widgets(AuthMode::Ldap), variant_widgets(AuthMode::Ldaps));
        assert!(variant_widgets(AuthMode::Database).is_empty());
        assert_eq!(variant_widgets(AuthMode::Amazon).len(), 3);
        assert_eq!(variant_widgets(AuthMode::External).len(), 3);
    }

    #[test]
    fn test_from_values_scopes_fields_to_variant() {
        let mut values = FieldMap::new();
        values.insert("access_key".into(), "AKIA".into());
        assert!(AuthSettings::from_values(AuthMode::Amazon, values.clone()).is_ok());
        assert!(matches!(
            AuthSettings::from_values(AuthMode::Ldap, values.clone()),
            Err(E2eError::Config(_))
        ));
        assert!(AuthSettings::from_values(AuthMode::Database, values).is_err());
    }

    #[test]
    fn test_provider_fill_values() {
        let provider = ldap_provider();
        let settings = provider
            .as_fill_value(AuthMode::Ldaps, Some(UserType::Upn))
            .unwrap();
        match settings {
            AuthSettings::Ldaps(ldap) => {
                assert_eq!(ldap.host1.as_deref(), Some("ldap.example.com"));
                assert_eq!(ldap.user_type.as_deref(), Some("User Principal Name"));
                assert_eq!(ldap.get_groups, Some(true));
            }
            other => panic!("unexpected settings: {:?}", other),
        }
        assert!(provider.as_fill_value(AuthMode::Amazon, None).is_err());
        assert_eq!(provider.as_fill_external_value().get_groups, Some(true));
    }

    #[test]
    fn test_settings_serde_shape() {
        let yaml = r#"
auth_mode: amazon
auth_settings:
  access_key: AKIA
  get_groups: false
"#;
        let settings: AuthSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.mode(), AuthMode::Amazon);
        assert_eq!(settings.values().unwrap().len(), 2);
    }
}
