//! Declarative YAML scenarios driving the settings page objects

use serde::{Deserialize, Serialize};
use std::path::Path;

use appliance_common::{FieldMap, Version};

use crate::auth::{AuthMode, UserType};
use crate::downloads::{ExportFormat, NetworkCollection};
use crate::error::{E2eError, E2eResult};
use crate::forms::FormName;
use crate::protocol::SaveAction;
use crate::roles::{ServerRole, ServerRoles};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Oldest appliance version the scenario applies to
    #[serde(default)]
    pub min_version: Option<Version>,

    /// Steps to execute in order
    pub steps: Vec<Step>,
}

/// Where server roles are read from or written to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    /// The backing settings store
    #[default]
    Db,
    /// The switches on the server tab
    Ui,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Stage values into a server tab sub-form, then save or reset
    UpdateForm {
        form: FormName,
        values: FieldMap,
        #[serde(default)]
        reset: bool,
        /// Action the update must end in
        #[serde(default)]
        expect: Option<SaveAction>,
    },

    /// Compare a sub-form's rendered values; unlisted fields are ignored
    AssertValues { form: FormName, expected: FieldMap },

    UpdateServerRoles {
        roles: ServerRoles,
        #[serde(default)]
        source: RoleSource,
        #[serde(default)]
        reset: bool,
    },

    EnableServerRoles { roles: Vec<ServerRole> },

    DisableServerRoles { roles: Vec<ServerRole> },

    /// Compare role states; unlisted roles are ignored
    AssertServerRoles {
        expected: ServerRoles,
        #[serde(default)]
        source: RoleSource,
    },

    SendTestEmail {
        #[serde(default)]
        email: Option<String>,
    },

    /// Configure authentication with a provider from the harness config
    ConfigureAuth {
        #[serde(default)]
        mode: Option<AuthMode>,
        #[serde(default)]
        provider: Option<String>,
        #[serde(default)]
        user_type: Option<UserType>,
        #[serde(default)]
        reset: bool,
        #[serde(default = "default_validate")]
        validate: bool,
        #[serde(default)]
        expect: Option<SaveAction>,
    },

    SetAuthMode { mode: AuthMode },

    AssertAuthMode { expected: AuthMode },

    SetSessionTimeout {
        #[serde(default)]
        hours: Option<String>,
        #[serde(default)]
        minutes: Option<String>,
    },

    DownloadList {
        collection: NetworkCollection,
        format: ExportFormat,
    },

    /// Download the summary of the first entity of a collection
    DownloadSummary { collection: NetworkCollection },

    /// Log a message (for debugging)
    Log { message: String },
}

fn default_validate() -> bool {
    true
}

impl Step {
    /// Short name used in results and logs
    pub fn name(&self) -> String {
        match self {
            Step::UpdateForm { form, .. } => format!("update_form:{}", snake(form)),
            Step::AssertValues { form, .. } => format!("assert_values:{}", snake(form)),
            Step::UpdateServerRoles { source, .. } => {
                format!("update_server_roles:{}", snake(source))
            }
            Step::EnableServerRoles { roles } => format!("enable_server_roles:{}", join(roles)),
            Step::DisableServerRoles { roles } => format!("disable_server_roles:{}", join(roles)),
            Step::AssertServerRoles { source, .. } => {
                format!("assert_server_roles:{}", snake(source))
            }
            Step::SendTestEmail { .. } => "send_test_email".to_string(),
            Step::ConfigureAuth { mode, .. } => format!(
                "configure_auth:{}",
                mode.unwrap_or(AuthMode::Database).as_str()
            ),
            Step::SetAuthMode { mode } => format!("set_auth_mode:{}", mode.as_str()),
            Step::AssertAuthMode { expected } => format!("assert_auth_mode:{}", expected.as_str()),
            Step::SetSessionTimeout { .. } => "set_session_timeout".to_string(),
            Step::DownloadList { collection, format } => {
                format!("download_list:{}:{}", collection, snake(format))
            }
            Step::DownloadSummary { collection } => format!("download_summary:{}", collection),
            Step::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }
}

/// serde name of a unit enum value
fn snake<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "?".to_string(),
    }
}

fn join(roles: &[ServerRole]) -> String {
    roles
        .iter()
        .map(ServerRole::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

impl Scenario {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, sorted by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        Ok(scenarios)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Whether the scenario applies to `version`
    pub fn applies_to(&self, version: &Version) -> bool {
        self.min_version.as_ref().map_or(true, |min| version >= min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appliance_common::FieldValue;

    #[test]
    fn test_parse_scenario() {
        let yaml = r#"
name: smtp-roundtrip
description: Update SMTP settings and read them back
tags:
  - smtp
  - smoke
steps:
  - action: update_form
    form: smtp_server
    values:
      host: smtp.example.com
      port: 25
      start_tls: true
  - action: assert_values
    form: smtp_server
    expected:
      port: "25"
  - action: enable_server_roles
    roles: [automate, notifier]
  - action: log
    message: done
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.name, "smtp-roundtrip");
        assert_eq!(scenario.steps.len(), 4);
        assert!(scenario.applies_to(&Version::new(&[5, 7])));

        match &scenario.steps[0] {
            Step::UpdateForm { form, values, reset, expect } => {
                assert_eq!(*form, FormName::SmtpServer);
                assert_eq!(values["port"], FieldValue::from("25"));
                assert_eq!(values["start_tls"], FieldValue::from(true));
                assert!(!reset);
                assert!(expect.is_none());
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(scenario.steps[2].name(), "enable_server_roles:automate,notifier");
    }

    #[test]
    fn test_parse_auth_steps() {
        let yaml = r#"
name: ldap
min_version: "5.9"
steps:
  - action: configure_auth
    mode: ldaps
    provider: corp
    user_type: upn
    expect: committed
  - action: assert_auth_mode
    expected: ldaps
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert!(!scenario.applies_to(&Version::new(&[5, 8, 1])));
        assert!(scenario.applies_to(&Version::Latest));
        match &scenario.steps[0] {
            Step::ConfigureAuth {
                mode,
                validate,
                expect,
                ..
            } => {
                assert_eq!(*mode, Some(AuthMode::Ldaps));
                assert!(*validate);
                assert_eq!(*expect, Some(SaveAction::Committed));
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(scenario.steps[0].name(), "configure_auth:ldaps");
    }

    #[test]
    fn test_min_version_must_be_quoted() {
        let scenario = Scenario::from_yaml("name: x\nmin_version: \"5.10\"\nsteps: []").unwrap();
        assert_eq!(scenario.min_version, Some(Version::new(&[5, 10])));
        assert!(!scenario.applies_to(&Version::new(&[5, 9, 3])));

        let err = Scenario::from_yaml("name: x\nmin_version: 5.10\nsteps: []").unwrap_err();
        assert!(err.to_string().contains("must be quoted"), "{}", err);
    }

    #[test]
    fn test_filter_by_tag() {
        let tagged = Scenario::from_yaml("name: a\ntags: [smtp]\nsteps: []").unwrap();
        let untagged = Scenario::from_yaml("name: b\nsteps: []").unwrap();
        let scenarios = vec![tagged, untagged];

        let selected = Scenario::filter_by_tag(&scenarios, "smtp");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "a");
    }

    #[test]
    fn test_unknown_action_rejected() {
        let yaml = r#"
name: bad
steps:
  - action: screenshot
    name: x
"#;
        assert!(Scenario::from_yaml(yaml).is_err());
    }
}
