//! Scenario runner driving the settings page objects against one appliance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

use appliance_common::FieldMap;

use crate::appliance::Appliance;
use crate::auth::{AuthProvider, ProviderConfig};
use crate::authentication::{AuthenticationSetting, ConfigureOptions};
use crate::downloads;
use crate::error::{E2eError, E2eResult};
use crate::forms::{
    BasicInformation, CustomSupportUrl, FormName, Logging, NtpServers, SmtpServer, SubForm,
    VmwareConsole, WebServices,
};
use crate::protocol::SaveAction;
use crate::roles::ServerRoles;
use crate::server::ServerInformation;
use crate::spec::{RoleSource, Scenario, Step};

/// Result of executing a scenario step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    /// What the step did, e.g. the save action taken
    pub outcome: Option<String>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub skipped: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub appliance_version: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Page objects of one scenario; remembered values do not leak between
/// scenarios
struct ScenarioContext {
    server: ServerInformation,
    authentication: AuthenticationSetting,
}

/// Runs scenarios sequentially against one appliance
pub struct ScenarioRunner {
    appliance: Appliance,
    providers: BTreeMap<String, ProviderConfig>,
    output_dir: PathBuf,
}

impl ScenarioRunner {
    pub fn new(
        appliance: Appliance,
        providers: BTreeMap<String, ProviderConfig>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            appliance,
            providers,
            output_dir: output_dir.into(),
        }
    }

    /// Run all scenarios in a directory
    pub async fn run_dir(&self, dir: &Path) -> E2eResult<SuiteResult> {
        let scenarios = Scenario::load_all(dir)?;
        Ok(self.run_scenarios(&scenarios).await)
    }

    /// Run a list of scenarios
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();
        let (mut passed, mut failed, mut skipped) = (0, 0, 0);

        info!(
            "Running {} scenario(s) against {} {}...",
            scenarios.len(),
            self.appliance.product_name,
            self.appliance.version
        );

        for scenario in scenarios {
            let result = self.run_scenario(scenario).await;
            if result.skipped {
                skipped += 1;
                info!("- {} (skipped)", result.name);
            } else if result.success {
                passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                failed += 1;
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Scenario results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        SuiteResult {
            started_at,
            appliance_version: self.appliance.version.to_string(),
            total: scenarios.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    /// Run a single scenario, stopping at the first failed step
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        if !scenario.applies_to(&self.appliance.version) {
            debug!(
                "{} needs {:?}, appliance is {}",
                scenario.name, scenario.min_version, self.appliance.version
            );
            return ScenarioResult {
                name: scenario.name.clone(),
                success: true,
                skipped: true,
                duration_ms: 0,
                steps: Vec::new(),
                error: None,
            };
        }

        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let mut context = ScenarioContext {
            server: ServerInformation::new(self.appliance.clone()),
            authentication: AuthenticationSetting::new(self.appliance.clone()),
        };
        let mut steps = Vec::new();
        let mut scenario_error = None;

        for step in &scenario.steps {
            let step_start = Instant::now();
            let step_name = step.name();
            debug!("Executing step: {}", step_name);

            let result = self.execute_step(&mut context, step).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;
            match result {
                Ok(outcome) => steps.push(StepResult {
                    success: true,
                    step_name,
                    duration_ms,
                    error: None,
                    outcome,
                }),
                Err(e) => {
                    let failure = E2eError::StepFailed {
                        step: step_name.clone(),
                        reason: e.to_string(),
                    };
                    scenario_error = Some(failure.to_string());
                    steps.push(StepResult {
                        success: false,
                        step_name,
                        duration_ms,
                        error: Some(e.to_string()),
                        outcome: None,
                    });
                    break;
                }
            }
        }

        ScenarioResult {
            name: scenario.name.clone(),
            success: scenario_error.is_none(),
            skipped: false,
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            error: scenario_error,
        }
    }

    async fn execute_step(
        &self,
        context: &mut ScenarioContext,
        step: &Step,
    ) -> E2eResult<Option<String>> {
        let server = &mut context.server;
        match step {
            Step::UpdateForm {
                form,
                values,
                reset,
                expect,
            } => {
                let action = update_form(server, *form, values.clone(), *reset).await?;
                check_expected(*expect, action)?;
                Ok(Some(format!("{:?}", action)))
            }
            Step::AssertValues { form, expected } => {
                let actual = form_values(server, *form).await?;
                compare(&format!("{:?}", form), expected, &actual)?;
                Ok(None)
            }
            Step::UpdateServerRoles {
                roles,
                source,
                reset,
            } => match source {
                RoleSource::Ui => {
                    let action = server.update_server_roles_ui(roles, *reset).await?;
                    Ok(Some(format!("{:?}", action)))
                }
                RoleSource::Db if *reset => Err(E2eError::Config(
                    "reset only applies to server roles updated through the UI".to_string(),
                )),
                RoleSource::Db => {
                    let change = server.update_server_roles_db(roles).await?;
                    Ok(Some(format!("{:?}", change)))
                }
            },
            Step::EnableServerRoles { roles } => {
                let change = server.enable_server_roles(roles).await?;
                Ok(Some(format!("{:?}", change)))
            }
            Step::DisableServerRoles { roles } => {
                let change = server.disable_server_roles(roles).await?;
                Ok(Some(format!("{:?}", change)))
            }
            Step::AssertServerRoles { expected, source } => {
                let actual = match source {
                    RoleSource::Db => server.server_roles_db().await?,
                    RoleSource::Ui => server.server_roles_ui().await?,
                };
                compare_roles(expected, &actual)?;
                Ok(None)
            }
            Step::SendTestEmail { email } => {
                server.send_test_email(email.as_deref()).await?;
                Ok(None)
            }
            Step::ConfigureAuth {
                mode,
                provider,
                user_type,
                reset,
                validate,
                expect,
            } => {
                let provider = match provider {
                    Some(name) => Some(self.provider(name)?),
                    None => None,
                };
                let options = ConfigureOptions {
                    user_type: *user_type,
                    reset: *reset,
                    validate: *validate,
                };
                let action = context
                    .authentication
                    .configure(*mode, provider, options)
                    .await?;
                check_expected(*expect, action)?;
                Ok(Some(format!("{:?}", action)))
            }
            Step::SetAuthMode { mode } => {
                let action = context.authentication.set_auth_mode(*mode).await?;
                Ok(Some(format!("{:?}", action)))
            }
            Step::AssertAuthMode { expected } => {
                let actual = context.authentication.auth_mode().await?;
                if actual != *expected {
                    return Err(E2eError::Verification(format!(
                        "authentication mode is {}, expected {}",
                        actual, expected
                    )));
                }
                Ok(None)
            }
            Step::SetSessionTimeout { hours, minutes } => {
                let action = context
                    .authentication
                    .set_session_timeout(hours.as_deref(), minutes.as_deref())
                    .await?;
                Ok(Some(format!("{:?}", action)))
            }
            Step::DownloadList { collection, format } => {
                if !format.is_available(&self.appliance.version) {
                    debug!("{} export not offered on {}", format.label(), self.appliance.version);
                    return Ok(Some("not offered".to_string()));
                }
                downloads::download_list(&self.appliance, *collection, *format).await?;
                Ok(None)
            }
            Step::DownloadSummary { collection } => {
                let name = downloads::download_first_summary(&self.appliance, *collection).await?;
                Ok(name)
            }
            Step::Log { message } => {
                info!("[SCENARIO LOG] {}", message);
                Ok(None)
            }
        }
    }

    fn provider(&self, name: &str) -> E2eResult<&dyn AuthProvider> {
        self.providers
            .get(name)
            .map(|p| p as &dyn AuthProvider)
            .ok_or_else(|| E2eError::Config(format!("no auth provider named {}", name)))
    }

    /// Write suite results to JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

async fn update_form(
    server: &mut ServerInformation,
    form: FormName,
    values: FieldMap,
    reset: bool,
) -> E2eResult<SaveAction> {
    match form {
        FormName::BasicInformation => {
            let updates = BasicInformation::from_values(values)?;
            server.update_basic_information(&updates, reset).await
        }
        FormName::VmwareConsole => {
            let updates = VmwareConsole::from_values(values)?;
            server.update_vmware_console(&updates, reset).await
        }
        FormName::NtpServers => {
            let updates = NtpServers::from_values(values)?;
            server.update_ntp_servers(&updates, reset).await
        }
        FormName::SmtpServer => {
            let updates = SmtpServer::from_values(values)?;
            server.update_smtp_server(&updates, reset).await
        }
        FormName::WebServices => {
            let updates = WebServices::from_values(values)?;
            server.update_web_services(&updates, reset).await
        }
        FormName::Logging => {
            let updates = Logging::from_values(values)?;
            server.update_logging_form(&updates, reset).await
        }
        FormName::CustomSupportUrl => {
            let updates = CustomSupportUrl::from_values(values)?;
            server.update_custom_support_url(&updates, reset).await
        }
    }
}

async fn form_values(server: &ServerInformation, form: FormName) -> E2eResult<FieldMap> {
    match form {
        FormName::BasicInformation => server.basic_information_values().await?.values(),
        FormName::VmwareConsole => server.vmware_console_values().await?.values(),
        FormName::NtpServers => server.ntp_servers_values().await?.values(),
        FormName::SmtpServer => server.smtp_server_values().await?.values(),
        FormName::WebServices => server.web_services_values().await?.values(),
        FormName::Logging => server.logging_values().await?.values(),
        FormName::CustomSupportUrl => server.custom_support_url_values().await?.values(),
    }
}

fn check_expected(expected: Option<SaveAction>, actual: SaveAction) -> E2eResult<()> {
    match expected {
        Some(expected) if expected != actual => Err(E2eError::Verification(format!(
            "expected {:?}, form ended in {:?}",
            expected, actual
        ))),
        _ => Ok(()),
    }
}

fn compare(what: &str, expected: &FieldMap, actual: &FieldMap) -> E2eResult<()> {
    let mismatches: Vec<String> = expected
        .iter()
        .filter(|(name, value)| actual.get(*name) != Some(*value))
        .map(|(name, value)| {
            let shown = actual
                .get(name)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "<unset>".to_string());
            format!("{}: expected {:?}, got {:?}", name, value.to_string(), shown)
        })
        .collect();
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(E2eError::Verification(format!(
            "{} mismatch: {}",
            what,
            mismatches.join("; ")
        )))
    }
}

fn compare_roles(expected: &ServerRoles, actual: &ServerRoles) -> E2eResult<()> {
    let mismatches: Vec<String> = expected
        .iter()
        .filter(|(role, enabled)| actual.get(*role) != Some(*enabled))
        .map(|(role, enabled)| format!("{} expected {}", role, if *enabled { "on" } else { "off" }))
        .collect();
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(E2eError::Verification(format!(
            "server roles mismatch: {}",
            mismatches.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appliance_common::FieldValue;

    #[test]
    fn test_compare_ignores_unlisted_fields() {
        let mut expected = FieldMap::new();
        expected.insert("host".into(), FieldValue::from("smtp.example.com"));
        let mut actual = expected.clone();
        actual.insert("port".into(), FieldValue::from("25"));
        assert!(compare("smtp", &expected, &actual).is_ok());

        actual.insert("host".into(), FieldValue::from("other"));
        let err = compare("smtp", &expected, &actual).unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_check_expected() {
        assert!(check_expected(None, SaveAction::Unchanged).is_ok());
        assert!(check_expected(Some(SaveAction::Committed), SaveAction::Committed).is_ok());
        assert!(check_expected(Some(SaveAction::Committed), SaveAction::Unchanged).is_err());
    }
}
