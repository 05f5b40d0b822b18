//! Server tab of the server settings.
//!
//! Every sub-form gets an `update_*` operation (stage the given values, then
//! commit or revert through [`save_action`]) and a `*_values` read. Server
//! roles additionally go through the authoritative backing store.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::appliance::Appliance;
use crate::browser::{Click, Destination, NavigateOptions, Target};
use crate::error::{E2eError, E2eResult};
use crate::forms::{
    fill_form, fill_widgets, read_form, read_widgets, BasicInformation, CustomSupportUrl, Logging,
    NtpServers, SmtpServer, SubForm, VmwareConsole, WebServices,
};
use crate::gate::{self, Gated};
use crate::protocol::{save_action, SaveAction, Staged};
use crate::roles::{self, RoleChange, ServerRole, ServerRoles};
use crate::views::ServerView;

/// Console types offered by the VMware console panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsoleType {
    Vnc,
    VmrcPlugin,
    WebMks,
}

impl ConsoleType {
    pub const ALL: [ConsoleType; 3] = [ConsoleType::Vnc, ConsoleType::VmrcPlugin, ConsoleType::WebMks];

    pub fn label(&self) -> &'static str {
        match self {
            ConsoleType::Vnc => "VNC",
            ConsoleType::VmrcPlugin => "VMware VMRC Plugin",
            ConsoleType::WebMks => "VMware WebMKS",
        }
    }

    pub fn from_label(label: &str) -> E2eResult<Self> {
        ConsoleType::ALL
            .iter()
            .copied()
            .find(|c| c.label() == label)
            .ok_or_else(|| E2eError::ConsoleTypeNotSupported(label.to_string()))
    }
}

/// Values last applied through this façade, all unset until an update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedSettings {
    pub basic_information: BasicInformation,
    pub server_roles: ServerRoles,
    pub vmware_console: VmwareConsole,
    pub ntp_servers: NtpServers,
    pub smtp_server: SmtpServer,
    pub web_services: WebServices,
    pub logging: Logging,
    pub custom_support_url: CustomSupportUrl,
}

/// Server tab of the appliance server settings
pub struct ServerInformation {
    appliance: Appliance,
    applied: AppliedSettings,
}

impl ServerInformation {
    pub fn new(appliance: Appliance) -> Self {
        Self {
            appliance,
            applied: AppliedSettings::default(),
        }
    }

    pub fn applied(&self) -> &AppliedSettings {
        &self.applied
    }

    async fn navigate(&self, options: NavigateOptions) -> E2eResult<()> {
        self.appliance
            .navigate_to(&Target::Server, Destination::Server, options)
            .await
    }

    async fn update_form<F: SubForm>(&self, updates: &F, reset: bool) -> E2eResult<SaveAction> {
        self.navigate(NavigateOptions::default()).await?;
        let browser = self.appliance.browser.as_ref();
        let staged = fill_form(browser, updates).await?;
        debug!("{} staged: {:?}", F::PANEL, staged);
        save_action(browser, &ServerView::buttons(), staged, reset).await
    }

    async fn form_values<F: SubForm>(&self) -> E2eResult<F> {
        self.navigate(NavigateOptions::default()).await?;
        read_form(self.appliance.browser.as_ref()).await
    }

    // ============================= Basic Information =============================

    pub async fn update_basic_information(
        &mut self,
        updates: &BasicInformation,
        reset: bool,
    ) -> E2eResult<SaveAction> {
        let action = self.update_form(updates, reset).await?;
        if !reset {
            self.applied.basic_information.merge(updates)?;
        }
        Ok(action)
    }

    pub async fn basic_information_values(&self) -> E2eResult<BasicInformation> {
        self.form_values().await
    }

    // ================================ Server Roles ===============================

    /// Flip role switches on the server tab. Roles the running version does
    /// not offer are dropped before anything else happens.
    pub async fn update_server_roles_ui(
        &mut self,
        updates: &ServerRoles,
        reset: bool,
    ) -> E2eResult<SaveAction> {
        let mut updates = updates.clone();
        gate::strip_unsupported_roles(&mut updates, &self.appliance.version);

        let mut values = appliance_common::FieldMap::new();
        for (role, enabled) in &updates {
            values.insert(role.as_str().to_string(), (*enabled).into());
        }
        let widgets: Vec<_> = updates.keys().map(|r| r.widget()).collect();

        self.navigate(NavigateOptions::default()).await?;
        let browser = self.appliance.browser.as_ref();
        let staged = fill_widgets(browser, "Server Roles", &widgets, &values).await?;
        let action = save_action(browser, &ServerView::buttons(), staged, reset).await?;
        if !reset {
            self.applied.server_roles.extend(updates);
        }
        Ok(action)
    }

    /// Role switches as rendered on the server tab
    pub async fn server_roles_ui(&self) -> E2eResult<ServerRoles> {
        let supported = gate::supported_roles(&self.appliance.version);
        let widgets: Vec<_> = supported.iter().map(|r| r.widget()).collect();

        self.navigate(NavigateOptions::default()).await?;
        let values = read_widgets(self.appliance.browser.as_ref(), &widgets).await?;

        let mut roles = ServerRoles::new();
        for role in supported {
            let enabled = values
                .get(role.as_str())
                .and_then(|v| v.as_bool())
                .ok_or_else(|| E2eError::Verification(format!("{} switch has no state", role)))?;
            roles.insert(role, enabled);
        }
        Ok(roles)
    }

    /// Roles from the backing store
    pub async fn server_roles_db(&self) -> E2eResult<ServerRoles> {
        self.appliance.roles.server_roles().await
    }

    pub async fn update_server_roles_db(&self, roles: &ServerRoles) -> E2eResult<RoleChange> {
        roles::update_server_roles_db(self.appliance.roles.as_ref(), roles).await
    }

    pub async fn enable_server_roles(&self, roles: &[ServerRole]) -> E2eResult<RoleChange> {
        roles::change_server_roles_state(self.appliance.roles.as_ref(), true, roles).await
    }

    pub async fn disable_server_roles(&self, roles: &[ServerRole]) -> E2eResult<RoleChange> {
        roles::change_server_roles_state(self.appliance.roles.as_ref(), false, roles).await
    }

    // =============================== VMware Console ==============================

    pub async fn update_vmware_console(
        &mut self,
        updates: &VmwareConsole,
        reset: bool,
    ) -> E2eResult<SaveAction> {
        if let Some(label) = &updates.console_type {
            let console_type = ConsoleType::from_label(label)?;
            if !gate::is_supported(Gated::VmwareConsole, &self.appliance.version) {
                return Err(E2eError::ConsoleNotSupported {
                    product: self.appliance.product_name.clone(),
                    version: self.appliance.version.clone(),
                });
            }
            if console_type == ConsoleType::WebMks {
                self.install_webmks_sdk().await?;
            }
        }

        self.navigate(NavigateOptions::default()).await?;
        let browser = self.appliance.browser.as_ref();
        browser.refresh().await?;
        let staged = fill_form(browser, updates).await?;
        let action = save_action(browser, &ServerView::buttons(), staged, reset).await?;
        if !reset {
            self.applied.vmware_console.merge(updates)?;
        }
        Ok(action)
    }

    /// WebMKS needs its SDK unpacked on the appliance
    async fn install_webmks_sdk(&self) -> E2eResult<()> {
        let console = &self.appliance.console;
        let commands = [
            format!("curl {} -o WebMKS_SDK.zip", console.webmks_sdk_download_url),
            format!(
                "unzip -o ~/WebMKS_SDK.zip -d {}",
                console.webmks_sdk_extract_location
            ),
        ];
        for command in &commands {
            let output = self.appliance.shell.run_command(command).await?;
            if !output.success() {
                return Err(E2eError::Shell(format!(
                    "{} exited with {}: {}",
                    command, output.status, output.stderr
                )));
            }
        }
        info!("WebMKS SDK installed to {}", console.webmks_sdk_extract_location);
        Ok(())
    }

    pub async fn vmware_console_values(&self) -> E2eResult<VmwareConsole> {
        self.form_values().await
    }

    // ================================ NTP Servers ================================

    pub async fn update_ntp_servers(
        &mut self,
        updates: &NtpServers,
        reset: bool,
    ) -> E2eResult<SaveAction> {
        let action = self.update_form(updates, reset).await?;
        if !reset {
            self.applied.ntp_servers.merge(updates)?;
        }
        Ok(action)
    }

    pub async fn ntp_servers_values(&self) -> E2eResult<NtpServers> {
        self.form_values().await
    }

    pub fn ntp_servers_fields_keys(&self) -> Vec<String> {
        NtpServers::field_names()
    }

    // ================================ SMTP Server ================================

    pub async fn update_smtp_server(
        &mut self,
        updates: &SmtpServer,
        reset: bool,
    ) -> E2eResult<SaveAction> {
        self.navigate(NavigateOptions::default()).await?;
        let browser = self.appliance.browser.as_ref();
        let mut staged = fill_form(browser, updates).await?;
        if staged == Staged::Unavailable {
            // the SMTP panel sometimes renders stale; one fresh navigation fixes it
            warn!("SMTP form not ready, navigating again with resetter");
            self.navigate(NavigateOptions::reset()).await?;
            staged = fill_form(browser, updates).await?;
        }

        let verify = ServerView::smtp_verify();
        if browser.is_active(&verify).await?
            && browser.click(&verify).await? == Click::Unavailable
        {
            debug!("SMTP verify button went away before it could be clicked");
        }

        let action = save_action(browser, &ServerView::buttons(), staged, reset).await?;
        if !reset {
            self.applied.smtp_server.merge(updates)?;
        }
        Ok(action)
    }

    /// Send a test e-mail, defaulting to the last applied destination
    pub async fn send_test_email(&self, email: Option<&str>) -> E2eResult<()> {
        let email = email
            .map(str::to_string)
            .or_else(|| self.applied.smtp_server.to_email.clone())
            .ok_or_else(|| E2eError::Config("no destination for the test e-mail".to_string()))?;

        self.navigate(NavigateOptions::default()).await?;
        let browser = self.appliance.browser.as_ref();
        let form = SmtpServer {
            to_email: Some(email),
            ..Default::default()
        };
        if fill_form(browser, &form).await? == Staged::Unavailable {
            return Err(E2eError::WidgetNotFound("SMTP test e-mail field".to_string()));
        }
        match browser.click(&ServerView::smtp_verify()).await? {
            Click::Clicked => Ok(()),
            Click::Unavailable => Err(E2eError::WidgetNotFound("SMTP verify button".to_string())),
        }
    }

    pub async fn smtp_server_values(&self) -> E2eResult<SmtpServer> {
        self.form_values().await
    }

    // ================================ Web Services ===============================

    pub async fn update_web_services(
        &mut self,
        updates: &WebServices,
        reset: bool,
    ) -> E2eResult<SaveAction> {
        let action = self.update_form(updates, reset).await?;
        if !reset {
            self.applied.web_services.merge(updates)?;
        }
        Ok(action)
    }

    pub async fn web_services_values(&self) -> E2eResult<WebServices> {
        self.form_values().await
    }

    // ================================== Logging ==================================

    pub async fn update_logging_form(
        &mut self,
        updates: &Logging,
        reset: bool,
    ) -> E2eResult<SaveAction> {
        let action = self.update_form(updates, reset).await?;
        if !reset {
            self.applied.logging.merge(updates)?;
        }
        Ok(action)
    }

    pub async fn logging_values(&self) -> E2eResult<Logging> {
        self.form_values().await
    }

    // ============================= Custom Support URL ============================

    pub async fn update_custom_support_url(
        &mut self,
        updates: &CustomSupportUrl,
        reset: bool,
    ) -> E2eResult<SaveAction> {
        let action = self.update_form(updates, reset).await?;
        if !reset {
            self.applied.custom_support_url.merge(updates)?;
        }
        Ok(action)
    }

    pub async fn custom_support_url_values(&self) -> E2eResult<CustomSupportUrl> {
        self.form_values().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_type_labels() {
        assert_eq!(ConsoleType::from_label("VMware WebMKS").unwrap(), ConsoleType::WebMks);
        assert!(matches!(
            ConsoleType::from_label("Spice"),
            Err(E2eError::ConsoleTypeNotSupported(_))
        ));
    }
}
