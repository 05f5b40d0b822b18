//! The appliance under test and its collaborators

use std::sync::Arc;

use appliance_common::{ServerIdentity, Version};

use crate::browser::{
    Browser, Destination, Inventory, NavigateOptions, Navigator, RemoteShell, RoleStore, Target,
};
use crate::config::ConsoleConfig;
use crate::error::E2eResult;

/// Handle on one appliance: its identity plus the collaborators used to
/// drive it. Cheap to clone.
#[derive(Clone)]
pub struct Appliance {
    pub version: Version,
    pub product_name: String,
    pub server: ServerIdentity,
    pub console: ConsoleConfig,
    pub browser: Arc<dyn Browser>,
    pub navigator: Arc<dyn Navigator>,
    pub roles: Arc<dyn RoleStore>,
    pub shell: Arc<dyn RemoteShell>,
    pub inventory: Arc<dyn Inventory>,
}

impl Appliance {
    pub async fn navigate_to(
        &self,
        target: &Target,
        destination: Destination,
        options: NavigateOptions,
    ) -> E2eResult<()> {
        self.navigator.navigate_to(target, destination, options).await
    }

    /// Flash text shown after the settings of this server are saved
    pub fn settings_saved_message(&self, section: &str) -> String {
        settings_saved_message(section, &self.product_name, &self.server)
    }
}

/// Flash text shown after a settings section of `server` is saved
pub fn settings_saved_message(section: &str, product_name: &str, server: &ServerIdentity) -> String {
    format!(
        "{} settings saved for {} Server \"{} [{}]\" in Zone \"{}\"",
        section, product_name, server.name, server.sid, server.zone
    )
}

impl std::fmt::Debug for Appliance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Appliance")
            .field("version", &self.version)
            .field("product_name", &self.product_name)
            .field("server", &self.server)
            .finish()
    }
}
