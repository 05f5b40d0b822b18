//! Server roles: the fixed set of capability toggles, their switches on the
//! server tab, and the mutator that flips them through the backing store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::browser::RoleStore;
use crate::error::{E2eError, E2eResult};
use crate::widget::{Locator, Widget};

/// A named capability of the appliance server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerRole {
    EmbeddedAnsible,
    EmsMetricsCoordinator,
    EmsOperations,
    EmsMetricsCollector,
    Reporting,
    EmsMetricsProcessor,
    Scheduler,
    Smartproxy,
    DatabaseOperations,
    Smartstate,
    Event,
    UserInterface,
    WebServices,
    EmsInventory,
    Notifier,
    Automate,
    RhnMirror,
    DatabaseSynchronizationRole,
    GitOwner,
    Websocket,
    StorageMetricsProcessor,
    StorageMetricsCollector,
    StorageMetricsCoordinator,
    StorageInventory,
    VmdbStorageBridge,
    CockpitWs,
}

impl ServerRole {
    pub const ALL: [ServerRole; 26] = [
        ServerRole::EmbeddedAnsible,
        ServerRole::EmsMetricsCoordinator,
        ServerRole::EmsOperations,
        ServerRole::EmsMetricsCollector,
        ServerRole::Reporting,
        ServerRole::EmsMetricsProcessor,
        ServerRole::Scheduler,
        ServerRole::Smartproxy,
        ServerRole::DatabaseOperations,
        ServerRole::Smartstate,
        ServerRole::Event,
        ServerRole::UserInterface,
        ServerRole::WebServices,
        ServerRole::EmsInventory,
        ServerRole::Notifier,
        ServerRole::Automate,
        ServerRole::RhnMirror,
        ServerRole::DatabaseSynchronizationRole,
        ServerRole::GitOwner,
        ServerRole::Websocket,
        ServerRole::StorageMetricsProcessor,
        ServerRole::StorageMetricsCollector,
        ServerRole::StorageMetricsCoordinator,
        ServerRole::StorageInventory,
        ServerRole::VmdbStorageBridge,
        ServerRole::CockpitWs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerRole::EmbeddedAnsible => "embedded_ansible",
            ServerRole::EmsMetricsCoordinator => "ems_metrics_coordinator",
            ServerRole::EmsOperations => "ems_operations",
            ServerRole::EmsMetricsCollector => "ems_metrics_collector",
            ServerRole::Reporting => "reporting",
            ServerRole::EmsMetricsProcessor => "ems_metrics_processor",
            ServerRole::Scheduler => "scheduler",
            ServerRole::Smartproxy => "smartproxy",
            ServerRole::DatabaseOperations => "database_operations",
            ServerRole::Smartstate => "smartstate",
            ServerRole::Event => "event",
            ServerRole::UserInterface => "user_interface",
            ServerRole::WebServices => "web_services",
            ServerRole::EmsInventory => "ems_inventory",
            ServerRole::Notifier => "notifier",
            ServerRole::Automate => "automate",
            ServerRole::RhnMirror => "rhn_mirror",
            ServerRole::DatabaseSynchronizationRole => "database_synchronization_role",
            ServerRole::GitOwner => "git_owner",
            ServerRole::Websocket => "websocket",
            ServerRole::StorageMetricsProcessor => "storage_metrics_processor",
            ServerRole::StorageMetricsCollector => "storage_metrics_collector",
            ServerRole::StorageMetricsCoordinator => "storage_metrics_coordinator",
            ServerRole::StorageInventory => "storage_inventory",
            ServerRole::VmdbStorageBridge => "vmdb_storage_bridge",
            ServerRole::CockpitWs => "cockpit_ws",
        }
    }

    /// Role name as stored in the server settings
    pub fn setting_name(&self) -> &'static str {
        match self {
            ServerRole::DatabaseSynchronizationRole => "database_synchronization",
            other => other.as_str(),
        }
    }

    /// Switch controlling this role on the server tab
    pub fn widget(&self) -> Widget {
        Widget::switch(
            self.as_str(),
            &format!("server_roles_{}", self.setting_name()),
        )
    }
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerRole {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerRole::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s || role.setting_name() == s)
            .ok_or_else(|| E2eError::Config(format!("unknown server role: {}", s)))
    }
}

/// Role name to enabled state
pub type ServerRoles = BTreeMap<ServerRole, bool>;

/// Informational text shown under the role switches, not a role
pub fn default_smart_proxy_widget() -> Widget {
    Widget::text(
        "default_smart_proxy",
        Locator::xpath("//label[contains(text(), 'Default Repository SmartProxy')]/following-sibling::div"),
    )
}

/// Outcome of changing roles through the backing store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleChange {
    Applied,
    /// The requested set equalled the current set; nothing was written
    AlreadyMatching,
    /// Writing failed and the original set was written back
    RolledBack { error: String },
}

/// Write `roles` unless they already match the backing store
pub async fn update_server_roles_db(
    store: &dyn RoleStore,
    roles: &ServerRoles,
) -> E2eResult<RoleChange> {
    let current = store.server_roles().await?;
    if &current == roles {
        debug!("Roles already match, returning...");
        return Ok(RoleChange::AlreadyMatching);
    }
    store.set_server_roles(roles).await?;
    Ok(RoleChange::Applied)
}

/// Set each named role to `enable`, restoring the original set if the write
/// fails. A failing restore is returned as-is.
pub async fn change_server_roles_state(
    store: &dyn RoleStore,
    enable: bool,
    roles: &[ServerRole],
) -> E2eResult<RoleChange> {
    let original = store.server_roles().await?;
    let mut requested = original.clone();
    for role in roles {
        requested.insert(*role, enable);
    }

    if requested == original {
        debug!("Roles already match, returning...");
        return Ok(RoleChange::AlreadyMatching);
    }

    match store.set_server_roles(&requested).await {
        Ok(()) => Ok(RoleChange::Applied),
        Err(e) => {
            warn!("Failed to set server roles ({}), restoring original roles", e);
            store.set_server_roles(&original).await?;
            Ok(RoleChange::RolledBack {
                error: e.to_string(),
            })
        }
    }
}
