//! Appliance REST API: server role settings and inventory lookups

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::browser::{Inventory, RoleStore, Target};
use crate::config::ApplianceConfig;
use crate::downloads::NetworkCollection;
use crate::error::{E2eError, E2eResult};
use crate::roles::{ServerRole, ServerRoles};

/// Full role map from the comma-separated `server.role` setting
pub fn roles_from_setting(setting: &str) -> ServerRoles {
    let enabled: Vec<ServerRole> = setting
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter_map(|name| match name.parse() {
            Ok(role) => Some(role),
            Err(_) => {
                warn!("Ignoring unknown server role {} in settings", name);
                None
            }
        })
        .collect();

    ServerRole::ALL
        .iter()
        .map(|role| (*role, enabled.contains(role)))
        .collect()
}

/// `server.role` setting for a role map
pub fn roles_to_setting(roles: &ServerRoles) -> String {
    roles
        .iter()
        .filter(|(_, enabled)| **enabled)
        .map(|(role, _)| role.setting_name())
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Deserialize)]
struct Resources {
    #[serde(default)]
    resources: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
}

/// Client for the appliance REST API
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    sid: u32,
}

impl RestClient {
    pub fn new(config: &ApplianceConfig) -> E2eResult<Self> {
        // appliances ship self-signed certificates
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user: config.api_user.clone(),
            password: config.api_password.clone(),
            sid: config.server.sid,
        })
    }

    fn settings_url(&self) -> String {
        format!("{}/api/servers/{}/settings", self.base_url, self.sid)
    }

    async fn get_json(&self, url: &str) -> E2eResult<serde_json::Value> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl RoleStore for RestClient {
    async fn server_roles(&self) -> E2eResult<ServerRoles> {
        let settings = self.get_json(&self.settings_url()).await?;
        let setting = settings
            .pointer("/server/role")
            .and_then(|v| v.as_str())
            .ok_or_else(|| E2eError::RoleStore("settings carry no server.role".to_string()))?;
        Ok(roles_from_setting(setting))
    }

    async fn set_server_roles(&self, roles: &ServerRoles) -> E2eResult<()> {
        let url = self.settings_url();
        let body = serde_json::json!({ "server": { "role": roles_to_setting(roles) } });
        debug!("PATCH {} {}", url, body);

        let resp = self
            .client
            .patch(&url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(E2eError::RoleStore(format!(
                "settings update returned {}: {}",
                status, text
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Inventory for RestClient {
    async fn entity_names(&self, collection: NetworkCollection) -> E2eResult<Vec<String>> {
        let url = format!(
            "{}/api/{}?expand=resources&attributes=name",
            self.base_url,
            collection.api_collection()
        );
        let value = self.get_json(&url).await?;
        let resources: Resources = serde_json::from_value(value)?;
        Ok(resources.resources.into_iter().map(|r| r.name).collect())
    }

    async fn instantiate(&self, collection: NetworkCollection, name: &str) -> E2eResult<Target> {
        let names = self.entity_names(collection).await?;
        match names.iter().filter(|n| *n == name).count() {
            0 => Err(E2eError::EntityNotFound {
                collection: collection.to_string(),
                name: name.to_string(),
            }),
            1 => Ok(Target::Entity {
                collection,
                name: name.to_string(),
            }),
            _ => Err(E2eError::ManyEntitiesFound {
                collection: collection.to_string(),
                name: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_from_setting() {
        let roles = roles_from_setting("automate, database_synchronization,bogus,");
        assert_eq!(roles.len(), ServerRole::ALL.len());
        assert!(roles[&ServerRole::Automate]);
        assert!(roles[&ServerRole::DatabaseSynchronizationRole]);
        assert!(!roles[&ServerRole::Notifier]);
    }

    #[test]
    fn test_roles_to_setting() {
        let mut roles = roles_from_setting("");
        roles.insert(ServerRole::Notifier, true);
        roles.insert(ServerRole::DatabaseSynchronizationRole, true);
        assert_eq!(roles_to_setting(&roles), "notifier,database_synchronization");
        assert_eq!(roles_from_setting(&roles_to_setting(&roles)), roles);
    }
}
