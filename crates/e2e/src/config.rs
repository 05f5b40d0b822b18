//! Harness configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use appliance_common::{ServerIdentity, Version};

use crate::auth::ProviderConfig;
use crate::error::{E2eError, E2eResult};
use crate::playwright::{PlaywrightConfig, RouteTable};

/// Harness configuration, loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Appliance under test
    pub appliance: ApplianceConfig,

    /// VMware console provisioning
    pub console: ConsoleConfig,

    /// Authentication providers by name
    pub auth_providers: BTreeMap<String, ProviderConfig>,

    /// Browser settings
    pub playwright: PlaywrightConfig,

    /// Destination URL templates
    pub routes: RouteTable,

    /// Scenario directory
    pub specs_dir: PathBuf,

    /// Output directory for results
    pub output_dir: PathBuf,
}

/// Appliance identity and access
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplianceConfig {
    pub base_url: String,
    pub version: Version,
    pub product_name: String,
    pub server: ServerIdentity,

    /// REST API credentials
    pub api_user: String,
    pub api_password: String,

    /// ssh access to the appliance host
    pub ssh_user: String,
    pub ssh_port: u16,
}

impl Default for ApplianceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://127.0.0.1".to_string(),
            version: Version::Latest,
            product_name: "ManageIQ".to_string(),
            server: ServerIdentity::default(),
            api_user: "admin".to_string(),
            api_password: "smartvm".to_string(),
            ssh_user: "root".to_string(),
            ssh_port: 22,
        }
    }
}

impl ApplianceConfig {
    /// Host part of the base URL, used for ssh
    pub fn host(&self) -> E2eResult<String> {
        let without_scheme = self
            .base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.base_url);
        let host = without_scheme
            .split(['/', ':'])
            .next()
            .unwrap_or_default();
        if host.is_empty() {
            return Err(E2eError::Config(format!(
                "no host in appliance base_url {:?}",
                self.base_url
            )));
        }
        Ok(host.to_string())
    }
}

/// Where the WebMKS SDK comes from and where it is unpacked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub webmks_sdk_download_url: String,
    pub webmks_sdk_extract_location: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            webmks_sdk_download_url: "http://example.com/WebMKS_SDK.zip".to_string(),
            webmks_sdk_extract_location: "/var/www/miq/vmdb/public/webmks".to_string(),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            appliance: ApplianceConfig::default(),
            console: ConsoleConfig::default(),
            auth_providers: BTreeMap::new(),
            playwright: PlaywrightConfig::default(),
            routes: RouteTable::default(),
            specs_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when missing
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_yaml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Named auth provider
    pub fn auth_provider(&self, name: &str) -> E2eResult<&ProviderConfig> {
        self.auth_providers
            .get(name)
            .ok_or_else(|| E2eError::Config(format!("no auth provider named {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.appliance.version, Version::Latest);
        assert!(config.auth_providers.is_empty());
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.yaml");
        std::fs::write(
            &path,
            r#"
appliance:
  base_url: https://10.0.0.5
  version: "5.9.0.17"
  product_name: CFME
  server:
    name: EVM
    sid: 1
    zone: default
console:
  webmks_sdk_download_url: http://mirror/WebMKS_SDK.zip
auth_providers:
  corp:
    type: amazon
    access_key: AKIA
    secret_key: secret
"#,
        )
        .unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.appliance.version, Version::new(&[5, 9, 0, 17]));
        assert_eq!(config.appliance.host().unwrap(), "10.0.0.5");
        assert_eq!(config.appliance.ssh_port, 22);
        assert_eq!(config.console.webmks_sdk_download_url, "http://mirror/WebMKS_SDK.zip");
        assert!(config.auth_provider("corp").is_ok());
        assert!(config.auth_provider("ldap").is_err());
    }
}
