//! Report downloads from the network inventory lists and summaries

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use appliance_common::Version;

use crate::appliance::Appliance;
use crate::browser::{Click, Destination, NavigateOptions, Target};
use crate::error::{E2eError, E2eResult};
use crate::widget::{Locator, Widget};

/// Network inventory collections with downloadable lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkCollection {
    NetworkProviders,
    Balancers,
    CloudNetworks,
    NetworkPorts,
    NetworkSecurityGroups,
    NetworkSubnets,
    NetworkRouters,
}

impl NetworkCollection {
    pub const ALL: [NetworkCollection; 7] = [
        NetworkCollection::NetworkProviders,
        NetworkCollection::Balancers,
        NetworkCollection::CloudNetworks,
        NetworkCollection::NetworkPorts,
        NetworkCollection::NetworkSecurityGroups,
        NetworkCollection::NetworkSubnets,
        NetworkCollection::NetworkRouters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkCollection::NetworkProviders => "network_providers",
            NetworkCollection::Balancers => "balancers",
            NetworkCollection::CloudNetworks => "cloud_networks",
            NetworkCollection::NetworkPorts => "network_ports",
            NetworkCollection::NetworkSecurityGroups => "network_security_groups",
            NetworkCollection::NetworkSubnets => "network_subnets",
            NetworkCollection::NetworkRouters => "network_routers",
        }
    }

    /// Collection name in the appliance REST API
    pub fn api_collection(&self) -> &'static str {
        match self {
            NetworkCollection::NetworkProviders => "providers",
            NetworkCollection::Balancers => "load_balancers",
            NetworkCollection::CloudNetworks => "cloud_networks",
            NetworkCollection::NetworkPorts => "network_ports",
            NetworkCollection::NetworkSecurityGroups => "security_groups",
            NetworkCollection::NetworkSubnets => "cloud_subnets",
            NetworkCollection::NetworkRouters => "network_routers",
        }
    }
}

impl fmt::Display for NetworkCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Txt,
    Csv,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Txt, ExportFormat::Csv, ExportFormat::Pdf];

    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "Text",
            ExportFormat::Csv => "CSV",
            ExportFormat::Pdf => "PDF",
        }
    }

    /// Toolbar menu item producing this format
    pub fn menu_item(&self) -> String {
        format!("Download as {}", self.label())
    }

    /// PDF export is not offered by upstream builds
    pub fn is_available(&self, version: &Version) -> bool {
        !(*self == ExportFormat::Pdf && version.is_latest())
    }
}

/// Download menu in a list view toolbar
pub fn toolbar_download() -> Widget {
    Widget::new(
        "download",
        crate::widget::WidgetKind::Dropdown,
        Locator::title("Download"),
    )
}

/// Download button in a summary view toolbar
pub fn summary_download() -> Widget {
    Widget::button(
        "download",
        Locator::title("Download summary in PDF format"),
    )
}

/// Every list download worth running on `version`
pub fn list_download_cases(version: &Version) -> Vec<(NetworkCollection, ExportFormat)> {
    NetworkCollection::ALL
        .iter()
        .flat_map(|c| ExportFormat::ALL.iter().map(move |f| (*c, *f)))
        .filter(|(_, format)| format.is_available(version))
        .collect()
}

/// Summary downloads are PDF only and therefore skipped upstream
pub fn summary_downloads_available(version: &Version) -> bool {
    !version.is_latest()
}

/// Download the list of a collection in the given format
pub async fn download_list(
    appliance: &Appliance,
    collection: NetworkCollection,
    format: ExportFormat,
) -> E2eResult<()> {
    appliance
        .navigate_to(
            &Target::Collection(collection),
            Destination::All,
            NavigateOptions::default(),
        )
        .await?;

    match appliance
        .browser
        .select_item(&toolbar_download(), &format.menu_item())
        .await?
    {
        Click::Clicked => {
            info!("Downloaded {} as {}", collection, format.label());
            Ok(())
        }
        Click::Unavailable => Err(E2eError::WidgetNotFound(format!(
            "{} in the {} toolbar",
            format.menu_item(),
            collection
        ))),
    }
}

/// Download the summary of a single entity
pub async fn download_summary(appliance: &Appliance, entity: &Target) -> E2eResult<()> {
    appliance
        .navigate_to(entity, Destination::Details, NavigateOptions::default())
        .await?;

    match appliance.browser.click(&summary_download()).await? {
        Click::Clicked => Ok(()),
        Click::Unavailable => Err(E2eError::WidgetNotFound(format!(
            "summary download for {}",
            entity
        ))),
    }
}

/// Download the summary of the first entity in a collection.
///
/// Returns the entity name, or `None` when the collection is empty, the
/// name is ambiguous, or summaries are not offered on this version.
pub async fn download_first_summary(
    appliance: &Appliance,
    collection: NetworkCollection,
) -> E2eResult<Option<String>> {
    if !summary_downloads_available(&appliance.version) {
        debug!("Summary downloads not available on {}", appliance.version);
        return Ok(None);
    }

    let names = appliance.inventory.entity_names(collection).await?;
    let Some(name) = names.into_iter().next() else {
        debug!("No {} to download a summary of", collection);
        return Ok(None);
    };

    let entity = match appliance.inventory.instantiate(collection, &name).await {
        Ok(entity) => entity,
        Err(E2eError::ManyEntitiesFound { .. }) => {
            debug!("Several {} named {}, skipping summary download", collection, name);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    download_summary(appliance, &entity).await?;
    Ok(Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_items() {
        assert_eq!(ExportFormat::Csv.menu_item(), "Download as CSV");
        assert_eq!(ExportFormat::Txt.menu_item(), "Download as Text");
    }

    #[test]
    fn test_pdf_not_collected_upstream() {
        let upstream = list_download_cases(&Version::Latest);
        assert_eq!(upstream.len(), 14);
        assert!(!upstream.iter().any(|(_, f)| *f == ExportFormat::Pdf));

        let release = list_download_cases(&Version::new(&[5, 9]));
        assert_eq!(release.len(), 21);
    }
}
