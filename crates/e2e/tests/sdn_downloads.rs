use appliance_common::Version;
use appliance_e2e::downloads::{
    download_first_summary, download_list, list_download_cases, ExportFormat, NetworkCollection,
};
use appliance_e2e::sim::{SimConfig, SimulatedAppliance};
use appliance_e2e::E2eError;
use std::collections::BTreeMap;
use std::sync::Arc;

fn simulate(version: Version) -> Arc<SimulatedAppliance> {
    SimulatedAppliance::new(SimConfig {
        version,
        ..Default::default()
    })
}

fn with_inventory(
    version: Version,
    collection: NetworkCollection,
    names: &[&str],
) -> Arc<SimulatedAppliance> {
    let mut inventory = BTreeMap::new();
    inventory.insert(collection, names.iter().map(|n| n.to_string()).collect());
    SimulatedAppliance::new(SimConfig {
        version,
        inventory,
        ..Default::default()
    })
}

/// Every collection downloads in every format the release offers
#[tokio::test]
async fn all_list_downloads_succeed() {
    let version = Version::new(&[5, 9]);
    let sim = simulate(version.clone());
    let appliance = sim.appliance();

    let cases = list_download_cases(&version);
    for (collection, format) in &cases {
        download_list(&appliance, *collection, *format)
            .await
            .unwrap_or_else(|e| panic!("{} as {:?}: {}", collection, format, e));
    }

    let downloads = sim.downloads();
    assert_eq!(downloads.len(), cases.len());
    assert!(downloads.contains(&"cloud_networks as CSV".to_string()));
    assert!(downloads.contains(&"network_routers as PDF".to_string()));
}

#[tokio::test]
async fn pdf_list_is_not_offered_upstream() {
    let sim = simulate(Version::Latest);

    let err = download_list(&sim.appliance(), NetworkCollection::Balancers, ExportFormat::Pdf)
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::WidgetNotFound(_)));
    assert!(sim.downloads().is_empty());
}

#[tokio::test]
async fn summary_of_first_entity() {
    let sim = with_inventory(
        Version::new(&[5, 9]),
        NetworkCollection::CloudNetworks,
        &["ext", "int"],
    );

    let name = download_first_summary(&sim.appliance(), NetworkCollection::CloudNetworks)
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("ext"));
    assert_eq!(sim.downloads(), vec!["cloud_networks/ext summary".to_string()]);
}

/// Summaries are skipped when nothing unambiguous can be downloaded
#[tokio::test]
async fn summary_skipped_without_a_single_entity() {
    let release = Version::new(&[5, 9]);

    let sim = with_inventory(Version::Latest, NetworkCollection::NetworkPorts, &["p1"]);
    let name = download_first_summary(&sim.appliance(), NetworkCollection::NetworkPorts)
        .await
        .unwrap();
    assert_eq!(name, None, "summaries are PDF only and not offered upstream");

    let sim = simulate(release.clone());
    let name = download_first_summary(&sim.appliance(), NetworkCollection::NetworkSubnets)
        .await
        .unwrap();
    assert_eq!(name, None);

    let sim = with_inventory(release, NetworkCollection::Balancers, &["lb", "lb"]);
    let name = download_first_summary(&sim.appliance(), NetworkCollection::Balancers)
        .await
        .unwrap();
    assert_eq!(name, None);
    assert!(sim.downloads().is_empty());
    assert_eq!(sim.counters().navigations, 0);
}
