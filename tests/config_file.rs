//! Config file loading as the binary does it, and where the loaded
//! settings take effect.

use std::time::Duration;

use vsphere_inventory::config::Config;
use vsphere_inventory::event::{
    Event, EventFilter, EventSource, EventStream, ManagedObjectReference, SourceError, event_type,
    select_events_for_reference,
};
use vsphere_inventory::paths::{CONFIG_FILE, InventoryPaths};

#[test]
fn written_defaults_load_back() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = InventoryPaths {
        config: tmp.path().join("config"),
        logs: tmp.path().join("logs"),
    };
    paths.ensure().unwrap();
    assert!(paths.config_file().ends_with(CONFIG_FILE));

    Config::default().write(&paths.config_file()).unwrap();
    let loaded = Config::load(&paths.config_file()).unwrap();
    assert_eq!(loaded, Config::default());
    assert_eq!(loaded.waiter_options().timeout, Duration::from_secs(300));
}

#[test]
fn customization_timeout_flows_into_waiter_options() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join(CONFIG_FILE);
    std::fs::write(&path, "[customization]\ntimeout_secs = 45\n\n[events]\npage_size = 50\n").unwrap();

    let options = Config::load(&path).unwrap().waiter_options();
    assert_eq!(options.timeout, Duration::from_secs(45));
    assert_eq!(options.page_size, 50);
}

/// An event service that accepts requests and never answers.
struct StalledSource;

#[async_trait::async_trait]
impl EventSource for StalledSource {
    async fn subscribe(&self, _filter: &EventFilter) -> Result<EventStream, SourceError> {
        std::future::pending().await
    }

    async fn query_events(&self, _filter: &EventFilter) -> Result<Vec<Event>, SourceError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn api_timeout_bounds_event_queries() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join(CONFIG_FILE);
    std::fs::write(&path, "[api]\ntimeout_secs = 7\n").unwrap();
    let config = Config::load(&path).unwrap();

    let err = select_events_for_reference(
        &StalledSource,
        &ManagedObjectReference::virtual_machine("vm-1"),
        &[event_type::CUSTOMIZATION_SUCCEEDED],
        config.api_timeout(),
    )
    .await
    .unwrap_err();
    assert_eq!(err, SourceError::Timeout(Duration::from_secs(7)));
}
