use std::collections::HashMap;

use prometheus::Registry;

use crate::config::EmitterConfig;

pub const NAMESPACE: &str = "hublag";

pub const LABEL_EVENTHUBS_NAMESPACE: &str = "eventhubs_namespace";
pub const LABEL_EVENT_HUB: &str = "event_hub";
pub const LABEL_READER_GROUP: &str = "consumer_group";
pub const LABEL_PARTITION: &str = "partition";
pub const LABEL_SCOPE: &str = "scope";

/// Create the [`Registry`] of the service's own metrics.
///
/// Every metric carries the Event Hubs Namespace and Event Hub being monitored as default labels.
pub fn init(config: &EmitterConfig) -> Registry {
    let prom_def_labels = HashMap::from([
        (LABEL_EVENTHUBS_NAMESPACE.to_string(), config.namespace.clone()),
        (LABEL_EVENT_HUB.to_string(), config.event_hub.clone()),
    ]);

    info!("Prometheus Metrics default labels:\n{:#?}", prom_def_labels);

    Registry::new_custom(Some(NAMESPACE.to_string()), Some(prom_def_labels))
        .expect("Unable to create a Prometheus Metrics Registry")
}
