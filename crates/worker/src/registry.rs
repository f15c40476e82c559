//! Static table of the alerters this worker can run.

use tracing::info;

use alerter_adapters::{
    document_store, metrics_store, query_engine, AdapterError, DocumentStoreAdapter,
    MetricsStoreAdapter, QueryEngineAdapter,
};
use alerter_core::Properties;
use alerter_scheduler::{Alerter, Collaborators, Connector, ConnectorConfig, EndpointAdapter};

pub type AlerterFactory = fn(Collaborators) -> Result<Box<dyn Alerter>, AdapterError>;

pub struct AlerterEntry {
    pub name: &'static str,
    pub factory: AlerterFactory,
}

pub const ALERTERS: &[AlerterEntry] = &[
    AlerterEntry {
        name: metrics_store::CONNECTOR,
        factory: metrics_store_alerter,
    },
    AlerterEntry {
        name: query_engine::CONNECTOR,
        factory: query_engine_alerter,
    },
    AlerterEntry {
        name: document_store::CONNECTOR,
        factory: document_store_alerter,
    },
];

fn metrics_store_alerter(collaborators: Collaborators) -> Result<Box<dyn Alerter>, AdapterError> {
    Ok(connector(MetricsStoreAdapter::http()?, collaborators))
}

fn query_engine_alerter(collaborators: Collaborators) -> Result<Box<dyn Alerter>, AdapterError> {
    Ok(connector(QueryEngineAdapter::http()?, collaborators))
}

fn document_store_alerter(collaborators: Collaborators) -> Result<Box<dyn Alerter>, AdapterError> {
    Ok(connector(DocumentStoreAdapter::http()?, collaborators))
}

fn connector<A: EndpointAdapter>(adapter: A, collaborators: Collaborators) -> Box<dyn Alerter> {
    let config = ConnectorConfig::from_properties(&collaborators.properties, adapter.name());
    Box::new(Connector::new(adapter, config, collaborators))
}

/// `{NAME}_ALERTER` in the environment, then `alerts.{name}-alerter`;
/// enabled unless one of them says otherwise.
pub fn is_enabled(props: &Properties, name: &str) -> bool {
    let env = format!("{}_ALERTER", name.to_ascii_uppercase().replace('-', "_"));
    let raw = props.get_property(&format!("alerts.{name}-alerter"), &env, "true");
    !matches!(raw.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off")
}

/// Build every enabled entry of `entries`.
pub fn build_enabled(
    entries: &[AlerterEntry],
    collaborators: &Collaborators,
) -> Result<Vec<Box<dyn Alerter>>, AdapterError> {
    let mut alerters = Vec::new();
    for entry in entries {
        if !is_enabled(&collaborators.properties, entry.name) {
            info!(alerter = entry.name, "alerter disabled");
            continue;
        }
        alerters.push((entry.factory)(collaborators.clone())?);
        info!(alerter = entry.name, "alerter registered");
    }
    Ok(alerters)
}
