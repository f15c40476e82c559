use alerter_core::{Properties, TriggerSnapshot};

/// Connector-wide default: `alerts.{connector}-{key}` in the properties file,
/// overridden by `{CONNECTOR}_{KEY}` in the environment.
pub(crate) fn connector_default(props: &Properties, connector: &str, key: &str, default: &str) -> String {
    let env = format!("{connector}_{key}").to_ascii_uppercase().replace('-', "_");
    props.get_property(&format!("alerts.{connector}-{key}"), &env, default)
}

/// Trigger context value, falling back to the connector default.
pub(crate) fn context_or_default(
    trigger: &TriggerSnapshot,
    context_key: &str,
    props: &Properties,
    connector: &str,
    default: &str,
) -> String {
    match trigger.context_value(context_key) {
        Some(v) => v.to_string(),
        None => connector_default(props, connector, context_key, default),
    }
}
