use std::collections::HashMap;
use std::env;
use std::path::Path;

use tracing::info;

use crate::error::{CoreError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Non-empty value of an environment variable.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Boolean flag from the environment, `default` when unset or unparseable.
pub fn env_flag(key: &str, default: bool) -> bool {
    match env_opt(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "true" || v == "1" || v == "yes" => true,
        Some(v) if v == "false" || v == "0" || v == "no" => false,
        _ => default,
    }
}

// ── Global properties ─────────────────────────────────────────

/// Process-wide property bag loaded from a TOML file.
///
/// Nested tables are flattened with `.`, so
///
/// ```toml
/// [alerts]
/// gnocchi-url = "http://gnocchi:8041"
/// ```
///
/// is read back as `alerts.gnocchi-url`. Lookups through
/// [`get_property`](Properties::get_property) resolve in the order
/// environment variable, property file, fallback.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let props = Self::from_toml_str(&raw)?;
        info!(path = %path.display(), count = props.len(), "loaded global properties");
        Ok(props)
    }

    /// Load `path` if it exists, otherwise start empty.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::from_file(p),
            Some(p) => {
                info!(path = %p.display(), "property file not found, using environment and defaults");
                Ok(Self::empty())
            }
            None => Ok(Self::empty()),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let table: toml::Table = raw.parse()?;
        let mut values = HashMap::new();
        flatten("", &toml::Value::Table(table), &mut values)?;
        Ok(Self { values })
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Resolve a connector default: `env_name` beats `global_name` beats `default`.
    pub fn get_property(&self, global_name: &str, env_name: &str, default: &str) -> String {
        env_opt(env_name)
            .or_else(|| self.get(global_name).map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Log every loaded key with secrets masked.
    pub fn log_summary(&self) {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        info!("Properties loaded ({} keys):", keys.len());
        for key in keys {
            let value = if is_secret(key) { "***" } else { self.values[key].as_str() };
            info!("  {key} = {value}");
        }
    }
}

fn is_secret(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.contains("password") || k.contains("pass") || k.contains("token") || k.contains("secret")
}

fn flatten(prefix: &str, value: &toml::Value, out: &mut HashMap<String, String>) -> Result<()> {
    let scalar = match value {
        toml::Value::Table(table) => {
            for (k, v) in table {
                let key = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
                flatten(&key, v, out)?;
            }
            return Ok(());
        }
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(d) => d.to_string(),
        toml::Value::Array(_) => {
            return Err(CoreError::InvalidProperty {
                key: prefix.to_string(),
                reason: "arrays are not supported, use a comma separated string".into(),
            })
        }
    };
    out.insert(prefix.to_string(), scalar);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flattens_nested_tables() {
        let props = Properties::from_toml_str(
            r#"
            top = "level"
            [alerts]
            gnocchi-url = "http://gnocchi:8041"
            thread-pool-size = 8
            [alerts.prometheus]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(props.get("top"), Some("level"));
        assert_eq!(props.get("alerts.gnocchi-url"), Some("http://gnocchi:8041"));
        assert_eq!(props.get("alerts.thread-pool-size"), Some("8"));
        assert_eq!(props.get("alerts.prometheus.enabled"), Some("false"));
    }

    #[test]
    fn arrays_are_rejected() {
        let err = Properties::from_toml_str("urls = [\"a\", \"b\"]").unwrap_err();
        assert!(matches!(err, CoreError::InvalidProperty { ref key, .. } if key == "urls"));
    }

    #[test]
    fn env_beats_property_beats_default() {
        let props = Properties::empty().with("alerts.core-test-url", "http://from-file");

        assert_eq!(
            props.get_property("alerts.core-test-url", "CORE_TEST_URL_UNSET_1", "http://fallback"),
            "http://from-file"
        );
        assert_eq!(
            props.get_property("alerts.missing", "CORE_TEST_URL_UNSET_2", "http://fallback"),
            "http://fallback"
        );

        env::set_var("CORE_TEST_URL_SET", "http://from-env");
        assert_eq!(
            props.get_property("alerts.core-test-url", "CORE_TEST_URL_SET", "http://fallback"),
            "http://from-env"
        );
        env::remove_var("CORE_TEST_URL_SET");
    }

    #[test]
    fn blank_env_is_ignored() {
        env::set_var("CORE_TEST_BLANK", "  ");
        let props = Properties::empty().with("k", "file");
        assert_eq!(props.get_property("k", "CORE_TEST_BLANK", "d"), "file");
        env::remove_var("CORE_TEST_BLANK");
    }

    #[test]
    fn env_flag_parsing() {
        env::set_var("CORE_TEST_FLAG_OFF", "false");
        env::set_var("CORE_TEST_FLAG_JUNK", "maybe");
        assert!(!env_flag("CORE_TEST_FLAG_OFF", true));
        assert!(env_flag("CORE_TEST_FLAG_JUNK", true));
        assert!(env_flag("CORE_TEST_FLAG_UNSET", true));
        env::remove_var("CORE_TEST_FLAG_OFF");
        env::remove_var("CORE_TEST_FLAG_JUNK");
    }

    #[test]
    fn loads_from_file_and_tolerates_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[alerts]\nelasticsearch-url = \"http://es:9200\"").unwrap();

        let props = Properties::from_file(file.path()).unwrap();
        assert_eq!(props.get("alerts.elasticsearch-url"), Some("http://es:9200"));

        let missing = Properties::load_optional(Some(Path::new("/nonexistent/alerts.toml"))).unwrap();
        assert!(missing.is_empty());
    }
}
