//! Hit → event field mapping.
//!
//! A mapping is `source:field[,source:field...]`. `source` is a dotted path
//! into the hit's `_source`, optionally followed by `|'default'`, or a quoted
//! `'literal'`. The sources `index` and `id` read the hit's `_index` and
//! `_id` when mapped to `dataId`/`tags` and `id` respectively.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::AdapterError;

pub const INDEX_SOURCE: &str = "index";
pub const ID_SOURCE: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventField {
    Id,
    Ctime,
    DataSource,
    DataId,
    Category,
    Text,
    Context,
    Tags,
}

impl FromStr for EventField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "id" => Self::Id,
            "ctime" => Self::Ctime,
            "dataSource" => Self::DataSource,
            "dataId" => Self::DataId,
            "category" => Self::Category,
            "text" => Self::Text,
            "context" => Self::Context,
            "tags" => Self::Tags,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Id => "id",
            Self::Ctime => "ctime",
            Self::DataSource => "dataSource",
            Self::DataId => "dataId",
            Self::Category => "category",
            Self::Text => "text",
            Self::Context => "context",
            Self::Tags => "tags",
        };
        f.write_str(s)
    }
}

/// Parsed mapping, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    entries: Vec<(String, EventField)>,
}

impl Mapping {
    /// Invalid entries are logged and skipped; a mapping without `dataId`
    /// is rejected.
    pub fn parse(raw: &str) -> Result<Self, AdapterError> {
        let mut entries: Vec<(String, EventField)> = Vec::new();
        for entry in raw.split(',') {
            let parsed = entry.trim().split_once(':').and_then(|(source, field)| {
                let field = field.trim().parse::<EventField>().ok()?;
                let source = source.trim();
                (!source.is_empty()).then(|| (source.to_string(), field))
            });
            match parsed {
                Some((source, field)) => {
                    // A repeated source keeps only its last field.
                    entries.retain(|(s, _)| *s != source);
                    entries.push((source, field));
                }
                None => warn!(mapping = entry.trim(), "skipping invalid mapping entry"),
            }
        }
        if !entries.iter().any(|(_, f)| *f == EventField::DataId) {
            return Err(AdapterError::config(format!("mapping [{raw}] does not include dataId")));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[(String, EventField)] {
        &self.entries
    }
}

/// Resolve `name` against a hit's `_source`.
///
/// Scalars are returned as text; anything unresolvable yields the default
/// (or `""`).
pub fn get_field(source: Option<&Map<String, Value>>, name: &str) -> String {
    if let Some(literal) = quoted(name) {
        return literal.to_string();
    }

    let (path, default) = match name.split_once('|') {
        Some((path, default)) => (path, quoted(default.trim()).unwrap_or("")),
        None => (name, ""),
    };

    let Some(mut current) = source else {
        return default.to_string();
    };
    let mut segments = path.trim().split('.').peekable();
    while let Some(segment) = segments.next() {
        match current.get(segment) {
            Some(Value::String(s)) => return s.clone(),
            Some(Value::Object(inner)) if segments.peek().is_some() => current = inner,
            Some(Value::Number(n)) if segments.peek().is_none() => return n.to_string(),
            Some(Value::Bool(b)) if segments.peek().is_none() => return b.to_string(),
            _ => break,
        }
    }
    default.to_string()
}

fn quoted(s: &str) -> Option<&str> {
    (s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'')).then(|| &s[1..s.len() - 1])
}

/// Event fields filled from one hit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedHit {
    pub id: Option<String>,
    pub ctime: Option<String>,
    pub data_source: String,
    pub data_id: String,
    pub category: String,
    pub text: String,
    pub context: HashMap<String, String>,
    pub tags: HashMap<String, String>,
}

impl Mapping {
    pub fn apply(&self, hit: &Value) -> MappedHit {
        let source = hit.get("_source").and_then(Value::as_object);
        let meta = |key: &str| hit.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

        let mut mapped = MappedHit::default();
        for (name, field) in &self.entries {
            let is_index = name == INDEX_SOURCE;
            match field {
                EventField::Id => {
                    mapped.id = Some(if name == ID_SOURCE { meta("_id") } else { get_field(source, name) });
                }
                EventField::Ctime => mapped.ctime = Some(get_field(source, name)),
                EventField::DataSource => mapped.data_source = get_field(source, name),
                EventField::DataId => {
                    mapped.data_id = if is_index { meta("_index") } else { get_field(source, name) };
                }
                EventField::Category => mapped.category = get_field(source, name),
                EventField::Text => mapped.text = get_field(source, name),
                EventField::Context => {
                    mapped.context.insert(name.clone(), get_field(source, name));
                }
                EventField::Tags => {
                    if is_index {
                        mapped.tags.insert(INDEX_SOURCE.to_string(), meta("_index"));
                    } else {
                        mapped.tags.insert(name.clone(), get_field(source, name));
                    }
                }
            }
        }
        mapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn parses_and_skips_invalid_entries() {
        let m = Mapping::parse("level:category, @timestamp:ctime, app:dataId, junk, x:nope").unwrap();
        assert_eq!(
            m.entries(),
            &[
                ("level".to_string(), EventField::Category),
                ("@timestamp".to_string(), EventField::Ctime),
                ("app".to_string(), EventField::DataId),
            ]
        );
    }

    #[test]
    fn data_id_is_mandatory() {
        assert!(matches!(
            Mapping::parse("message:text,level:category"),
            Err(AdapterError::Config(_))
        ));
    }

    #[test]
    fn field_lookup_rules() {
        let s = source(json!({
            "message": "disk full",
            "host": {"name": "node-1", "cores": 8},
            "count": 3
        }));
        assert_eq!(get_field(Some(&s), "message"), "disk full");
        assert_eq!(get_field(Some(&s), "host.name"), "node-1");
        assert_eq!(get_field(Some(&s), "host.cores"), "8");
        assert_eq!(get_field(Some(&s), "count"), "3");
        assert_eq!(get_field(Some(&s), "'constant'"), "constant");
        assert_eq!(get_field(Some(&s), "missing|'fallback'"), "fallback");
        assert_eq!(get_field(Some(&s), "host.missing|'n/a'"), "n/a");
        assert_eq!(get_field(Some(&s), "missing"), "");
        assert_eq!(get_field(None, "message|'none'"), "none");
    }

    #[test]
    fn index_and_id_read_hit_metadata() {
        let m = Mapping::parse("index:dataId,id:id,index:tags").unwrap();
        // The repeated `index` source keeps its last field only.
        assert_eq!(m.entries().len(), 2);

        let m = Mapping::parse("index:dataId,id:id,app:tags").unwrap();
        let hit = json!({"_index": "logs-2024", "_id": "doc-7", "_source": {"app": "billing"}});
        let mapped = m.apply(&hit);
        assert_eq!(mapped.data_id, "logs-2024");
        assert_eq!(mapped.id.as_deref(), Some("doc-7"));
        assert_eq!(mapped.tags["app"], "billing");
    }

    #[test]
    fn context_entries_are_keyed_by_source() {
        let m = Mapping::parse("app:dataId,host.name:context,level:context").unwrap();
        let hit = json!({"_source": {"app": "api", "host": {"name": "n1"}, "level": "ERROR"}});
        let mapped = m.apply(&hit);
        assert_eq!(mapped.context["host.name"], "n1");
        assert_eq!(mapped.context["level"], "ERROR");
    }
}
