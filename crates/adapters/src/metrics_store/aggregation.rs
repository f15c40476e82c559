//! `name=function(params)[;...]` aggregate definitions.
//!
//! A comma in `params` makes it a list of series names; otherwise it is a
//! pattern matched against every resolved series name.

use std::collections::BTreeMap;

use regex::Regex;

use super::config::{full_match, split_list};
use crate::error::AdapterError;

#[derive(Debug, Clone)]
pub enum AggregationMembers {
    Names(Vec<String>),
    Pattern(Regex),
}

#[derive(Debug, Clone)]
pub struct AggregationSpec {
    pub name: String,
    pub function: String,
    pub members: AggregationMembers,
}

impl AggregationSpec {
    pub fn parse(definition: &str) -> Result<Self, AdapterError> {
        let definition = definition.trim();
        let malformed = || AdapterError::config(format!("malformed aggregation [{definition}]"));

        let (name, rest) = definition.split_once('=').ok_or_else(malformed)?;
        let (function, rest) = rest.split_once('(').ok_or_else(malformed)?;
        let (params, _) = rest.split_once(')').ok_or_else(malformed)?;

        let (name, function, params) = (name.trim(), function.trim(), params.trim());
        if name.is_empty() || function.is_empty() {
            return Err(malformed());
        }

        let members = if params.contains(',') {
            AggregationMembers::Names(split_list(params))
        } else {
            AggregationMembers::Pattern(full_match(params)?)
        };
        Ok(Self {
            name: name.to_string(),
            function: function.to_string(),
            members,
        })
    }

    /// Parse a `;`-separated list, ignoring empty entries.
    pub fn parse_all(raw: &str) -> Result<Vec<Self>, AdapterError> {
        raw.split(';')
            .filter(|d| !d.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Ids of the resolved series this aggregate covers. Listed names that
    /// did not resolve are left out.
    pub fn member_ids(&self, resolved: &BTreeMap<String, String>) -> Vec<String> {
        match &self.members {
            AggregationMembers::Names(names) => names
                .iter()
                .filter_map(|name| resolved.get(name).cloned())
                .collect(),
            AggregationMembers::Pattern(re) => resolved
                .iter()
                .filter(|(name, _)| re.is_match(name))
                .map(|(_, id)| id.clone())
                .collect(),
        }
    }
}
