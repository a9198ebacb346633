use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::{Event, Experiment, Feature, Group};

/// An immutable snapshot of a project: the subset of the datafile the core
/// reads.
///
/// A `ProjectConfig` is never mutated after construction. Updates replace the
/// whole snapshot through [`crate::config_store::ConfigStore`]; decision and
/// event code pins one snapshot at entry and uses it for the entire call.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub account_id: String,
    pub project_id: String,
    pub revision: String,
    #[serde(default)]
    pub anonymize_ip: bool,
    #[serde(default)]
    pub bot_filtering: Option<bool>,
    /// Datafile-assigned attribute ids by attribute key.
    #[serde(default)]
    pub attribute_key_to_id_map: HashMap<String, String>,
    /// Conversion events by key.
    #[serde(default)]
    pub events: HashMap<String, Event>,
    /// Experiments by key.
    #[serde(default)]
    pub experiments: HashMap<String, Experiment>,
    /// Features by key.
    #[serde(default)]
    pub features: HashMap<String, Feature>,
    /// Mutually-exclusive groups by id.
    #[serde(default)]
    pub groups: HashMap<String, Group>,
}

impl ProjectConfig {
    /// Look up an experiment by key.
    pub fn experiment(&self, key: &str) -> Option<&Experiment> {
        self.experiments.get(key)
    }

    /// Look up a feature by key.
    pub fn feature(&self, key: &str) -> Option<&Feature> {
        self.features.get(key)
    }

    /// Look up a group by id.
    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.get(id)
    }

    /// Look up a conversion event by key.
    pub fn event(&self, key: &str) -> Option<&Event> {
        self.events.get(key)
    }
}
