//! Datafile-shaped domain entities read by the decision and event pipelines.
//!
//! The datafile loader itself lives outside this crate; these types only
//! describe the parts of a project snapshot the core consumes.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeValue;

/// A single variation of an experiment.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    pub id: String,
    pub key: String,
    /// Whether the owning feature is enabled for users assigned here.
    #[serde(default)]
    pub feature_enabled: bool,
    /// Variable overrides, variable id to value.
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// One half-open range of a traffic allocation. A bucket value selects the
/// first range whose `end_of_range` exceeds it.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficAllocation {
    /// Variation id (or experiment id for group-level allocations). An empty
    /// id means the bucket span is deliberately unassigned.
    pub entity_id: String,
    /// Exclusive upper bound of the range, at most 10000. Monotonic across
    /// the allocation sequence.
    pub end_of_range: u32,
}

/// An experiment, or a rollout targeting rule (rollouts reuse the experiment
/// shape).
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    pub key: String,
    /// The layer this experiment buckets within. Part of the bucketing key.
    pub layer_id: String,
    #[serde(default)]
    pub status: String,
    /// Variations by id.
    #[serde(default)]
    pub variations: HashMap<String, Variation>,
    #[serde(default)]
    pub variation_key_to_id_map: HashMap<String, String>,
    #[serde(default)]
    pub traffic_allocation: Vec<TrafficAllocation>,
    #[serde(default)]
    pub audience_conditions: Option<ConditionTree>,
    /// Forced variations, user id to variation key.
    #[serde(default)]
    pub whitelist: HashMap<String, String>,
    /// Id of the mutually-exclusive group this experiment belongs to, if any.
    #[serde(default)]
    pub group_id: Option<String>,
}

impl Experiment {
    /// Resolve a variation key through the key-to-id map.
    pub fn variation_by_key(&self, key: &str) -> Option<&Variation> {
        self.variation_key_to_id_map
            .get(key)
            .and_then(|id| self.variations.get(id))
    }
}

/// A mutually-exclusive experiment group. Members share a group-level traffic
/// allocation; a user belongs to at most one member.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    /// `"random"` for mutex groups.
    #[serde(default)]
    pub policy: String,
    #[serde(default)]
    pub traffic_allocation: Vec<TrafficAllocation>,
}

/// Allocation policy of mutually-exclusive groups.
pub const GROUP_POLICY_RANDOM: &str = "random";

/// An ordered sequence of targeting rules terminating in an "everyone-else"
/// rule.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rollout {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub experiments: Vec<Experiment>,
}

/// A feature flag with its experiments and rollout.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    pub key: String,
    /// Experiments gating this feature, in evaluation order.
    #[serde(default)]
    pub feature_experiments: Vec<Experiment>,
    #[serde(default)]
    pub rollout: Rollout,
}

/// A named conversion event declared in the datafile.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub key: String,
}

/// Boolean combinator of an audience condition tree node.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// A leaf audience condition.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Attribute (or segment) name the condition applies to.
    pub name: String,
    #[serde(rename = "type", default)]
    pub condition_type: String,
    /// Match kind; absent means `exact`.
    #[serde(rename = "match", default)]
    pub match_type: Option<String>,
    #[serde(default)]
    pub value: Option<AttributeValue>,
}

/// An audience condition tree: internal `and`/`or`/`not` nodes over leaf
/// conditions.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ConditionTree {
    /// Boolean combinator over child nodes.
    Node {
        op: LogicalOp,
        #[serde(default)]
        nodes: Vec<ConditionTree>,
    },
    /// A leaf condition.
    Leaf(Condition),
}
