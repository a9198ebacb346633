//! Event records and the wire payload shipped to the events endpoint.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeValue;
use crate::config::ProjectConfig;

/// Client name reported with every event payload.
pub const CLIENT_NAME: &str = "rust-sdk";

/// Client version reported with every event payload.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Snapshot event key used for impressions.
pub const IMPRESSION_EVENT_KEY: &str = "campaign_activated";

/// Project-scoped context stamped onto every event at creation time.
///
/// Two events may share a batch iff their `project_id` and `revision` are
/// equal.
#[derive(Debug, Clone, PartialEq)]
pub struct EventContext {
    pub account_id: String,
    pub project_id: String,
    pub revision: String,
    pub client_name: String,
    pub client_version: String,
    pub anonymize_ip: bool,
    pub bot_filtering: Option<bool>,
    /// Datafile-assigned attribute ids, used when serializing attributes.
    pub attribute_key_to_id_map: HashMap<String, String>,
}

impl EventContext {
    /// Capture the event context of a project snapshot.
    pub fn from_config(config: &ProjectConfig) -> EventContext {
        EventContext {
            account_id: config.account_id.clone(),
            project_id: config.project_id.clone(),
            revision: config.revision.clone(),
            client_name: CLIENT_NAME.to_owned(),
            client_version: CLIENT_VERSION.to_owned(),
            anonymize_ip: config.anonymize_ip,
            bot_filtering: config.bot_filtering,
            attribute_key_to_id_map: config.attribute_key_to_id_map.clone(),
        }
    }
}

/// One attribute as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitorAttribute {
    pub entity_id: String,
    pub key: String,
    #[serde(rename = "type")]
    pub attribute_type: String,
    pub value: AttributeValue,
}

impl VisitorAttribute {
    pub(crate) fn custom(
        entity_id: impl Into<String>,
        key: impl Into<String>,
        value: AttributeValue,
    ) -> VisitorAttribute {
        VisitorAttribute {
            entity_id: entity_id.into(),
            key: key.into(),
            attribute_type: "custom".to_owned(),
            value,
        }
    }
}

/// Decision metadata attached to impression decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DecisionMetadata {
    pub flag_key: String,
    pub rule_key: String,
    /// One of `experiment`, `feature-test`, `rollout`, or empty.
    pub rule_type: String,
    pub variation_key: String,
    pub enabled: bool,
}

/// The impression half of a [`UserEvent`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImpressionEvent {
    /// The experiment's layer id.
    pub campaign_id: String,
    pub experiment_id: String,
    pub variation_id: String,
    pub metadata: DecisionMetadata,
    pub attributes: Vec<VisitorAttribute>,
}

/// The conversion half of a [`UserEvent`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEvent {
    /// Datafile id of the conversion event.
    pub entity_id: String,
    pub key: String,
    pub attributes: Vec<VisitorAttribute>,
    pub tags: Option<HashMap<String, serde_json::Value>>,
    /// Extracted from the `revenue` tag when parseable.
    pub revenue: Option<i64>,
    /// Extracted from the `value` tag when parseable.
    pub value: Option<f64>,
}

/// A single queued event: exactly one of impression or conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct UserEvent {
    /// Milliseconds since epoch, UTC.
    pub timestamp: i64,
    pub uuid: String,
    pub event_context: EventContext,
    pub visitor_id: String,
    pub impression: Option<ImpressionEvent>,
    pub conversion: Option<ConversionEvent>,
}

impl UserEvent {
    /// Whether this event can join a batch built from `batch`.
    pub(crate) fn batch_compatible(&self, batch: &Batch) -> bool {
        self.event_context.project_id == batch.project_id
            && self.event_context.revision == batch.revision
    }
}

/// One decision of a visitor snapshot, on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotDecision {
    pub campaign_id: String,
    pub experiment_id: String,
    pub variation_id: String,
    pub metadata: DecisionMetadata,
}

/// One event of a visitor snapshot, on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotEvent {
    pub entity_id: String,
    pub key: String,
    pub timestamp: i64,
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// A visitor snapshot, on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub decisions: Vec<SnapshotDecision>,
    pub events: Vec<SnapshotEvent>,
}

/// A visitor, on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visitor {
    pub visitor_id: String,
    pub attributes: Vec<VisitorAttribute>,
    pub snapshots: Vec<Snapshot>,
}

impl Visitor {
    /// Render one queued event as a wire visitor.
    pub(crate) fn from_user_event(event: &UserEvent) -> Visitor {
        let (attributes, snapshot) = if let Some(impression) = &event.impression {
            (
                impression.attributes.clone(),
                Snapshot {
                    decisions: vec![SnapshotDecision {
                        campaign_id: impression.campaign_id.clone(),
                        experiment_id: impression.experiment_id.clone(),
                        variation_id: impression.variation_id.clone(),
                        metadata: impression.metadata.clone(),
                    }],
                    events: vec![SnapshotEvent {
                        entity_id: impression.campaign_id.clone(),
                        key: IMPRESSION_EVENT_KEY.to_owned(),
                        timestamp: event.timestamp,
                        uuid: event.uuid.clone(),
                        tags: None,
                        revenue: None,
                        value: None,
                    }],
                },
            )
        } else if let Some(conversion) = &event.conversion {
            (
                conversion.attributes.clone(),
                Snapshot {
                    decisions: Vec::new(),
                    events: vec![SnapshotEvent {
                        entity_id: conversion.entity_id.clone(),
                        key: conversion.key.clone(),
                        timestamp: event.timestamp,
                        uuid: event.uuid.clone(),
                        tags: conversion.tags.clone(),
                        revenue: conversion.revenue,
                        value: conversion.value,
                    }],
                },
            )
        } else {
            // Builders never produce such an event.
            (Vec::new(), Snapshot {
                decisions: Vec::new(),
                events: Vec::new(),
            })
        };

        Visitor {
            visitor_id: event.visitor_id.clone(),
            attributes,
            snapshots: vec![snapshot],
        }
    }
}

/// The batch body POSTed to the events endpoint. All visitors share the same
/// `(project_id, revision)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub account_id: String,
    pub project_id: String,
    pub revision: String,
    pub client_name: String,
    pub client_version: String,
    pub anonymize_ip: bool,
    pub enrich_decisions: bool,
    pub visitors: Vec<Visitor>,
}

impl Batch {
    /// Start a batch from its first event.
    pub(crate) fn from_user_event(event: &UserEvent) -> Batch {
        let context = &event.event_context;
        Batch {
            account_id: context.account_id.clone(),
            project_id: context.project_id.clone(),
            revision: context.revision.clone(),
            client_name: context.client_name.clone(),
            client_version: context.client_version.clone(),
            anonymize_ip: context.anonymize_ip,
            enrich_decisions: true,
            visitors: vec![Visitor::from_user_event(event)],
        }
    }
}

/// The payload handed to the event dispatcher: a batch plus the endpoint it
/// goes to.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub endpoint_url: String,
    pub event: Batch,
}

impl LogEvent {
    pub fn new(endpoint_url: impl Into<String>, event: Batch) -> LogEvent {
        LogEvent {
            endpoint_url: endpoint_url.into(),
            event,
        }
    }
}
