//! Construction of canonical impression and conversion event records.
use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::event::{
    ConversionEvent, DecisionMetadata, EventContext, ImpressionEvent, UserEvent, VisitorAttribute,
};
use crate::attributes::{AttributeValue, BOT_FILTERING_ATTRIBUTE, RESERVED_ATTRIBUTE_PREFIX};
use crate::config::ProjectConfig;
use crate::entities::{Experiment, Variation};
use crate::user_context::UserContext;

const REVENUE_TAG: &str = "revenue";
const VALUE_TAG: &str = "value";

/// Build an impression record for a decision outcome.
#[allow(clippy::too_many_arguments)]
pub fn build_impression_event(
    config: &ProjectConfig,
    experiment: &Experiment,
    variation: &Variation,
    user: &UserContext,
    flag_key: &str,
    rule_key: &str,
    rule_type: &str,
    enabled: bool,
) -> UserEvent {
    let impression = ImpressionEvent {
        campaign_id: experiment.layer_id.clone(),
        experiment_id: experiment.id.clone(),
        variation_id: variation.id.clone(),
        metadata: DecisionMetadata {
            flag_key: flag_key.to_owned(),
            rule_key: rule_key.to_owned(),
            rule_type: rule_type.to_owned(),
            variation_key: variation.key.clone(),
            enabled,
        },
        attributes: visitor_attributes(config, user),
    };

    UserEvent {
        timestamp: Utc::now().timestamp_millis(),
        uuid: Uuid::new_v4().to_string(),
        event_context: EventContext::from_config(config),
        visitor_id: user.id.clone(),
        impression: Some(impression),
        conversion: None,
    }
}

/// Build a conversion record for a tracked event.
pub fn build_conversion_event(
    config: &ProjectConfig,
    event: &crate::entities::Event,
    user: &UserContext,
    tags: Option<HashMap<String, serde_json::Value>>,
) -> UserEvent {
    let conversion = ConversionEvent {
        entity_id: event.id.clone(),
        key: event.key.clone(),
        attributes: visitor_attributes(config, user),
        revenue: tags.as_ref().and_then(revenue_from_tags),
        value: tags.as_ref().and_then(value_from_tags),
        tags,
    };

    UserEvent {
        timestamp: Utc::now().timestamp_millis(),
        uuid: Uuid::new_v4().to_string(),
        event_context: EventContext::from_config(config),
        visitor_id: user.id.clone(),
        impression: None,
        conversion: Some(conversion),
    }
}

/// Serialize the attributes the datafile knows about, plus reserved ones.
///
/// Attributes declared in the datafile carry their assigned id; reserved
/// `$opt_` attributes use their key as the id; everything else is dropped.
fn visitor_attributes(config: &ProjectConfig, user: &UserContext) -> Vec<VisitorAttribute> {
    let mut attributes = Vec::new();
    for (key, value) in &user.attributes {
        if value.is_null() {
            continue;
        }
        let entity_id = if key.starts_with(RESERVED_ATTRIBUTE_PREFIX) {
            key.clone()
        } else if let Some(id) = config.attribute_key_to_id_map.get(key) {
            id.clone()
        } else {
            continue;
        };
        attributes.push(VisitorAttribute::custom(entity_id, key.clone(), value.clone()));
    }

    if let Some(bot_filtering) = config.bot_filtering {
        attributes.push(VisitorAttribute::custom(
            BOT_FILTERING_ATTRIBUTE,
            BOT_FILTERING_ATTRIBUTE,
            AttributeValue::Bool(bot_filtering),
        ));
    }

    attributes
}

fn revenue_from_tags(tags: &HashMap<String, serde_json::Value>) -> Option<i64> {
    let number = tags.get(REVENUE_TAG)?;
    if let Some(revenue) = number.as_i64() {
        return Some(revenue);
    }
    // Accept integral floats.
    let float = number.as_f64()?;
    if float.fract() == 0.0 && float.is_finite() {
        Some(float as i64)
    } else {
        None
    }
}

fn value_from_tags(tags: &HashMap<String, serde_json::Value>) -> Option<f64> {
    tags.get(VALUE_TAG)?.as_f64().filter(|v| v.is_finite())
}
